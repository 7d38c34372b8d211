use axum::extract::State;
use serde::Deserialize;

use crate::db::queries::{self, DashboardStats};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::ActivityEntryWithFormatted;
use crate::util::now_ms;

const DEFAULT_ACTIVITY_LIMIT: usize = 100;
const MAX_ACTIVITY_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

/// GET /admin/activity?limit=
/// Newest first.
pub async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntryWithFormatted>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let entries = queries::recent_activity(state.store.as_ref(), limit)?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// GET /admin/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    Ok(Json(queries::dashboard_stats(state.store.as_ref(), now_ms())?))
}
