use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::models::{ActivityAction, ActorType, Settings, UpdateSettings};
use crate::util::{ActivityLogBuilder, RequestMeta};

/// GET /admin/settings
/// Stored values with defaults filled in.
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>> {
    Ok(Json(queries::get_settings(state.store.as_ref())?))
}

/// PUT /admin/settings
/// Partial update: omitted fields keep their current value.
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Json(patch): Json<UpdateSettings>,
) -> Result<Json<Settings>> {
    if patch.is_empty() {
        return Err(AppError::BadRequest(msg::EMPTY_SETTINGS_UPDATE.into()));
    }
    let store = state.store.as_ref();
    let settings = queries::update_settings(store, &patch)?;

    ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Admin, Some(&ctx.key_prefix))
        .action(ActivityAction::UpdateSettings)
        .details(serde_json::to_value(&patch)?)
        .save()?;

    tracing::info!(?patch, "settings updated");
    Ok(Json(settings))
}
