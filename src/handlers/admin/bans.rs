use axum::extract::{Extension, State};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path};
use crate::middleware::AdminContext;
use crate::models::{ActivityAction, ActorType, BanList};
use crate::util::{ActivityLogBuilder, RequestMeta};

/// GET /admin/bans
pub async fn list_bans(State(state): State<AppState>) -> Result<Json<BanList>> {
    Ok(Json(queries::get_banlist(state.store.as_ref())?))
}

#[derive(Debug, Deserialize)]
pub struct BanBody {
    #[serde(default)]
    pub hwid: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /admin/bans
/// Banning an already-banned HWID succeeds without change.
pub async fn ban_hwid(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Json(body): Json<BanBody>,
) -> Result<Json<serde_json::Value>> {
    let store = state.store.as_ref();
    let added = queries::ban_hwid(store, &body.hwid)?;

    if added {
        ActivityLogBuilder::new(store, &meta)
            .actor(ActorType::Admin, Some(&ctx.key_prefix))
            .action(ActivityAction::BanHwid)
            .hwid(&body.hwid)
            .details(serde_json::json!({ "reason": body.reason }))
            .save()?;
        tracing::info!(hwid = %body.hwid, "HWID banned");
    }

    Ok(Json(serde_json::json!({ "success": true, "added": added })))
}

/// DELETE /admin/bans/{hwid}
pub async fn unban_hwid(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Path(hwid): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if hwid.trim().is_empty() {
        return Err(AppError::BadRequest(msg::EMPTY_HWID.into()));
    }
    let store = state.store.as_ref();
    let removed = queries::unban_hwid(store, &hwid)?;

    if removed {
        ActivityLogBuilder::new(store, &meta)
            .actor(ActorType::Admin, Some(&ctx.key_prefix))
            .action(ActivityAction::UnbanHwid)
            .hwid(&hwid)
            .save()?;
        tracing::info!(hwid = %hwid, "HWID unbanned");
    }

    Ok(Json(serde_json::json!({ "success": true, "removed": removed })))
}
