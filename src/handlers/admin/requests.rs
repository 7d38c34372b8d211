use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::id::is_valid_prefixed_id;
use crate::middleware::AdminContext;
use crate::models::{ActivityAction, ActorType, HistoryAction, HwidRequest};
use crate::util::{ActivityLogBuilder, RequestMeta, now_ms};

/// GET /admin/hwid-requests
/// Oldest first, so the queue reads in the order requests arrived.
pub async fn list_hwid_requests(State(state): State<AppState>) -> Result<Json<Vec<HwidRequest>>> {
    Ok(Json(queries::list_hwid_requests(state.store.as_ref())?))
}

fn load_request(state: &AppState, id: &str) -> Result<HwidRequest> {
    if !is_valid_prefixed_id(id) {
        return Err(AppError::NotFound(msg::REQUEST_NOT_FOUND.into()));
    }
    queries::get_hwid_request(state.store.as_ref(), id)?.or_not_found(msg::REQUEST_NOT_FOUND)
}

/// POST /admin/hwid-requests/{id}/approve
///
/// Unbinds the license and deletes the request. The client then registers
/// the new device itself.
pub async fn approve_hwid_request(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let request = load_request(&state, &id)?;
    let store = state.store.as_ref();

    let previous = queries::reset_hwid(
        store,
        &request.license_key,
        HistoryAction::ResetApproved,
        "admin",
        now_ms(),
    )?;
    queries::delete_hwid_request(store, &request.id)?;

    // The license may have been deleted while the request was pending
    let Some(previous) = previous else {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    };

    ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Admin, Some(&ctx.key_prefix))
        .action(ActivityAction::ApproveHwidReset)
        .license(&request.license_key)
        .hwid(&request.hwid)
        .details(serde_json::json!({
            "requestId": request.id,
            "previousHwid": previous,
        }))
        .save()?;

    tracing::info!(license = %request.license_key, request_id = %request.id, "HWID reset approved");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /admin/hwid-requests/{id}/deny
/// Deletes the request. The license is not touched.
pub async fn deny_hwid_request(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let request = load_request(&state, &id)?;
    let store = state.store.as_ref();

    if !queries::delete_hwid_request(store, &request.id)? {
        return Err(AppError::NotFound(msg::REQUEST_NOT_FOUND.into()));
    }

    ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Admin, Some(&ctx.key_prefix))
        .action(ActivityAction::DenyHwidReset)
        .license(&request.license_key)
        .hwid(&request.hwid)
        .details(serde_json::json!({ "requestId": request.id }))
        .save()?;

    tracing::info!(license = %request.license_key, request_id = %request.id, "HWID reset denied");
    Ok(Json(serde_json::json!({ "success": true })))
}
