use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::models::{ActivityAction, ActorType, CreateHwidRequest, HwidRequestStatus};
use crate::util::{ActivityLogBuilder, RequestMeta};

#[derive(Debug, Deserialize)]
pub struct HwidResetBody {
    #[serde(default)]
    pub license: String,
    /// The device the client wants to move to.
    #[serde(default)]
    pub hwid: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HwidResetResponse {
    pub request_id: String,
    pub status: HwidRequestStatus,
}

/// POST /api/request-hwid-reset
///
/// Queue a request for an admin to unbind the license. Nothing changes on the
/// license until the request is approved.
pub async fn request_hwid_reset(
    State(state): State<AppState>,
    meta: RequestMeta,
    Json(body): Json<HwidResetBody>,
) -> Result<Json<HwidResetResponse>> {
    let license_key = body.license.trim();
    let hwid = body.hwid.trim();
    if license_key.is_empty() {
        return Err(AppError::BadRequest(msg::MISSING_LICENSE.into()));
    }
    if hwid.is_empty() {
        return Err(AppError::BadRequest(msg::MISSING_HWID.into()));
    }

    let store = state.store.as_ref();
    let settings = queries::get_settings(store)?;
    if settings.maintenance_mode {
        return Err(AppError::ServiceUnavailable(msg::MAINTENANCE.into()));
    }
    if !settings.allow_hwid_change {
        return Err(AppError::Forbidden(msg::HWID_CHANGE_DISABLED.into()));
    }

    queries::get_license(store, license_key)?.or_not_found(msg::LICENSE_NOT_FOUND)?;

    let request = queries::create_hwid_request(
        store,
        &CreateHwidRequest {
            license_key: license_key.to_string(),
            hwid: hwid.to_string(),
            reason: body.reason.unwrap_or_default().trim().to_string(),
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
        },
    )?;

    ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Client, None)
        .action(ActivityAction::RequestHwidReset)
        .license(license_key)
        .hwid(hwid)
        .details(serde_json::json!({ "requestId": request.id }))
        .save_or_warn();

    tracing::info!(license = license_key, request_id = %request.id, "HWID reset requested");

    Ok(Json(HwidResetResponse {
        request_id: request.id,
        status: request.status,
    }))
}
