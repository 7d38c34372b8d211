use axum::extract::State;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Query};
use crate::models::{License, LicenseStatus};
use crate::util::now_ms;

#[derive(Debug, Deserialize)]
pub struct LicenseInfoQuery {
    #[serde(default)]
    pub license: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfoResponse {
    pub license: String,
    pub status: LicenseStatus,
    pub bound: bool,
    pub activated_at: Option<i64>,
    pub expiry: Option<i64>,
    pub last_validated: Option<i64>,
    pub maintenance: bool,
    /// One-line summary for display in client software.
    pub summary: String,
}

fn format_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn summarize(license: &License, status: LicenseStatus) -> String {
    let mut parts = vec![match status {
        LicenseStatus::Active => "Active".to_string(),
        LicenseStatus::Unactivated => "Not activated".to_string(),
        LicenseStatus::Expired => "Expired".to_string(),
    }];
    if let Some(at) = license.activated_at.filter(|_| license.is_bound()) {
        parts.push(format!("activated {}", format_ms(at)));
    }
    match license.expiry {
        Some(expiry) => parts.push(format!("expires {}", format_ms(expiry))),
        None => parts.push("never expires".to_string()),
    }
    if let Some(seen) = license.last_validated {
        parts.push(format!("last seen {}", format_ms(seen)));
    }
    parts.join(", ")
}

/// GET /api/license-info?license=
///
/// Status summary for a key. Does not reveal the bound HWID.
pub async fn license_info(
    State(state): State<AppState>,
    Query(query): Query<LicenseInfoQuery>,
) -> Result<Json<LicenseInfoResponse>> {
    let key = query
        .license
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest(msg::MISSING_LICENSE.into()))?;

    let store = state.store.as_ref();
    let license = queries::get_license(store, key)?.or_not_found(msg::LICENSE_NOT_FOUND)?;
    let settings = queries::get_settings(store)?;

    let status = license.status(now_ms());
    Ok(Json(LicenseInfoResponse {
        summary: summarize(&license, status),
        bound: license.is_bound(),
        license: license.key,
        status,
        activated_at: license.activated_at,
        expiry: license.expiry,
        last_validated: license.last_validated,
        maintenance: settings.maintenance_mode,
    }))
}
