use axum::extract::State;

use crate::db::AppState;
use crate::extractors::LicenseHwid;
use crate::licensing::{RegisterOutcome, ValidateOutcome};
use crate::util::RequestMeta;

/// GET /api/validate?license=&hwid=
pub async fn validate(
    State(state): State<AppState>,
    meta: RequestMeta,
    LicenseHwid { license, hwid }: LicenseHwid,
) -> ValidateOutcome {
    state.engine().validate(&license, &hwid, &meta)
}

/// GET /api/register?license=&hwid=
///
/// The first successful call binds `hwid` to the license. The client's IP and
/// user agent are kept on the record.
pub async fn register(
    State(state): State<AppState>,
    meta: RequestMeta,
    LicenseHwid { license, hwid }: LicenseHwid,
) -> RegisterOutcome {
    state.engine().register(&license, &hwid, &meta)
}
