//! License validation and registration decisions.
//!
//! `decide_validate` and `decide_register` are pure: they see a snapshot of
//! settings, the ban list, and the named license, and return an outcome.
//! Persistence and side effects live in [`engine`].

mod engine;
mod keygen;

pub use engine::LicenseEngine;
pub use keygen::{generate_key, is_valid_key_format};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use strum::{AsRefStr, Display, EnumString};

use crate::models::{License, Settings, is_banned};

/// Outcome of `GET /api/validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidateOutcome {
    Failed,
    ApiDisabled,
    Banned,
    InvalidLicense,
    Expired,
    Valid,
    HwidMismatch,
    Error,
}

/// Outcome of `GET /api/register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RegisterOutcome {
    Failed,
    ApiDisabled,
    Banned,
    InvalidLicense,
    Expired,
    AlreadyRegistered,
    HwidInUse,
    Success,
    Error,
}

impl ValidateOutcome {
    /// Policy outcomes are audited; input errors and faults are not.
    pub fn is_logged(&self) -> bool {
        !matches!(self, Self::Failed | Self::Error)
    }

    /// Named outcomes are answers, not faults.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Failed => StatusCode::BAD_REQUEST,
            Self::Error => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }
}

impl RegisterOutcome {
    pub fn is_logged(&self) -> bool {
        !matches!(self, Self::Failed | Self::Error)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Failed => StatusCode::BAD_REQUEST,
            Self::Error => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }
}

impl IntoResponse for ValidateOutcome {
    fn into_response(self) -> Response {
        (self.status(), self.as_ref().to_string()).into_response()
    }
}

impl IntoResponse for RegisterOutcome {
    fn into_response(self) -> Response {
        (self.status(), self.as_ref().to_string()).into_response()
    }
}

/// Global state every decision is gated on.
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    pub settings: &'a Settings,
    pub banlist: &'a [String],
    pub now: i64,
}

/// Both inputs are required; blank counts as missing.
pub fn is_missing_input(key: &str, hwid: &str) -> bool {
    key.trim().is_empty() || hwid.trim().is_empty()
}

/// Expired strictly after the expiry instant. No expiry means never.
pub fn is_expired(license: &License, now: i64) -> bool {
    license.is_expired(now)
}

/// Shared prefix of both decisions: disabled API, banned HWID, unknown key,
/// expired license, in that order.
enum Gated<'l> {
    ApiDisabled,
    Banned,
    InvalidLicense,
    Expired,
    Open(&'l License),
}

fn gate<'l>(g: &Gate<'_>, license: Option<&'l License>, hwid: &str) -> Gated<'l> {
    if !g.settings.api_enabled {
        return Gated::ApiDisabled;
    }
    if is_banned(hwid, g.banlist) {
        return Gated::Banned;
    }
    let Some(license) = license else {
        return Gated::InvalidLicense;
    };
    if is_expired(license, g.now) {
        return Gated::Expired;
    }
    Gated::Open(license)
}

/// Decide a validation. Validating never binds: an unbound license is a mismatch.
pub fn decide_validate(
    g: &Gate<'_>,
    license: Option<&License>,
    key: &str,
    hwid: &str,
) -> ValidateOutcome {
    if is_missing_input(key, hwid) {
        return ValidateOutcome::Failed;
    }
    match gate(g, license, hwid) {
        Gated::ApiDisabled => ValidateOutcome::ApiDisabled,
        Gated::Banned => ValidateOutcome::Banned,
        Gated::InvalidLicense => ValidateOutcome::InvalidLicense,
        Gated::Expired => ValidateOutcome::Expired,
        Gated::Open(license) if license.hwid == hwid => ValidateOutcome::Valid,
        Gated::Open(_) => ValidateOutcome::HwidMismatch,
    }
}

/// Decide a registration.
///
/// `hwid_taken_elsewhere` is only consulted once every cheaper check has
/// passed, since it scans every license.
pub fn decide_register<E>(
    g: &Gate<'_>,
    license: Option<&License>,
    key: &str,
    hwid: &str,
    hwid_taken_elsewhere: impl FnOnce() -> Result<bool, E>,
) -> Result<RegisterOutcome, E> {
    if is_missing_input(key, hwid) {
        return Ok(RegisterOutcome::Failed);
    }
    let license = match gate(g, license, hwid) {
        Gated::ApiDisabled => return Ok(RegisterOutcome::ApiDisabled),
        Gated::Banned => return Ok(RegisterOutcome::Banned),
        Gated::InvalidLicense => return Ok(RegisterOutcome::InvalidLicense),
        Gated::Expired => return Ok(RegisterOutcome::Expired),
        Gated::Open(license) => license,
    };
    // Same HWID falls through: re-registering refreshes timestamps
    if license.is_bound() && license.hwid != hwid {
        return Ok(RegisterOutcome::AlreadyRegistered);
    }
    if hwid_taken_elsewhere()? {
        return Ok(RegisterOutcome::HwidInUse);
    }
    Ok(RegisterOutcome::Success)
}
