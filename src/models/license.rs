use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, EnumString};

/// Stored field names, for partial updates that bypass full (de)serialization.
pub mod fields {
    pub const HWID: &str = "hwid";
    pub const ACTIVATED_AT: &str = "activatedAt";
    pub const LAST_VALIDATED: &str = "lastValidated";
    pub const ACTIVATION_IP: &str = "activationIP";
    pub const DEVICE_INFO: &str = "deviceInfo";
    pub const HISTORY: &str = "history";
}

/// A license record, keyed by its license key.
///
/// Timestamps are unix milliseconds. `hwid` is empty while the license is unbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// Mirrors the document key; the store key wins on read.
    #[serde(default)]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hwid: String,
    /// Absolute expiry; `None` never expires.
    #[serde(default)]
    pub expiry: Option<i64>,
    #[serde(default)]
    pub activated_at: Option<i64>,
    #[serde(default)]
    pub last_validated: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub created_by: String,
    /// Append-only.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default, rename = "activationIP")]
    pub activation_ip: Option<String>,
    #[serde(default)]
    pub device_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

/// Unbound licenses may store `hwid` as `""`, `null`, or not at all.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl License {
    pub fn is_bound(&self) -> bool {
        !self.hwid.is_empty()
    }

    /// Expired strictly after the expiry instant; a license without expiry never expires.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry.is_some_and(|expiry| now > expiry)
    }

    /// Status derived at read time; expiry is never a stored transition.
    pub fn status(&self, now: i64) -> LicenseStatus {
        if self.is_expired(now) {
            LicenseStatus::Expired
        } else if self.is_bound() {
            LicenseStatus::Active
        } else {
            LicenseStatus::Unactivated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LicenseStatus {
    Active,
    Unactivated,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub timestamp: i64,
    /// Who caused the entry (`"admin"`, `"client"`, `"system"`).
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HistoryEntry {
    pub fn new(action: HistoryAction, timestamp: i64, actor: &str, detail: Option<String>) -> Self {
        Self {
            action,
            timestamp,
            actor: actor.to_string(),
            detail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Create,
    Register,
    ResetHwid,
    ResetApproved,
}

/// Input for creating a single license.
#[derive(Debug, Clone, Default)]
pub struct CreateLicense {
    pub key: String,
    pub expiry: Option<i64>,
    pub created_by: String,
    pub batch_id: Option<String>,
}

/// Client details recorded when a license is bound.
#[derive(Debug, Clone, Default)]
pub struct Activation {
    pub ip: Option<String>,
    pub device_info: Option<String>,
}
