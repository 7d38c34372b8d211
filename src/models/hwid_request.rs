use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HwidRequestStatus {
    Pending,
}

/// A client's request to unbind a license from its current device.
///
/// Requests are resolved by deletion (approve or deny); they are never
/// updated to another status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HwidRequest {
    pub id: String,
    pub license_key: String,
    /// The HWID the client wants to move to.
    pub hwid: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub status: HwidRequestStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateHwidRequest {
    pub license_key: String,
    pub hwid: String,
    pub reason: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}
