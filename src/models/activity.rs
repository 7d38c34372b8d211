use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActorType {
    Admin,
    Client,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityAction {
    Validate,
    Register,
    CreateLicense,
    BulkCreateLicenses,
    DeleteLicense,
    ResetHwid,
    RequestHwidReset,
    ApproveHwidReset,
    DenyHwidReset,
    BanHwid,
    UnbanHwid,
    UpdateSettings,
    SeedLicenses,
}

/// One entry of the append-only activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub timestamp: i64,
    pub actor_type: ActorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub action: ActivityAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hwid: Option<String>,
    /// Outcome code for validate/register attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ActivityEntry {
    /// Human-readable one-liner for the dashboard feed.
    ///
    /// Format: `[TIMESTAMP] [Actor] action LICENSE (hwid HWID) -> OUTCOME`
    pub fn formatted(&self) -> String {
        use chrono::{TimeZone, Utc};

        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp)
            .single()
            .map(|dt| format!("[{}]", dt.format("%Y-%m-%d %H:%M:%S")))
            .unwrap_or_else(|| format!("[{}]", self.timestamp));

        // Fixed width for alignment, [Client] is longest
        let actor = match self.actor_type {
            ActorType::Admin => "[Admin] ",
            ActorType::Client => "[Client]",
            ActorType::System => "[System]",
        };

        let mut line = format!(
            "{} {} {}",
            timestamp,
            actor,
            self.action.as_ref().replace('_', " ")
        );
        if let Some(ref key) = self.license_key {
            line.push(' ');
            line.push_str(key);
        }
        if let Some(ref hwid) = self.hwid {
            line.push_str(&format!(" (hwid {})", hwid));
        }
        if let Some(ref outcome) = self.outcome {
            line.push_str(&format!(" -> {}", outcome));
        }
        line
    }
}

/// Activity entry with its display line, as returned by the admin API.
#[derive(Debug, Serialize)]
pub struct ActivityEntryWithFormatted {
    #[serde(flatten)]
    pub entry: ActivityEntry,
    pub formatted: String,
}

impl From<ActivityEntry> for ActivityEntryWithFormatted {
    fn from(entry: ActivityEntry) -> Self {
        let formatted = entry.formatted();
        Self { entry, formatted }
    }
}
