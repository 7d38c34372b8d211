use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

/// Globally banned HWIDs, stored as one document (`settings/banlist`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BanList {
    #[serde(default)]
    pub hwids: Vec<String>,
}

/// Exact, case-sensitive membership.
pub fn is_banned(hwid: &str, list: &[String]) -> bool {
    list.iter().any(|banned| banned == hwid)
}

impl BanList {
    pub fn contains(&self, hwid: &str) -> bool {
        is_banned(hwid, &self.hwids)
    }

    /// Add `hwid` if absent. Returns whether the list changed.
    pub fn ban(&mut self, hwid: &str) -> Result<bool> {
        if hwid.trim().is_empty() {
            return Err(AppError::BadRequest(msg::EMPTY_HWID.into()));
        }
        if self.contains(hwid) {
            return Ok(false);
        }
        self.hwids.push(hwid.to_string());
        Ok(true)
    }

    /// Remove every entry equal to `hwid`. Returns whether the list changed.
    pub fn unban(&mut self, hwid: &str) -> bool {
        let before = self.hwids.len();
        self.hwids.retain(|banned| banned != hwid);
        self.hwids.len() != before
    }
}
