use serde::{Deserialize, Serialize};

/// Operator-editable settings stored in `settings/general`.
/// Fields missing from the stored document take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Gates the entire public validate/register API.
    pub api_enabled: bool,
    pub max_devices_per_license: u32,
    /// Whether clients may submit HWID reset requests.
    pub allow_hwid_change: bool,
    /// Default lifetime for new licenses without an explicit expiry (0 = never expire).
    pub auto_expire_in_days: u32,
    pub maintenance_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_enabled: true,
            max_devices_per_license: 1,
            allow_hwid_change: true,
            auto_expire_in_days: 0,
            maintenance_mode: false,
        }
    }
}

impl Settings {
    /// Expiry to stamp on a newly created license that didn't specify one.
    pub fn default_expiry(&self, now: i64) -> Option<i64> {
        (self.auto_expire_in_days > 0)
            .then(|| now + i64::from(self.auto_expire_in_days) * crate::util::MS_PER_DAY)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_devices_per_license: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_hwid_change: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_expire_in_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_mode: Option<bool>,
}

impl UpdateSettings {
    pub fn is_empty(&self) -> bool {
        self.api_enabled.is_none()
            && self.max_devices_per_license.is_none()
            && self.allow_hwid_change.is_none()
            && self.auto_expire_in_days.is_none()
            && self.maintenance_mode.is_none()
    }
}
