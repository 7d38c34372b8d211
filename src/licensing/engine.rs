use std::sync::{Mutex, PoisonError};

use super::{Gate, RegisterOutcome, ValidateOutcome, decide_register, decide_validate, is_missing_input};
use crate::db::DocumentStore;
use crate::db::queries::{self, BindResult};
use crate::error::{AppError, Result};
use crate::models::{Activation, ActivityAction, ActorType};
use crate::util::{ActivityLogBuilder, RequestMeta, now_ms};

/// Lost compare-and-swaps are re-decided from fresh state this many times.
const MAX_BIND_ATTEMPTS: usize = 3;

/// Runs validate/register against the store: loads the snapshot, decides,
/// applies the side effect, and writes the activity entry.
///
/// Never returns an error. Persistence faults become the `ERROR` outcome and
/// are only logged locally.
pub struct LicenseEngine<'a> {
    store: &'a dyn DocumentStore,
    registrations: &'a Mutex<()>,
}

impl<'a> LicenseEngine<'a> {
    pub fn new(store: &'a dyn DocumentStore, registrations: &'a Mutex<()>) -> Self {
        Self {
            store,
            registrations,
        }
    }

    pub fn validate(&self, key: &str, hwid: &str, meta: &RequestMeta) -> ValidateOutcome {
        if is_missing_input(key, hwid) {
            return ValidateOutcome::Failed;
        }

        match self.try_validate(key, hwid) {
            Ok(outcome) => {
                if outcome.is_logged() {
                    self.log(ActivityAction::Validate, key, hwid, outcome.as_ref(), meta);
                }
                tracing::debug!(license = key, outcome = outcome.as_ref(), "validate");
                outcome
            }
            Err(e) => {
                tracing::error!(license = key, "validate failed: {}", e);
                ValidateOutcome::Error
            }
        }
    }

    pub fn register(&self, key: &str, hwid: &str, meta: &RequestMeta) -> RegisterOutcome {
        if is_missing_input(key, hwid) {
            return RegisterOutcome::Failed;
        }

        match self.try_register(key, hwid, meta) {
            Ok(outcome) => {
                if outcome.is_logged() {
                    self.log(ActivityAction::Register, key, hwid, outcome.as_ref(), meta);
                }
                if outcome == RegisterOutcome::Success {
                    tracing::info!(license = key, hwid, "license registered");
                } else {
                    tracing::debug!(license = key, outcome = outcome.as_ref(), "register");
                }
                outcome
            }
            Err(e) => {
                tracing::error!(license = key, "register failed: {}", e);
                RegisterOutcome::Error
            }
        }
    }

    fn try_validate(&self, key: &str, hwid: &str) -> Result<ValidateOutcome> {
        let settings = queries::get_settings(self.store)?;
        let banlist = queries::get_banlist(self.store)?;
        let license = queries::get_license(self.store, key)?;
        let now = now_ms();

        let gate = Gate {
            settings: &settings,
            banlist: &banlist.hwids,
            now,
        };
        let outcome = decide_validate(&gate, license.as_ref(), key, hwid);

        if outcome == ValidateOutcome::Valid && !queries::touch_last_validated(self.store, key, now)? {
            // Deleted between the read and the stamp
            return Ok(ValidateOutcome::InvalidLicense);
        }
        Ok(outcome)
    }

    fn try_register(&self, key: &str, hwid: &str, meta: &RequestMeta) -> Result<RegisterOutcome> {
        // Scan and bind must not interleave with another registration in this process
        let _guard = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let activation = Activation {
            ip: meta.ip.clone(),
            device_info: meta.user_agent.clone(),
        };

        for attempt in 1..=MAX_BIND_ATTEMPTS {
            let settings = queries::get_settings(self.store)?;
            let banlist = queries::get_banlist(self.store)?;
            let license = queries::get_license(self.store, key)?;
            let now = now_ms();

            let gate = Gate {
                settings: &settings,
                banlist: &banlist.hwids,
                now,
            };
            let outcome = decide_register(&gate, license.as_ref(), key, hwid, || {
                queries::find_license_by_hwid(self.store, hwid, key).map(|other| other.is_some())
            })?;
            if outcome != RegisterOutcome::Success {
                return Ok(outcome);
            }

            let expected = license.map(|l| l.hwid).unwrap_or_default();
            match queries::bind_hwid(self.store, key, &expected, hwid, now, &activation)? {
                BindResult::Bound => return Ok(RegisterOutcome::Success),
                BindResult::Missing => return Ok(RegisterOutcome::InvalidLicense),
                BindResult::Stale => {
                    tracing::warn!(license = key, attempt, "license changed during registration, retrying");
                }
            }
        }

        Err(AppError::Internal(format!(
            "license {} kept changing during registration",
            key
        )))
    }

    fn log(&self, action: ActivityAction, key: &str, hwid: &str, outcome: &str, meta: &RequestMeta) {
        ActivityLogBuilder::new(self.store, meta)
            .actor(ActorType::Client, None)
            .action(action)
            .license(key)
            .hwid(hwid)
            .outcome(outcome)
            .save_or_warn();
    }
}
