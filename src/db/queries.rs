//! Typed record stores over the document collections.
//!
//! Each function is atomic for the one document it touches. Nothing here
//! spans documents transactionally; `register` closes the resulting race
//! with a compare-and-swap in `bind_hwid` (see `licensing::engine`).

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use super::collections::{
    ACTIVITY_LOG, BANLIST_DOC, GENERAL_DOC, HWID_REQUESTS, LICENSES, SETTINGS,
};
use super::{Document, DocumentStore, UpdateResult, decode, encode, merge_fields};
use crate::error::{AppError, Result, msg};
use crate::id::EntityType;
use crate::models::*;
use crate::util::{MS_PER_DAY, now_ms};

/// Append one history entry to a license document in place.
/// Returns `false` if the stored history is not an array.
fn push_history(doc: &mut Document, entry: Value) -> bool {
    let history = doc
        .entry(fields::HISTORY)
        .or_insert_with(|| Value::Array(Vec::new()));
    if history.is_null() {
        *history = Value::Array(Vec::new());
    }
    match history.as_array_mut() {
        Some(items) => {
            items.push(entry);
            true
        }
        None => false,
    }
}

fn current_hwid(doc: &Document) -> &str {
    doc.get(fields::HWID).and_then(Value::as_str).unwrap_or("")
}

fn malformed_history(key: &str) -> AppError {
    AppError::Internal(format!("license {} has a malformed history field", key))
}

// ============ Licenses ============

/// Create a license. Fails with `Conflict` if the key exists; the existing
/// record is left untouched.
pub fn create_license(store: &dyn DocumentStore, input: &CreateLicense) -> Result<License> {
    let now = now_ms();
    let license = License {
        key: input.key.clone(),
        hwid: String::new(),
        expiry: input.expiry,
        activated_at: None,
        last_validated: None,
        created_at: now,
        created_by: input.created_by.clone(),
        history: vec![HistoryEntry::new(
            HistoryAction::Create,
            now,
            &input.created_by,
            None,
        )],
        activation_ip: None,
        device_info: None,
        batch_id: input.batch_id.clone(),
    };

    if !store.create(LICENSES, &license.key, encode(&license)?)? {
        return Err(AppError::Conflict(msg::LICENSE_EXISTS.into()));
    }
    Ok(license)
}

fn license_from_doc(key: String, doc: Document) -> Result<License> {
    let mut license: License = decode(doc)?;
    license.key = key;
    Ok(license)
}

pub fn get_license(store: &dyn DocumentStore, key: &str) -> Result<Option<License>> {
    store
        .get(LICENSES, key)?
        .map(|doc| license_from_doc(key.to_string(), doc))
        .transpose()
}

/// All licenses, oldest first.
pub fn list_licenses(store: &dyn DocumentStore) -> Result<Vec<License>> {
    store
        .list(LICENSES)?
        .into_iter()
        .map(|(key, doc)| license_from_doc(key, doc))
        .collect()
}

pub fn delete_license(store: &dyn DocumentStore, key: &str) -> Result<bool> {
    store.delete(LICENSES, key)
}

/// Find a license other than `exclude_key` bound to `hwid`.
///
/// Full scan of the collection: HWID uniqueness is global across all licenses
/// and there is no secondary index.
pub fn find_license_by_hwid(
    store: &dyn DocumentStore,
    hwid: &str,
    exclude_key: &str,
) -> Result<Option<String>> {
    for (key, doc) in store.list(LICENSES)? {
        if key != exclude_key && current_hwid(&doc) == hwid {
            return Ok(Some(key));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindResult {
    Bound,
    /// The stored HWID no longer matched the expected one; nothing was written.
    Stale,
    Missing,
}

/// Bind `hwid` to a license, but only if its stored HWID still equals
/// `expected_hwid`. Stamps activation/validation times, records the client,
/// and appends a `REGISTER` history entry in the same write.
pub fn bind_hwid(
    store: &dyn DocumentStore,
    key: &str,
    expected_hwid: &str,
    hwid: &str,
    now: i64,
    activation: &Activation,
) -> Result<BindResult> {
    let entry = serde_json::to_value(HistoryEntry::new(
        HistoryAction::Register,
        now,
        "client",
        Some(format!("hwid {}", hwid)),
    ))?;
    let mut malformed = false;

    let result = store.update(LICENSES, key, &mut |doc| {
        if current_hwid(doc) != expected_hwid {
            return false;
        }
        if !push_history(doc, entry.clone()) {
            malformed = true;
            return false;
        }
        doc.insert(fields::HWID.into(), json!(hwid));
        doc.insert(fields::ACTIVATED_AT.into(), json!(now));
        doc.insert(fields::LAST_VALIDATED.into(), json!(now));
        doc.insert(fields::ACTIVATION_IP.into(), json!(activation.ip));
        doc.insert(fields::DEVICE_INFO.into(), json!(activation.device_info));
        true
    })?;

    if malformed {
        return Err(malformed_history(key));
    }
    Ok(match result {
        UpdateResult::Applied => BindResult::Bound,
        UpdateResult::Skipped => BindResult::Stale,
        UpdateResult::Missing => BindResult::Missing,
    })
}

/// Record a successful validation. Returns `false` if the license vanished.
pub fn touch_last_validated(store: &dyn DocumentStore, key: &str, now: i64) -> Result<bool> {
    let result = store.update(LICENSES, key, &mut |doc| {
        doc.insert(fields::LAST_VALIDATED.into(), json!(now));
        true
    })?;
    Ok(result == UpdateResult::Applied)
}

/// Unbind a license from its device. Returns the previous HWID (empty if it
/// was already unbound), or `None` if the license doesn't exist.
pub fn reset_hwid(
    store: &dyn DocumentStore,
    key: &str,
    action: HistoryAction,
    actor: &str,
    now: i64,
) -> Result<Option<String>> {
    let mut previous = None;
    let mut malformed = false;

    let result = store.update(LICENSES, key, &mut |doc| {
        let old = current_hwid(doc).to_string();
        let detail = (!old.is_empty()).then(|| format!("previous hwid {}", old));
        let Ok(entry) = serde_json::to_value(HistoryEntry::new(action, now, actor, detail)) else {
            malformed = true;
            return false;
        };
        if !push_history(doc, entry) {
            malformed = true;
            return false;
        }
        doc.insert(fields::HWID.into(), json!(""));
        previous = Some(old);
        true
    })?;

    if malformed {
        return Err(malformed_history(key));
    }
    Ok(match result {
        UpdateResult::Applied => previous,
        UpdateResult::Skipped | UpdateResult::Missing => None,
    })
}

// ============ Singleton settings documents ============

/// Read-modify-write one of the singleton documents in `settings`, creating it
/// from `T::default()` when absent. `modify` returns whether it changed anything.
fn modify_singleton<T, F>(store: &dyn DocumentStore, key: &str, mut modify: F) -> Result<(T, bool)>
where
    T: Default + Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> Result<bool>,
{
    // Second pass only happens if another writer created the document first
    for _ in 0..2 {
        let mut failure = None;
        let mut outcome = None;

        let result = store.update(SETTINGS, key, &mut |doc| {
            let mut value: T = match decode(doc.clone()) {
                Ok(v) => v,
                Err(e) => {
                    failure = Some(e);
                    return false;
                }
            };
            let changed = match modify(&mut value) {
                Ok(changed) => changed,
                Err(e) => {
                    failure = Some(e);
                    return false;
                }
            };
            if changed {
                match encode(&value) {
                    Ok(patch) => merge_fields(doc, patch),
                    Err(e) => {
                        failure = Some(e);
                        return false;
                    }
                }
            }
            outcome = Some((value, changed));
            changed
        })?;

        if let Some(e) = failure {
            return Err(e);
        }

        match result {
            UpdateResult::Missing => {
                let mut value = T::default();
                if !modify(&mut value)? {
                    return Ok((value, false));
                }
                if store.create(SETTINGS, key, encode(&value)?)? {
                    return Ok((value, true));
                }
            }
            UpdateResult::Applied | UpdateResult::Skipped => {
                return outcome.ok_or_else(|| {
                    AppError::Internal(format!("settings/{} update produced no value", key))
                });
            }
        }
    }

    Err(AppError::Internal(format!(
        "settings/{} could not be created or updated",
        key
    )))
}

// ============ Ban List ============

pub fn get_banlist(store: &dyn DocumentStore) -> Result<BanList> {
    match store.get(SETTINGS, BANLIST_DOC)? {
        Some(doc) => decode(doc),
        None => Ok(BanList::default()),
    }
}

/// Ban a HWID. Returns `false` if it was already banned.
pub fn ban_hwid(store: &dyn DocumentStore, hwid: &str) -> Result<bool> {
    let (_, changed) = modify_singleton(store, BANLIST_DOC, |list: &mut BanList| list.ban(hwid))?;
    Ok(changed)
}

/// Unban a HWID. Returns `false` if it wasn't banned.
pub fn unban_hwid(store: &dyn DocumentStore, hwid: &str) -> Result<bool> {
    let (_, changed) =
        modify_singleton(store, BANLIST_DOC, |list: &mut BanList| Ok(list.unban(hwid)))?;
    Ok(changed)
}

// ============ Settings ============

pub fn get_settings(store: &dyn DocumentStore) -> Result<Settings> {
    match store.get(SETTINGS, GENERAL_DOC)? {
        Some(doc) => decode(doc),
        None => Ok(Settings::default()),
    }
}

/// Overwrite only the fields present in `patch`. Fields the patch omits,
/// including ones this version doesn't know, are kept as stored.
pub fn update_settings(store: &dyn DocumentStore, patch: &UpdateSettings) -> Result<Settings> {
    if !patch.is_empty() {
        store.merge(SETTINGS, GENERAL_DOC, encode(patch)?)?;
    }
    get_settings(store)
}

// ============ HWID Reset Requests ============

/// Create a pending reset request. At most one pending request per license.
pub fn create_hwid_request(
    store: &dyn DocumentStore,
    input: &CreateHwidRequest,
) -> Result<HwidRequest> {
    if pending_request_for_license(store, &input.license_key)?.is_some() {
        return Err(AppError::Conflict(msg::REQUEST_PENDING.into()));
    }

    let request = HwidRequest {
        id: EntityType::HwidRequest.gen_id(),
        license_key: input.license_key.clone(),
        hwid: input.hwid.clone(),
        reason: input.reason.clone(),
        ip: input.ip.clone(),
        user_agent: input.user_agent.clone(),
        status: HwidRequestStatus::Pending,
        created_at: now_ms(),
    };

    if !store.create(HWID_REQUESTS, &request.id, encode(&request)?)? {
        return Err(AppError::Internal("reset request id collision".into()));
    }
    Ok(request)
}

pub fn get_hwid_request(store: &dyn DocumentStore, id: &str) -> Result<Option<HwidRequest>> {
    store.get(HWID_REQUESTS, id)?.map(decode).transpose()
}

/// All requests, oldest first.
pub fn list_hwid_requests(store: &dyn DocumentStore) -> Result<Vec<HwidRequest>> {
    store
        .list(HWID_REQUESTS)?
        .into_iter()
        .map(|(_, doc)| decode(doc))
        .collect()
}

pub fn pending_request_for_license(
    store: &dyn DocumentStore,
    license_key: &str,
) -> Result<Option<HwidRequest>> {
    Ok(list_hwid_requests(store)?
        .into_iter()
        .find(|r| r.license_key == license_key && r.status == HwidRequestStatus::Pending))
}

pub fn delete_hwid_request(store: &dyn DocumentStore, id: &str) -> Result<bool> {
    store.delete(HWID_REQUESTS, id)
}

/// Drop every request for a license (used when the license itself is deleted).
pub fn delete_hwid_requests_for_license(
    store: &dyn DocumentStore,
    license_key: &str,
) -> Result<usize> {
    let mut removed = 0;
    for request in list_hwid_requests(store)? {
        if request.license_key == license_key && store.delete(HWID_REQUESTS, &request.id)? {
            removed += 1;
        }
    }
    Ok(removed)
}

// ============ Activity Log ============

pub fn log_activity(store: &dyn DocumentStore, entry: &ActivityEntry) -> Result<()> {
    if !store.create(ACTIVITY_LOG, &entry.id, encode(entry)?)? {
        return Err(AppError::Internal("activity id collision".into()));
    }
    Ok(())
}

/// Newest entries first.
pub fn recent_activity(store: &dyn DocumentStore, limit: usize) -> Result<Vec<ActivityEntry>> {
    store
        .recent(ACTIVITY_LOG, limit)?
        .into_iter()
        .map(|(_, doc)| decode(doc))
        .collect()
}

pub fn purge_old_activity(store: &dyn DocumentStore, retention_days: i64) -> Result<usize> {
    // Retention longer than the clock's range purges nothing
    let cutoff = now_ms().saturating_sub(retention_days.saturating_mul(MS_PER_DAY));
    store.purge_before(ACTIVITY_LOG, cutoff)
}

// ============ Dashboard ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_licenses: i64,
    pub activated: i64,
    pub unactivated: i64,
    pub expired: i64,
    pub banned_hwids: i64,
    pub pending_requests: i64,
    pub activity_entries: i64,
}

pub fn dashboard_stats(store: &dyn DocumentStore, now: i64) -> Result<DashboardStats> {
    let mut stats = DashboardStats::default();

    for license in list_licenses(store)? {
        stats.total_licenses += 1;
        match license.status(now) {
            LicenseStatus::Active => stats.activated += 1,
            LicenseStatus::Unactivated => stats.unactivated += 1,
            LicenseStatus::Expired => stats.expired += 1,
        }
    }

    stats.banned_hwids = get_banlist(store)?.hwids.len() as i64;
    stats.pending_requests = list_hwid_requests(store)?
        .iter()
        .filter(|r| r.status == HwidRequestStatus::Pending)
        .count() as i64;
    stats.activity_entries = store.count(ACTIVITY_LOG)?;

    Ok(stats)
}
