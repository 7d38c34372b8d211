use axum::extract::{Extension, State};
use serde::{Deserialize, Serialize};

use crate::config::is_valid_key_prefix;
use crate::db::{AppState, DocumentStore, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::id::EntityType;
use crate::licensing::generate_key;
use crate::middleware::AdminContext;
use crate::models::{
    ActivityAction, ActorType, CreateLicense, HistoryAction, HwidRequest, License, LicenseStatus,
};
use crate::pagination::{Paginated, PaginationQuery};
use crate::util::{ActivityLogBuilder, RequestMeta, now_ms};

/// Generated keys are retried this many times on the (unlikely) duplicate.
const MAX_KEY_ATTEMPTS: usize = 5;
const MAX_BULK_COUNT: u32 = 100;
const MAX_KEY_LEN: usize = 128;
/// Static segments under `/admin/licenses/` that a `{key}` route can't reach.
const RESERVED_KEYS: &[&str] = &["bulk"];

/// License plus its derived status.
#[derive(Debug, Serialize)]
pub struct LicenseView {
    #[serde(flatten)]
    pub license: License,
    pub status: LicenseStatus,
}

impl LicenseView {
    fn new(license: License, now: i64) -> Self {
        let status = license.status(now);
        Self { license, status }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseDetail {
    #[serde(flatten)]
    pub view: LicenseView,
    pub pending_request: Option<HwidRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListLicensesQuery {
    /// Only licenses with this derived status
    pub status: Option<LicenseStatus>,
    /// Substring match on key or bound HWID (for support lookups)
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListLicensesQuery {
    fn page(&self) -> PaginationQuery {
        PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// GET /admin/licenses
/// Newest first.
pub async fn list_licenses(
    State(state): State<AppState>,
    Query(query): Query<ListLicensesQuery>,
) -> Result<Json<Paginated<LicenseView>>> {
    let now = now_ms();
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let mut licenses: Vec<LicenseView> = queries::list_licenses(state.store.as_ref())?
        .into_iter()
        .map(|l| LicenseView::new(l, now))
        .filter(|v| query.status.is_none_or(|s| v.status == s))
        .filter(|v| {
            search.is_none_or(|s| v.license.key.contains(s) || v.license.hwid.contains(s))
        })
        .collect();
    licenses.reverse();

    Ok(Json(query.page().paginate(licenses)))
}

/// GET /admin/licenses/{key}
pub async fn get_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LicenseDetail>> {
    let store = state.store.as_ref();
    let license = queries::get_license(store, &key)?.or_not_found(msg::LICENSE_NOT_FOUND)?;
    let pending_request = queries::pending_request_for_license(store, &key)?;

    Ok(Json(LicenseDetail {
        view: LicenseView::new(license, now_ms()),
        pending_request,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLicenseBody {
    /// Explicit key; generated when absent
    #[serde(default)]
    pub key: Option<String>,
    /// Absolute expiry (unix ms). Falls back to `autoExpireInDays` when absent.
    #[serde(default)]
    pub expiry: Option<i64>,
    /// Prefix for a generated key (defaults to `LICENSE_KEY_PREFIX`)
    #[serde(default)]
    pub prefix: Option<String>,
}

fn resolve_prefix(state: &AppState, prefix: Option<&str>) -> Result<String> {
    match prefix.map(str::trim) {
        None | Some("") => Ok(state.config.license_key_prefix.clone()),
        Some(p) if is_valid_key_prefix(p) => Ok(p.to_string()),
        Some(_) => Err(AppError::BadRequest(msg::INVALID_PREFIX.into())),
    }
}

/// An explicit key must stay addressable as `/admin/licenses/{key}`.
fn check_explicit_key(key: &str) -> Result<()> {
    if key.len() > MAX_KEY_LEN || key.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(msg::INVALID_KEY.into()));
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(AppError::BadRequest(msg::RESERVED_KEY.into()));
    }
    Ok(())
}

fn resolve_expiry(store: &dyn DocumentStore, expiry: Option<i64>, now: i64) -> Result<Option<i64>> {
    match expiry {
        Some(expiry) => Ok(Some(expiry)),
        None => Ok(queries::get_settings(store)?.default_expiry(now)),
    }
}

/// Create a license under a freshly generated key. Duplicates are never
/// overwritten: a collision just draws another key.
fn create_generated(
    store: &dyn DocumentStore,
    prefix: &str,
    expiry: Option<i64>,
    batch_id: Option<&str>,
) -> Result<License> {
    for _ in 0..MAX_KEY_ATTEMPTS {
        let input = CreateLicense {
            key: generate_key(prefix),
            expiry,
            created_by: "admin".into(),
            batch_id: batch_id.map(String::from),
        };
        match queries::create_license(store, &input) {
            Err(AppError::Conflict(_)) => {
                tracing::warn!(key = %input.key, "generated license key already exists, retrying");
            }
            other => return other,
        }
    }
    Err(AppError::Internal("could not generate a unique license key".into()))
}

/// POST /admin/licenses
pub async fn create_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Json(body): Json<CreateLicenseBody>,
) -> Result<Json<LicenseView>> {
    let store = state.store.as_ref();
    let now = now_ms();
    let expiry = resolve_expiry(store, body.expiry, now)?;

    let license = match body.key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            check_explicit_key(key)?;
            queries::create_license(
                store,
                &CreateLicense {
                    key: key.to_string(),
                    expiry,
                    created_by: "admin".into(),
                    batch_id: None,
                },
            )?
        }
        _ => {
            let prefix = resolve_prefix(&state, body.prefix.as_deref())?;
            create_generated(store, &prefix, expiry, None)?
        }
    };

    ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Admin, Some(&ctx.key_prefix))
        .action(ActivityAction::CreateLicense)
        .license(&license.key)
        .details(serde_json::json!({ "expiry": license.expiry }))
        .save()?;

    tracing::info!(license = %license.key, "license created");
    Ok(Json(LicenseView::new(license, now)))
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateBody {
    pub count: u32,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub expiry: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateResponse {
    pub batch_id: String,
    pub expiry: Option<i64>,
    pub keys: Vec<String>,
}

/// POST /admin/licenses/bulk
pub async fn bulk_create_licenses(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Json(body): Json<BulkCreateBody>,
) -> Result<Json<BulkCreateResponse>> {
    if body.count == 0 || body.count > MAX_BULK_COUNT {
        return Err(AppError::BadRequest(msg::INVALID_COUNT.into()));
    }
    let prefix = resolve_prefix(&state, body.prefix.as_deref())?;

    let store = state.store.as_ref();
    let expiry = resolve_expiry(store, body.expiry, now_ms())?;
    let batch_id = EntityType::Batch.gen_id();

    let mut keys = Vec::with_capacity(body.count as usize);
    let mut failure = None;
    for _ in 0..body.count {
        match create_generated(store, &prefix, expiry, Some(&batch_id)) {
            Ok(license) => keys.push(license.key),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    // Licenses already written stay, so the batch is audited either way
    let entry = ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Admin, Some(&ctx.key_prefix))
        .action(ActivityAction::BulkCreateLicenses)
        .details(serde_json::json!({
            "batchId": batch_id,
            "requested": body.count,
            "count": keys.len(),
            "complete": failure.is_none(),
            "prefix": prefix,
            "expiry": expiry,
            "keys": keys,
        }));
    if let Some(e) = failure {
        tracing::error!(
            batch_id = %batch_id,
            created = keys.len(),
            requested = body.count,
            "bulk license creation stopped early"
        );
        if !keys.is_empty() {
            entry.save_or_warn();
        }
        return Err(e);
    }
    entry.save()?;

    tracing::info!(batch_id = %batch_id, count = keys.len(), "bulk licenses created");
    Ok(Json(BulkCreateResponse {
        batch_id,
        expiry,
        keys,
    }))
}

/// DELETE /admin/licenses/{key}
/// Also drops any reset requests filed against the license.
pub async fn delete_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let store = state.store.as_ref();
    if !queries::delete_license(store, &key)? {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    }
    let requests_removed = queries::delete_hwid_requests_for_license(store, &key)?;

    ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Admin, Some(&ctx.key_prefix))
        .action(ActivityAction::DeleteLicense)
        .license(&key)
        .details(serde_json::json!({ "requestsRemoved": requests_removed }))
        .save()?;

    tracing::info!(license = %key, "license deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /admin/licenses/{key}/reset-hwid
/// Unbind the license so the next `register` can bind a new device.
pub async fn reset_license_hwid(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    meta: RequestMeta,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let store = state.store.as_ref();
    let previous = queries::reset_hwid(store, &key, HistoryAction::ResetHwid, "admin", now_ms())?
        .or_not_found(msg::LICENSE_NOT_FOUND)?;

    let mut entry = ActivityLogBuilder::new(store, &meta)
        .actor(ActorType::Admin, Some(&ctx.key_prefix))
        .action(ActivityAction::ResetHwid)
        .license(&key);
    if !previous.is_empty() {
        entry = entry.hwid(&previous);
    }
    entry.save()?;

    tracing::info!(license = %key, "license HWID reset");
    Ok(Json(serde_json::json!({
        "success": true,
        "previousHwid": (!previous.is_empty()).then_some(&previous),
    })))
}
