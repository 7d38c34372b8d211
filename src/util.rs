//! Shared utility functions.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use chrono::Utc;

use crate::db::{DocumentStore, queries};
use crate::error::Result;
use crate::models::{ActivityAction, ActivityEntry, ActorType};

pub const MS_PER_DAY: i64 = 86_400_000;

/// Current time as unix milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Client details taken from the request, recorded on activations and in the activity log.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    /// Tries `x-forwarded-for` first (for proxied requests), then `x-real-ip`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .or_else(|| headers.get("x-real-ip"))
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty());

        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// Falls back to the peer address when no proxy header names the client.
impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let mut meta = Self::from_headers(&parts.headers);
        if meta.ip.is_none() {
            meta.ip = parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string());
        }
        Ok(meta)
    }
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Builder for activity log entries.
///
/// # Example
/// ```ignore
/// ActivityLogBuilder::new(state.store.as_ref(), &meta)
///     .actor(ActorType::Admin, Some(&ctx.key_prefix))
///     .action(ActivityAction::BanHwid)
///     .hwid(&hwid)
///     .save()?;
/// ```
pub struct ActivityLogBuilder<'a> {
    store: &'a dyn DocumentStore,
    meta: &'a RequestMeta,
    actor_type: ActorType,
    actor_id: Option<&'a str>,
    action: ActivityAction,
    license_key: Option<&'a str>,
    hwid: Option<&'a str>,
    outcome: Option<&'a str>,
    details: Option<serde_json::Value>,
}

impl<'a> ActivityLogBuilder<'a> {
    pub fn new(store: &'a dyn DocumentStore, meta: &'a RequestMeta) -> Self {
        Self {
            store,
            meta,
            actor_type: ActorType::System,
            actor_id: None,
            action: ActivityAction::Validate, // Placeholder, should always be set
            license_key: None,
            hwid: None,
            outcome: None,
            details: None,
        }
    }

    pub fn actor(mut self, actor_type: ActorType, actor_id: Option<&'a str>) -> Self {
        self.actor_type = actor_type;
        self.actor_id = actor_id;
        self
    }

    pub fn action(mut self, action: ActivityAction) -> Self {
        self.action = action;
        self
    }

    pub fn license(mut self, license_key: &'a str) -> Self {
        self.license_key = Some(license_key);
        self
    }

    pub fn hwid(mut self, hwid: &'a str) -> Self {
        self.hwid = Some(hwid);
        self
    }

    pub fn outcome(mut self, outcome: &'a str) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn save(self) -> Result<ActivityEntry> {
        let entry = ActivityEntry {
            id: crate::id::EntityType::Activity.gen_id(),
            timestamp: now_ms(),
            actor_type: self.actor_type,
            actor_id: self.actor_id.map(String::from),
            action: self.action,
            license_key: self.license_key.map(String::from),
            hwid: self.hwid.map(String::from),
            outcome: self.outcome.map(String::from),
            details: self.details,
            ip: self.meta.ip.clone(),
            user_agent: self.meta.user_agent.clone(),
        };
        queries::log_activity(self.store, &entry)?;
        Ok(entry)
    }

    /// Save, logging instead of failing. Activity writes never change a response.
    pub fn save_or_warn(self) {
        let action = self.action;
        if let Err(e) = self.save() {
            tracing::warn!(action = action.as_ref(), "Failed to write activity log: {}", e);
        }
    }
}
