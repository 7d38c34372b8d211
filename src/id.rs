//! Prefixed ID generation for stored entities that don't carry a natural key.
//!
//! License records are keyed by their license key; everything else
//! (reset requests, activity entries, bulk batches) gets a generated ID.
//!
//! Format: `{prefix}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["hrq_", "act_", "bat_"];

/// Validate that a string is a well-formed prefixed ID.
///
/// Cheap rejection of garbage path parameters before hitting the store.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    HwidRequest,
    Activity,
    Batch,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::HwidRequest => "hrq",
            Self::Activity => "act",
            Self::Batch => "bat",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
