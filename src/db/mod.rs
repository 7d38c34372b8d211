mod memory;
pub mod queries;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use schema::init_db;
pub use sqlite::SqliteStore;

use std::sync::{Arc, Mutex};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::licensing::LicenseEngine;

pub type DbPool = Pool<SqliteConnectionManager>;

/// A stored document: a JSON object of named fields.
pub type Document = Map<String, Value>;

/// Logical collection names. Fixed for compatibility with existing data.
pub mod collections {
    pub const LICENSES: &str = "licenses";
    pub const SETTINGS: &str = "settings";
    pub const ACTIVITY_LOG: &str = "activityLog";
    pub const HWID_REQUESTS: &str = "hwidRequests";

    /// Keys of the singleton documents in `settings`.
    pub const BANLIST_DOC: &str = "banlist";
    pub const GENERAL_DOC: &str = "general";
}

/// Result of a conditional read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// No document with that key exists.
    Missing,
    /// The closure declined to write.
    Skipped,
    Applied,
}

/// Narrow persistence interface over `(collection, key) -> Document`.
///
/// Every operation is atomic for a single document. There are no
/// multi-document transactions.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// All documents in a collection, oldest first.
    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    /// Insert a new document. Returns `false` (and writes nothing) if the key exists.
    fn create(&self, collection: &str, key: &str, doc: Document) -> Result<bool>;

    /// Set-with-merge: overwrite the given fields, keep the rest, create if absent.
    fn merge(&self, collection: &str, key: &str, patch: Document) -> Result<()>;

    /// Read-modify-write one existing document. `apply` returns `false` to
    /// abort without writing, which makes this usable as a compare-and-swap.
    fn update(
        &self,
        collection: &str,
        key: &str,
        apply: &mut dyn FnMut(&mut Document) -> bool,
    ) -> Result<UpdateResult>;

    fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    /// Newest documents first, by insertion order.
    fn recent(&self, collection: &str, limit: usize) -> Result<Vec<(String, Document)>>;

    fn count(&self, collection: &str) -> Result<i64>;

    /// Delete documents inserted before `cutoff_ms`. Returns how many were removed.
    fn purge_before(&self, collection: &str, cutoff_ms: i64) -> Result<usize>;
}

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
    /// Serializes the scan-then-bind section of registration within this process.
    pub registrations: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            registrations: Arc::new(Mutex::new(())),
        }
    }

    pub fn engine(&self) -> LicenseEngine<'_> {
        LicenseEngine::new(self.store.as_ref(), &self.registrations)
    }
}

pub fn create_pool(database_path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
    });
    Pool::builder().max_size(10).build(manager)
}

pub(crate) fn decode<T: DeserializeOwned>(doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc)).map_err(AppError::from)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "expected a JSON object document, got {}",
            other
        ))),
    }
}

/// Shallow field merge used by both store implementations.
pub(crate) fn merge_fields(target: &mut Document, patch: Document) {
    for (field, value) in patch {
        target.insert(field, value);
    }
}
