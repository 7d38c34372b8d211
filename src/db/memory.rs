//! In-memory document store with the same per-document semantics as
//! `SqliteStore`. Backs unit and integration tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Document, DocumentStore, UpdateResult, merge_fields};
use crate::error::Result;
use crate::util::now_ms;

struct Entry {
    seq: u64,
    created_at: i64,
    doc: Document,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    collections: BTreeMap<String, BTreeMap<String, Entry>>,
}

impl Inner {
    fn insert(&mut self, collection: &str, key: &str, doc: Document) {
        self.next_seq += 1;
        let entry = Entry {
            seq: self.next_seq,
            created_at: now_ms(),
            doc,
        };
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), entry);
    }

    fn sorted(&self, collection: &str) -> Vec<(String, &Entry)> {
        let mut entries: Vec<_> = self
            .collections
            .get(collection)
            .map(|c| c.iter().map(|(k, e)| (k.clone(), e)).collect())
            .unwrap_or_default();
        entries.sort_by_key(|(_, e)| e.seq);
        entries
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a half-written document
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let inner = self.lock();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|c| c.get(key))
            .map(|e| e.doc.clone()))
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let inner = self.lock();
        Ok(inner
            .sorted(collection)
            .into_iter()
            .map(|(k, e)| (k, e.doc.clone()))
            .collect())
    }

    fn create(&self, collection: &str, key: &str, doc: Document) -> Result<bool> {
        let mut inner = self.lock();
        let exists = inner
            .collections
            .get(collection)
            .is_some_and(|c| c.contains_key(key));
        if exists {
            return Ok(false);
        }
        inner.insert(collection, key, doc);
        Ok(true)
    }

    fn merge(&self, collection: &str, key: &str, patch: Document) -> Result<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(entry) = inner
            .collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(key))
        {
            merge_fields(&mut entry.doc, patch);
            return Ok(());
        }
        inner.insert(collection, key, patch);
        Ok(())
    }

    fn update(
        &self,
        collection: &str,
        key: &str,
        apply: &mut dyn FnMut(&mut Document) -> bool,
    ) -> Result<UpdateResult> {
        let mut inner = self.lock();
        let Some(entry) = inner
            .collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(key))
        else {
            return Ok(UpdateResult::Missing);
        };

        // Work on a copy so a declined update leaves the stored document untouched
        let mut doc = entry.doc.clone();
        if !apply(&mut doc) {
            return Ok(UpdateResult::Skipped);
        }
        entry.doc = doc;
        Ok(UpdateResult::Applied)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut inner = self.lock();
        Ok(inner
            .collections
            .get_mut(collection)
            .and_then(|c| c.remove(key))
            .is_some())
    }

    fn recent(&self, collection: &str, limit: usize) -> Result<Vec<(String, Document)>> {
        let inner = self.lock();
        Ok(inner
            .sorted(collection)
            .into_iter()
            .rev()
            .take(limit)
            .map(|(k, e)| (k, e.doc.clone()))
            .collect())
    }

    fn count(&self, collection: &str) -> Result<i64> {
        let inner = self.lock();
        Ok(inner
            .collections
            .get(collection)
            .map(|c| c.len() as i64)
            .unwrap_or(0))
    }

    fn purge_before(&self, collection: &str, cutoff_ms: i64) -> Result<usize> {
        let mut inner = self.lock();
        let Some(entries) = inner.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|_, e| e.created_at >= cutoff_ms);
        Ok(before - entries.len())
    }
}
