//! SQLite-backed document store.
//!
//! Documents live as JSON text in a single `documents` table. Read-modify-write
//! operations run in IMMEDIATE transactions so the write lock is taken up front
//! and concurrent writers to the same document are serialized.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::{DbPool, Document, DocumentStore, UpdateResult, init_db, merge_fields};
use crate::error::Result;
use crate::util::now_ms;

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Wrap an existing pool, initializing the schema.
    pub fn new(pool: DbPool) -> Result<Self> {
        let conn = pool.get()?;
        init_db(&conn)?;
        Ok(Self { pool })
    }

    /// Open (or create) a database file.
    pub fn open(database_path: &str) -> Result<Self> {
        Self::new(super::create_pool(database_path)?)
    }

    /// Single-connection in-memory database. Each SQLite memory connection is
    /// its own database, so the pool must never hand out a second one.
    pub fn open_in_memory() -> Result<Self> {
        let manager = r2d2_sqlite::SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
        Self::new(pool)
    }
}

fn parse_document(data: &str) -> Result<Document> {
    Ok(serde_json::from_str(data)?)
}

fn read_data(conn: &Connection, collection: &str, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
            |row| row.get(0),
        )
        .optional()?)
}

fn collect_rows(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<(String, Document)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(key, data)| Ok((key, parse_document(&data)?)))
        .collect()
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let conn = self.pool.get()?;
        read_data(&conn, collection, key)?
            .map(|data| parse_document(&data))
            .transpose()
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let conn = self.pool.get()?;
        collect_rows(
            &conn,
            "SELECT key, data FROM documents WHERE collection = ?1 ORDER BY seq ASC",
            params![collection],
        )
    }

    fn create(&self, collection: &str, key: &str, doc: Document) -> Result<bool> {
        let conn = self.pool.get()?;
        let now = now_ms();
        let data = serde_json::to_string(&doc)?;
        let inserted = conn.execute(
            "INSERT INTO documents (collection, key, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, key) DO NOTHING",
            params![collection, key, data, now],
        )?;
        Ok(inserted > 0)
    }

    fn merge(&self, collection: &str, key: &str, patch: Document) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_ms();

        match read_data(&tx, collection, key)? {
            Some(data) => {
                let mut doc = parse_document(&data)?;
                merge_fields(&mut doc, patch);
                tx.execute(
                    "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND key = ?4",
                    params![serde_json::to_string(&doc)?, now, collection, key],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO documents (collection, key, data, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![collection, key, serde_json::to_string(&patch)?, now],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn update(
        &self,
        collection: &str,
        key: &str,
        apply: &mut dyn FnMut(&mut Document) -> bool,
    ) -> Result<UpdateResult> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(data) = read_data(&tx, collection, key)? else {
            return Ok(UpdateResult::Missing);
        };
        let mut doc = parse_document(&data)?;
        if !apply(&mut doc) {
            return Ok(UpdateResult::Skipped);
        }

        tx.execute(
            "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND key = ?4",
            params![serde_json::to_string(&doc)?, now_ms(), collection, key],
        )?;
        tx.commit()?;
        Ok(UpdateResult::Applied)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
        )?;
        Ok(affected > 0)
    }

    fn recent(&self, collection: &str, limit: usize) -> Result<Vec<(String, Document)>> {
        let conn = self.pool.get()?;
        let limit = limit as i64;
        collect_rows(
            &conn,
            "SELECT key, data FROM documents WHERE collection = ?1 ORDER BY seq DESC LIMIT ?2",
            params![collection, limit],
        )
    }

    fn count(&self, collection: &str) -> Result<i64> {
        let conn = self.pool.get()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?)
    }

    fn purge_before(&self, collection: &str, cutoff_ms: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        Ok(conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND created_at < ?2",
            params![collection, cutoff_ms],
        )?)
    }
}
