use rusqlite::Connection;

/// Initialize the document table.
///
/// `seq` preserves insertion order for the append-only collections;
/// `(collection, key)` is the document identity.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(collection, key)
        );
        CREATE INDEX IF NOT EXISTS idx_documents_collection_seq ON documents(collection, seq);
        CREATE INDEX IF NOT EXISTS idx_documents_collection_created ON documents(collection, created_at);
        "#,
    )
}
