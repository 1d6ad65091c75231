//! Message store module using SQLite and FTS5
use rusqlite::{Connection, Result};
use std::path::Path;
use tracing::info;

pub mod messages;
pub mod models;
pub mod search;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    user_name TEXT NOT NULL,
    timestamp DATETIME NOT NULL,
    message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);

CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    message,
    user_name,
    id UNINDEXED
);
"#;

/// A wrapper around a SQLite connection initialized with the application schema.
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema.
    ///
    /// Schema creation is idempotent, so calling this on every process start
    /// is safe.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());

        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!("Database initialized successfully");

        Ok(Self { conn })
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let db = Db::open_in_memory().expect("Failed to open in-memory DB");

        // Verify tables exist
        let tables: usize = db
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('messages', 'messages_fts');",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(tables, 2);
    }

    #[test]
    fn test_open_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("messages.db");

        drop(Db::open(&path).unwrap());
        // Re-opening against an existing schema must not fail
        drop(Db::open(&path).unwrap());
    }
}
