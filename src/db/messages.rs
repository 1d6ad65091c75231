use super::{Db, models::Message};
use rusqlite::{OptionalExtension, Result, params};
use std::collections::HashSet;

pub(crate) fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        timestamp: row.get(3)?,
        message: row.get(4)?,
    })
}

impl Db {
    /// Insert a message row. Fails if the id is already present.
    pub fn insert_message(&self, msg: &Message) -> Result<()> {
        self.conn.execute(
            "INSERT INTO messages (id, user_id, user_name, timestamp, message) VALUES (?, ?, ?, ?, ?)",
            params![msg.id, msg.user_id, msg.user_name, msg.timestamp, msg.message],
        )?;
        Ok(())
    }

    /// Whether a message with the given id exists in the primary table.
    pub fn message_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM messages WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_message(&self, id: &str) -> Result<Option<Message>> {
        self.conn
            .query_row(
                "SELECT id, user_id, user_name, timestamp, message FROM messages WHERE id = ?",
                params![id],
                map_message_row,
            )
            .optional()
    }

    /// All ids in the primary table.
    pub fn all_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM messages")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// All ids currently covered by the full-text index.
    pub fn indexed_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM messages_fts")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// Add a message's searchable fields to the full-text index.
    pub fn insert_fts_entry(&self, msg: &Message) -> Result<()> {
        self.conn.execute(
            "INSERT INTO messages_fts (message, user_name, id) VALUES (?, ?, ?)",
            params![msg.message, msg.user_name, msg.id],
        )?;
        Ok(())
    }

    pub fn count_messages(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
