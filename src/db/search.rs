use super::{Db, messages::map_message_row, models::Message};
use rusqlite::{Result, params};

/// Strip everything the FTS5 query syntax could treat as an operator.
///
/// Hyphens, quotes, colons, parentheses and the rest all become spaces, so a
/// user-typed `"foo-bar"` is submitted as the two terms `foo bar` instead of
/// an FTS exclusion. Token boundaries are unchanged: the unicode61 tokenizer
/// already splits on non-alphanumeric characters.
pub fn sanitize_query(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Db {
    /// Full-text search over message bodies and author names.
    ///
    /// Matches are ordered strictly by timestamp descending (id descending on
    /// ties, keeping pagination stable), never by textual relevance. An empty
    /// result is a valid outcome, including for queries that sanitize down to
    /// nothing.
    pub fn search_messages(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let safe_query = sanitize_query(query);
        if safe_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT messages.id, messages.user_id, messages.user_name, messages.timestamp, messages.message
            FROM messages
            JOIN messages_fts ON messages.id = messages_fts.id
            WHERE messages_fts MATCH ?
            ORDER BY messages.timestamp DESC, messages.id DESC
            LIMIT ? OFFSET ?
            "#,
        )?;
        let rows = stmt.query_map(
            params![safe_query, limit as i64, offset as i64],
            map_message_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn insert(db: &Db, id: &str, user_name: &str, hour: u32, body: &str) {
        let msg = Message {
            id: id.to_string(),
            user_id: format!("u-{id}"),
            user_name: user_name.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            message: body.to_string(),
        };
        db.insert_message(&msg).unwrap();
        db.insert_fts_entry(&msg).unwrap();
    }

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query("foo-bar"), "foo bar");
        assert_eq!(sanitize_query("  foo   bar  "), "foo bar");
        assert_eq!(sanitize_query("\"rollout\" (plan:v2)*"), "rollout plan v2");
        assert_eq!(sanitize_query("---"), "");
        assert_eq!(sanitize_query(""), "");
    }

    #[test]
    fn test_hyphenated_query_matches_plain_body() {
        let db = Db::open_in_memory().unwrap();
        insert(&db, "m1", "Alice", 9, "foo bar baz");

        let results = db.search_messages("foo-bar", 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "m1");
    }

    #[test]
    fn test_matches_author_name() {
        let db = Db::open_in_memory().unwrap();
        insert(&db, "m1", "Charlie", 9, "nothing relevant");

        let results = db.search_messages("charlie", 10, 0).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_token_match_not_substring() {
        let db = Db::open_in_memory().unwrap();
        insert(&db, "m1", "Alice", 9, "deployment finished");

        // "deploy" is not a token of "deployment"
        assert!(db.search_messages("deploy", 10, 0).unwrap().is_empty());
        assert_eq!(db.search_messages("deployment", 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_recency_ordering() {
        let db = Db::open_in_memory().unwrap();
        insert(&db, "a", "Alice", 8, "release notes");
        insert(&db, "b", "Bob", 11, "release notes");

        let results = db.search_messages("release", 10, 0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
    }

    #[test]
    fn test_pagination() {
        let db = Db::open_in_memory().unwrap();
        insert(&db, "a", "Alice", 8, "standup update");
        insert(&db, "b", "Bob", 9, "standup update");
        insert(&db, "c", "Carol", 10, "standup update");

        // Descending order is [c, b, a]; page past the first hit
        let page = db.search_messages("standup", 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "b");

        let rest = db.search_messages("standup", 10, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "a");
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        let db = Db::open_in_memory().unwrap();
        insert(&db, "a", "Alice", 9, "same instant");
        insert(&db, "b", "Bob", 9, "same instant");

        let results = db.search_messages("instant", 10, 0).unwrap();
        assert_eq!(results.len(), 2);
        // Equal timestamps fall back to id descending
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let db = Db::open_in_memory().unwrap();
        insert(&db, "m1", "Alice", 9, "hello world");

        assert!(db.search_messages("absent", 10, 0).unwrap().is_empty());
        // Operator soup sanitizes to nothing and must not reach FTS
        assert!(db.search_messages("\"*(-)-\"", 10, 0).unwrap().is_empty());
    }
}
