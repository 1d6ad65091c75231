/// Idempotent merge of upstream messages into the store.
///
/// Two write phases: insert previously-unseen messages into the primary
/// table, then reconcile the full-text index against it. The phases are not
/// one transaction; a crash between them leaves un-indexed rows, and the
/// reconciliation pass on the next run heals exactly that gap.
use anyhow::{Context, Result};
use tracing::info;

use crate::db::Db;
use crate::db::models::Message;
use crate::fetcher::{self, MessageSource, SourceMessage};

pub struct Ingestor<'a, S: MessageSource + ?Sized> {
    db: &'a Db,
    source: &'a S,
}

impl<'a, S: MessageSource + ?Sized> Ingestor<'a, S> {
    pub fn new(db: &'a Db, source: &'a S) -> Self {
        Self { db, source }
    }

    /// Pull the full upstream set and merge it. Returns the number of newly
    /// inserted messages.
    ///
    /// Safe to re-run: ids already present are skipped, so a store that holds
    /// some or all of the upstream set gains only the missing rows.
    pub fn populate(&self) -> Result<usize> {
        let fetched = self
            .source
            .fetch_all()
            .context("failed to retrieve upstream messages")?;
        info!(fetched = fetched.len(), "retrieved upstream messages");

        let mut inserted = 0;
        for raw in fetched {
            if self
                .db
                .message_exists(&raw.id)
                .context("message existence check failed")?
            {
                continue;
            }

            let msg = convert(raw)?;
            self.db
                .insert_message(&msg)
                .with_context(|| format!("failed to insert message {}", msg.id))?;
            inserted += 1;
        }

        let reindexed = self
            .sync_index()
            .context("failed to reconcile full-text index")?;
        info!(inserted, reindexed, "ingestion complete");

        Ok(inserted)
    }

    /// Insert index entries for every message the index does not cover yet.
    ///
    /// Runs on every invocation, even when nothing was fetched, so a
    /// partially indexed store converges back to index/table equality.
    fn sync_index(&self) -> Result<usize> {
        let all = self.db.all_ids()?;
        let indexed = self.db.indexed_ids()?;

        let mut added = 0;
        for id in all.difference(&indexed) {
            let msg = self
                .db
                .get_message(id)?
                .with_context(|| format!("message {id} vanished during index sync"))?;
            self.db.insert_fts_entry(&msg)?;
            added += 1;
        }

        Ok(added)
    }
}

/// Build a stored message from its wire form. Timestamps are decoded here,
/// once, at the store boundary.
fn convert(raw: SourceMessage) -> Result<Message> {
    let timestamp = fetcher::parse_timestamp(&raw.timestamp)
        .with_context(|| format!("message {} carries a malformed timestamp", raw.id))?;

    Ok(Message {
        id: raw.id,
        user_id: raw.user_id,
        user_name: raw.user_name,
        timestamp,
        message: raw.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;

    struct StaticSource {
        items: Vec<SourceMessage>,
    }

    impl MessageSource for StaticSource {
        fn fetch_all(&self) -> Result<Vec<SourceMessage>, FetchError> {
            Ok(self.items.clone())
        }
    }

    fn src_msg(id: &str, hour: u32) -> SourceMessage {
        SourceMessage {
            id: id.to_string(),
            user_id: format!("u-{id}"),
            user_name: "Alice".to_string(),
            timestamp: format!("2024-05-01T{hour:02}:00:00Z"),
            message: format!("message {id}"),
        }
    }

    #[test]
    fn test_populate_inserts_and_indexes() {
        let db = Db::open_in_memory().unwrap();
        let source = StaticSource {
            items: vec![src_msg("a", 8), src_msg("b", 9)],
        };

        let inserted = Ingestor::new(&db, &source).populate().unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(db.count_messages().unwrap(), 2);
        assert_eq!(db.all_ids().unwrap(), db.indexed_ids().unwrap());
    }

    #[test]
    fn test_populate_is_idempotent() {
        let db = Db::open_in_memory().unwrap();
        let source = StaticSource {
            items: vec![src_msg("a", 8), src_msg("b", 9)],
        };

        let first = Ingestor::new(&db, &source).populate().unwrap();
        let second = Ingestor::new(&db, &source).populate().unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(db.count_messages().unwrap(), 2);
        assert_eq!(db.all_ids().unwrap(), db.indexed_ids().unwrap());
    }

    #[test]
    fn test_empty_source_inserts_nothing() {
        let db = Db::open_in_memory().unwrap();
        let source = StaticSource { items: Vec::new() };

        let inserted = Ingestor::new(&db, &source).populate().unwrap();

        assert_eq!(inserted, 0);
        assert_eq!(db.count_messages().unwrap(), 0);
    }

    #[test]
    fn test_malformed_timestamp_aborts() {
        let db = Db::open_in_memory().unwrap();
        let mut bad = src_msg("a", 8);
        bad.timestamp = "not-a-time".to_string();
        let source = StaticSource { items: vec![bad] };

        assert!(Ingestor::new(&db, &source).populate().is_err());
    }
}
