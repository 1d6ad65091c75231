use chrono::{DateTime, Utc};
use serde::Serialize;

/// One ingested message. Immutable once stored; `id` is the primary key.
///
/// The upstream assigns `timestamp`, which is not necessarily monotonic with
/// ingestion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}
