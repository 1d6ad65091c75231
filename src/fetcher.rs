/// Upstream message retrieval.
///
/// Pulls the complete upstream record set through sequential, offset-paginated
/// HTTP requests. Each page request is individually retried with bounded
/// exponential backoff; exhausting the budget for any single page fails the
/// whole fetch, so the caller never sees a partial result.
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

// ── Errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },

    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Transient failures are worth another attempt; everything else aborts
    /// the fetch immediately.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Http(_) | FetchError::Status(_))
    }
}

// ── Wire types ───────────────────────────────────────────────────────

/// One message as served by the upstream API.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceMessage {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    /// ISO-8601 string; parsed at ingestion, not on the wire.
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    items: Vec<SourceMessage>,
}

/// Parse an upstream timestamp. Accepts both offset-carrying RFC 3339 values
/// and naive ones, which are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, FetchError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| FetchError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

// ── Retry policy ─────────────────────────────────────────────────────

/// Bounded exponential backoff applied around a single page request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): doubles per retry,
    /// capped at `max_delay`.
    fn delay_for(&self, retry: u32) -> Duration {
        let scaled = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(retry.saturating_sub(1)));
        scaled.min(self.max_delay)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Only transient errors are retried; a non-transient error propagates at
    /// once. The final transient failure is wrapped as `RetriesExhausted`.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let attempts = self.max_attempts.max(1);
        let mut last_error: Option<FetchError> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.delay_for(attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying upstream request after failure"
                );
                thread::sleep(delay);
            }

            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "upstream request attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts,
            source: Box::new(last_error.expect("loop records an error per attempt")),
        })
    }
}

// ── Source trait & HTTP client ───────────────────────────────────────

/// A source of the complete upstream message set.
///
/// The HTTP client implements this; tests substitute in-memory sources.
pub trait MessageSource {
    fn fetch_all(&self) -> Result<Vec<SourceMessage>, FetchError>;
}

/// Client for the paginated upstream messages endpoint.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    base_url: String,
    page_size: usize,
    retry: RetryPolicy,
}

impl HttpSource {
    pub fn new(
        base_url: impl Into<String>,
        page_size: usize,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aurora/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            page_size,
            retry,
        })
    }

    /// Request a single page at the given offset.
    fn fetch_page(&self, skip: usize) -> Result<Vec<SourceMessage>, FetchError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("skip", skip), ("limit", self.page_size)])
            .send()?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let page: MessagesPage = resp.json()?;
        Ok(page.items)
    }
}

impl MessageSource for HttpSource {
    fn fetch_all(&self) -> Result<Vec<SourceMessage>, FetchError> {
        drain_pages(self.page_size, |skip| {
            self.retry.run(|| self.fetch_page(skip))
        })
    }
}

/// Walk the upstream pagination from offset 0 until an empty or short page.
///
/// The offset advances by the number of items actually returned, and a page
/// shorter than `page_size` is the final one; the upstream only returns a
/// partial page at the end. The result is the concatenation of pages in
/// arrival order.
pub fn drain_pages(
    page_size: usize,
    mut fetch_page: impl FnMut(usize) -> Result<Vec<SourceMessage>, FetchError>,
) -> Result<Vec<SourceMessage>, FetchError> {
    let mut all_items = Vec::new();
    let mut skip = 0;

    loop {
        let items = fetch_page(skip)?;
        if items.is_empty() {
            break;
        }

        skip += items.len();
        let last_page = items.len() < page_size;
        all_items.extend(items);

        if last_page {
            break;
        }
    }

    debug!(total = all_items.len(), "upstream pagination drained");
    Ok(all_items)
}

// ── Tests ────────────────────────────────────────────────────────────
