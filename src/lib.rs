//! # Aurora — Message Search Service
//!
//! Syncs a paginated upstream message feed into SQLite, keeps an FTS5
//! full-text index consistent with the primary table, and serves
//! recency-ordered keyword search over HTTP.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, and defaults
//! - **[`db`]** — SQLite store (schema, message rows, FTS5 search)
//! - **[`fetcher`]** — Paginated upstream HTTP client with bounded retry
//! - **[`ingest`]** — Two-phase merge: insert new messages, then reconcile the index
//! - **[`api`]** — axum search endpoint (parameter validation and error mapping)

pub mod api;
pub mod config;
pub mod db;
pub mod fetcher;
pub mod ingest;
