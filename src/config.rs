/// Configuration module.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fetcher::RetryPolicy;

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./aurora.db".to_string()
}

fn default_source_url() -> String {
    "https://november7-730026606190.europe-west1.run.app/messages".to_string()
}

fn default_fetch_limit() -> usize {
    500
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_search_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// SQLite database file path.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Base URL of the upstream messages endpoint.
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Page size for upstream pagination.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Per-request timeout for upstream calls.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Address the search API listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Result count when the caller does not pass a limit.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Upper inclusive bound enforced on caller-supplied limits.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source_url: default_source_url(),
            fetch_limit: default_fetch_limit(),
            http_timeout_secs: default_http_timeout_secs(),
            bind_addr: default_bind_addr(),
            retry: RetryConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            max_limit: default_max_limit(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        // Check if config file exists
        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        // Read existing config
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        // Parse with defaults
        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.source_url.is_empty(), "source_url must be set");
        anyhow::ensure!(self.fetch_limit > 0, "fetch_limit must be positive");
        anyhow::ensure!(
            self.http_timeout_secs > 0,
            "http_timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.retry.max_attempts >= 1,
            "retry.max_attempts must be at least 1"
        );
        anyhow::ensure!(
            self.search.max_limit >= 1,
            "search.max_limit must be at least 1"
        );
        anyhow::ensure!(
            (1..=self.search.max_limit).contains(&self.search.default_limit),
            "search.default_limit must be between 1 and search.max_limit"
        );
        Ok(())
    }

    /// Retry policy for upstream page requests.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Per-request timeout for upstream calls.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
