use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aurora::api::{self, AppState};
use aurora::config::Config;
use aurora::db::Db;
use aurora::fetcher::HttpSource;
use aurora::ingest::Ingestor;

/// Message search service: syncs the upstream feed into SQLite, then serves
/// recency-ordered full-text search over HTTP.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    config.validate()?;

    info!("Starting message search service");

    // Schema init plus one full upstream sync, to completion, before the
    // server accepts queries. reqwest::blocking and rusqlite must stay off
    // the async runtime threads.
    let startup_config = config.clone();
    let db = tokio::task::spawn_blocking(move || -> Result<Db> {
        let db = Db::open(&startup_config.db_path).context("failed to open database")?;

        let source = HttpSource::new(
            startup_config.source_url.clone(),
            startup_config.fetch_limit,
            startup_config.http_timeout(),
            startup_config.retry_policy(),
        )
        .context("failed to build upstream client")?;

        let inserted = Ingestor::new(&db, &source)
            .populate()
            .context("startup ingestion failed")?;
        info!(inserted, "startup ingestion finished");

        Ok(db)
    })
    .await
    .context("startup task panicked")??;

    let state = AppState {
        db: Arc::new(TokioMutex::new(db)),
        search: config.search.clone(),
    };

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, api::router(state))
        .await
        .context("server error")?;

    Ok(())
}
