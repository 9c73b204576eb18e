//! Application entry point for the `weatherflow` service.
//!
//! Startup sequence:
//! - Load configuration from environment variables or `.env`
//! - Initialize structured logging/tracing
//! - Open the SQLite pool and create the schema if it does not exist
//! - Run one ingestion cycle so the store is warm before the first request
//! - Mount all API routes via the `routes` gateway and serve them
//!
//! # Environment Variables
//! - `OPENWEATHER_API_KEY` (**required**) – weather API credential
//! - `DATABASE_URL` (optional) – SQLite connection string (default: `sqlite://weather.db`)
//! - `LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See [`weatherflow::config`] for the full list.
use std::{env, io::IsTerminal, str::FromStr, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use dotenvy::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::time::Duration;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use weatherflow::{config, routes, schema, IngestOutcome, OpenWeatherClient, Pipeline, SystemClock};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Opening database: {}", cfg.db_url);

    let options = SqliteConnectOptions::from_str(&cfg.db_url)
        .with_context(|| format!("Invalid DATABASE_URL '{}'", cfg.db_url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database '{}'", cfg.db_url))?;

    schema::create_schema(&pool).await?;

    let fetcher = OpenWeatherClient::new(
        &cfg.api_url,
        &cfg.api_key,
        Duration::from_secs(cfg.fetch_timeout_secs),
    )
    .context("Failed to build weather API client")?;

    let pipeline = Pipeline::new(
        pool,
        Arc::new(fetcher),
        Arc::new(SystemClock),
        cfg.pipeline_settings(),
    );

    // A failed warm-up is not fatal; the next request retries.
    match pipeline.refresh().await {
        Ok(IngestOutcome::Completed(report)) => tracing::info!(
            "Initial ingestion: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        ),
        Ok(IngestOutcome::TooSoon { last_observed_at }) => {
            tracing::info!("Store is fresh (last reading at {})", last_observed_at)
        }
        Err(e) => tracing::warn!("Initial ingestion failed: {}", e),
    }

    let app: Router = routes::router(pipeline);

    tracing::info!("Listening on {}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output follows TTY detection unless `FORCE_COLOR` is
///   `1|true|yes` (on) or `0|false|no` (off)
/// - `SPAN_EVENTS=full` emits ENTER, EXIT and CLOSE; `enter_exit` emits
///   ENTER and EXIT; anything else emits CLOSE only
/// - `RUST_LOG` wins when set, otherwise `LOG_LEVEL` picks the level
///
/// Call once at startup, before any logging macros run.
fn init_tracing() {
    // ---
    let span_events = match env::var("SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
