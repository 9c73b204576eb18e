//! Configuration loader for the `weatherflow` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Everything else receives an immutable [`Config`]
//! or the [`PipelineSettings`] derived from it.
use std::env;
use std::net::SocketAddr;

use anyhow::{anyhow, Result};
use chrono::{Duration, FixedOffset};

use crate::pipeline::{PipelineSettings, DEFAULT_CITIES};
use crate::TieBreak;

/// Parse an optional environment variable into `$ty`, with a default value.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name).ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Upper bound for `FRESHNESS_SECS`: one day.
const MAX_FRESHNESS_SECS: u32 = 86_400;

/// Upper bound for `RETENTION_HOURS`: one year.
const MAX_RETENTION_HOURS: u32 = 8_760;

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// SQLite connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Weather API base URL.
    pub api_url: String,

    /// Weather API key.
    pub api_key: String,

    /// Upper bound on one weather API request.
    pub fetch_timeout_secs: u64,

    /// Cities polled on every ingestion cycle, in order.
    pub cities: Vec<String>,

    /// Minimum age of the newest reading before ingesting again.
    pub freshness_secs: u32,

    /// Raw readings older than this are deleted after each cycle.
    pub retention_hours: u32,

    /// Two consecutive readings above this raise a warning.
    pub warning_threshold_c: f64,

    /// Offset from UTC, in minutes, that defines calendar days for summaries.
    pub day_offset_minutes: i32,

    /// Tie-break rule for the dominant weather status.
    pub tie_break: TieBreak,

    /// HTTP listen address.
    pub listen_addr: SocketAddr,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `OPENWEATHER_API_KEY` – weather API key
///
/// Optional:
/// - `DATABASE_URL` – SQLite connection string (default: `sqlite://weather.db`)
/// - `WEATHER_API_URL` – API base URL (default: `https://api.openweathermap.org`)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `FETCH_TIMEOUT_SECS` – per-request timeout (default: 10)
/// - `TRACKED_CITIES` – comma-separated city list
/// - `FRESHNESS_SECS` – ingestion interval (default: 360)
/// - `RETENTION_HOURS` – raw reading retention (default: 24)
/// - `WARNING_THRESHOLD_C` – heat warning threshold (default: 35.0)
/// - `DAY_UTC_OFFSET_MINUTES` – day boundary offset (default: 0)
/// - `SUMMARY_TIE_BREAK` – `first_seen` or `lexicographic` (default: `first_seen`)
/// - `LISTEN_ADDR` – HTTP listen address (default: `0.0.0.0:8080`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_with(|key| env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_with<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let api_key = require_env!(lookup, "OPENWEATHER_API_KEY");
    let db_url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://weather.db".to_string());
    let api_url =
        lookup("WEATHER_API_URL").unwrap_or_else(|| "https://api.openweathermap.org".to_string());
    let db_pool_max = parse_env!(lookup, "DB_POOL_MAX", u32, 5);
    let fetch_timeout_secs = parse_env!(lookup, "FETCH_TIMEOUT_SECS", u64, 10);
    let freshness_secs = parse_env!(lookup, "FRESHNESS_SECS", u32, 360);
    let retention_hours = parse_env!(lookup, "RETENTION_HOURS", u32, 24);
    let warning_threshold_c = parse_env!(lookup, "WARNING_THRESHOLD_C", f64, 35.0);
    let day_offset_minutes = parse_env!(lookup, "DAY_UTC_OFFSET_MINUTES", i32, 0);
    let tie_break = parse_env!(lookup, "SUMMARY_TIE_BREAK", TieBreak, TieBreak::FirstSeen);
    let listen_addr = parse_env!(
        lookup,
        "LISTEN_ADDR",
        SocketAddr,
        SocketAddr::from(([0, 0, 0, 0], 8080))
    );

    let cities: Vec<String> = match lookup("TRACKED_CITIES") {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect(),
        None => DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
    };
    if cities.is_empty() {
        return Err(anyhow!("TRACKED_CITIES must name at least one city"));
    }

    if !(1..=MAX_FRESHNESS_SECS).contains(&freshness_secs) {
        return Err(anyhow!(
            "Invalid FRESHNESS_SECS: {} is outside 1..={}",
            freshness_secs,
            MAX_FRESHNESS_SECS
        ));
    }

    if !(1..=MAX_RETENTION_HOURS).contains(&retention_hours) {
        return Err(anyhow!(
            "Invalid RETENTION_HOURS: {} is outside 1..={}",
            retention_hours,
            MAX_RETENTION_HOURS
        ));
    }

    if !warning_threshold_c.is_finite() {
        return Err(anyhow!("Invalid WARNING_THRESHOLD_C: must be a finite number"));
    }

    if FixedOffset::east_opt(day_offset_minutes.saturating_mul(60)).is_none() {
        return Err(anyhow!(
            "Invalid DAY_UTC_OFFSET_MINUTES: {} is outside ±24h",
            day_offset_minutes
        ));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        api_url,
        api_key,
        fetch_timeout_secs,
        cities,
        freshness_secs,
        retention_hours,
        warning_threshold_c,
        day_offset_minutes,
        tie_break,
        listen_addr,
    })
}

impl Config {
    /// Pipeline tunables derived from this configuration.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        // ---
        let defaults = PipelineSettings::default();
        PipelineSettings {
            cities: self.cities.clone(),
            freshness_window: Duration::seconds(i64::from(self.freshness_secs)),
            retention_horizon: Duration::hours(i64::from(self.retention_hours)),
            warning_threshold_c: self.warning_threshold_c,
            // Range-checked in `load_with`.
            day_offset: FixedOffset::east_opt(self.day_offset_minutes * 60).unwrap_or(defaults.day_offset),
            tie_break: self.tie_break,
        }
    }

    /// API key for logging: the last four characters of a long key, nothing
    /// of a short one.
    fn masked_api_key(&self) -> String {
        // ---
        if self.api_key.chars().count() < 8 {
            return "****".to_string();
        }
        match self.api_key.char_indices().rev().nth(3) {
            Some((idx, _)) => format!("****{}", &self.api_key[idx..]),
            None => "****".to_string(),
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the API key while showing all other values that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_key = self.masked_api_key();

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL           : {}", self.db_url);
        tracing::info!("  WEATHER_API_URL        : {}", self.api_url);
        tracing::info!("  OPENWEATHER_API_KEY    : {}", masked_key);
        tracing::info!("  DB_POOL_MAX            : {}", self.db_pool_max);
        tracing::info!("  FETCH_TIMEOUT_SECS     : {}", self.fetch_timeout_secs);
        tracing::info!("  TRACKED_CITIES         : {}", self.cities.join(","));
        tracing::info!("  FRESHNESS_SECS         : {}", self.freshness_secs);
        tracing::info!("  RETENTION_HOURS        : {}", self.retention_hours);
        tracing::info!("  WARNING_THRESHOLD_C    : {}", self.warning_threshold_c);
        tracing::info!("  DAY_UTC_OFFSET_MINUTES : {}", self.day_offset_minutes);
        tracing::info!("  SUMMARY_TIE_BREAK      : {:?}", self.tie_break);
        tracing::info!("  LISTEN_ADDR            : {}", self.listen_addr);
    }
}
