//! Database schema management for `weatherflow`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs`, and by tests against an
//! in-memory database.

use sqlx::SqlitePool;

use crate::Result;

// ---

/// Create the database schema (idempotent).
///
/// Creates the append-only `readings` table, the `daily_summaries`
/// table keyed by (city, date) and the `subscribers` table read by the
/// notification fan-out. Safe to call on every startup.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Raw observations. `id` only gives a stable scan order; rows are
    // logically unkeyed. `observed_at` is UTC microseconds since the epoch.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            city            TEXT    NOT NULL,
            observed_at     INTEGER NOT NULL,
            temperature     REAL    NOT NULL,
            temperature_max REAL    NOT NULL,
            temperature_min REAL    NOT NULL,
            feels_like      REAL    NOT NULL,
            wind_speed      REAL    NOT NULL,
            humidity        REAL    NOT NULL,
            status          TEXT    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // One row per city per calendar day
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_summaries (
            city             TEXT    NOT NULL,
            summary_date     TEXT    NOT NULL,
            min_temp         REAL    NOT NULL,
            max_temp         REAL    NOT NULL,
            avg_temp         REAL    NOT NULL,
            dominant_weather TEXT    NOT NULL,
            reading_count    INTEGER NOT NULL,
            PRIMARY KEY (city, summary_date)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // One subscription per address; managed outside this service
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscribers (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            city  TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_subscribers_city
            ON subscribers (city);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Freshness gate and retention sweeper scan by time across all cities
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_observed_at
            ON readings (observed_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_city_observed_at
            ON readings (city, observed_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
