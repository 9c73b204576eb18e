//! SQLite-backed stores for readings and daily summaries.
//!
//! `ReadingStore` is append-only apart from age-based deletion.
//! `SummaryStore` holds one row per (city, date) and overwrites on upsert.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::{DailySummary, Error, Reading, Result};

// ---

/// Row shape of the `readings` table.
#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    city: String,
    observed_at: i64,
    temperature: f64,
    temperature_max: f64,
    temperature_min: f64,
    feels_like: f64,
    wind_speed: f64,
    humidity: f64,
    status: String,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = Error;

    fn try_from(row: ReadingRow) -> Result<Self> {
        let observed_at = DateTime::from_timestamp_micros(row.observed_at).ok_or_else(|| {
            Error::CorruptRow(format!("observed_at {} out of range", row.observed_at))
        })?;

        Ok(Reading {
            city: row.city,
            observed_at,
            temperature: row.temperature,
            temperature_max: row.temperature_max,
            temperature_min: row.temperature_min,
            feels_like: row.feels_like,
            wind_speed: row.wind_speed,
            humidity: row.humidity,
            status: row.status,
        })
    }
}

fn into_readings(rows: Vec<ReadingRow>) -> Result<Vec<Reading>> {
    rows.into_iter().map(Reading::try_from).collect()
}

const READING_COLUMNS: &str = "city, observed_at, temperature, temperature_max, temperature_min, \
                               feels_like, wind_speed, humidity, status";

/// Raw per-city observations.
#[derive(Debug, Clone)]
pub struct ReadingStore {
    pool: SqlitePool,
}

impl ReadingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one reading. Each insert is its own atomic statement.
    pub async fn insert(&self, reading: &Reading) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO readings (
                city, observed_at, temperature, temperature_max, temperature_min,
                feels_like, wind_speed, humidity, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reading.city)
        .bind(reading.observed_at.timestamp_micros())
        .bind(reading.temperature)
        .bind(reading.temperature_max)
        .bind(reading.temperature_min)
        .bind(reading.feels_like)
        .bind(reading.wind_speed)
        .bind(reading.humidity)
        .bind(&reading.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent reading across all cities.
    pub async fn latest(&self) -> Result<Option<Reading>> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings ORDER BY observed_at DESC, id DESC LIMIT 1"
        );
        let row: Option<ReadingRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;

        row.map(Reading::try_from).transpose()
    }

    /// The `limit` most recent readings for `city`, newest first.
    pub async fn recent_for_city(&self, city: &str, limit: u32) -> Result<Vec<Reading>> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE city = ? \
             ORDER BY observed_at DESC, id DESC LIMIT ?"
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(city)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        into_readings(rows)
    }

    /// Readings for `city` with `from <= observed_at < to`, oldest first.
    pub async fn for_city_between(
        &self,
        city: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings \
             WHERE city = ? AND observed_at >= ? AND observed_at < ? \
             ORDER BY observed_at ASC, id ASC"
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(city)
            .bind(from.timestamp_micros())
            .bind(to.timestamp_micros())
            .fetch_all(&self.pool)
            .await?;

        into_readings(rows)
    }

    /// Every stored reading in scan order (oldest first, then insertion order).
    pub async fn all(&self) -> Result<Vec<Reading>> {
        // ---
        let sql = format!("SELECT {READING_COLUMNS} FROM readings ORDER BY observed_at ASC, id ASC");
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        into_readings(rows)
    }

    /// Newest-first listing, optionally restricted to one city.
    pub async fn list(&self, city: Option<&str>, limit: u32) -> Result<Vec<Reading>> {
        // ---
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM readings WHERE (?1 IS NULL OR city = ?1) \
             ORDER BY observed_at DESC, id DESC LIMIT ?2"
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(city)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        into_readings(rows)
    }

    /// Delete every reading strictly older than `cutoff`. Returns rows deleted.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        // ---
        let result = sqlx::query("DELETE FROM readings WHERE observed_at < ?")
            .bind(cutoff.timestamp_micros())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Per-(city, date) aggregates.
#[derive(Debug, Clone)]
pub struct SummaryStore {
    pool: SqlitePool,
}

impl SummaryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or fully replace the row for the summary's (city, date).
    pub async fn upsert(&self, summary: &DailySummary) -> Result<()> {
        self.upsert_all(std::slice::from_ref(summary)).await
    }

    /// Upsert many rows in one transaction.
    pub async fn upsert_all(&self, summaries: &[DailySummary]) -> Result<()> {
        // ---
        let mut tx = self.pool.begin().await?;

        for summary in summaries {
            sqlx::query(
                r#"
                INSERT INTO daily_summaries (
                    city, summary_date, min_temp, max_temp, avg_temp,
                    dominant_weather, reading_count
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (city, summary_date) DO UPDATE SET
                    min_temp = excluded.min_temp,
                    max_temp = excluded.max_temp,
                    avg_temp = excluded.avg_temp,
                    dominant_weather = excluded.dominant_weather,
                    reading_count = excluded.reading_count
                "#,
            )
            .bind(&summary.city)
            .bind(summary.date)
            .bind(summary.min_temp)
            .bind(summary.max_temp)
            .bind(summary.avg_temp)
            .bind(&summary.dominant_weather)
            .bind(summary.reading_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, city: &str, date: NaiveDate) -> Result<Option<DailySummary>> {
        // ---
        let summary = sqlx::query_as(
            r#"
            SELECT city, summary_date, min_temp, max_temp, avg_temp, dominant_weather, reading_count
            FROM daily_summaries
            WHERE city = ? AND summary_date = ?
            "#,
        )
        .bind(city)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(summary)
    }

    /// All stored summaries ordered by city then date, optionally for one city.
    pub async fn list(&self, city: Option<&str>) -> Result<Vec<DailySummary>> {
        // ---
        let summaries = sqlx::query_as(
            r#"
            SELECT city, summary_date, min_temp, max_temp, avg_temp, dominant_weather, reading_count
            FROM daily_summaries
            WHERE (?1 IS NULL OR city = ?1)
            ORDER BY city ASC, summary_date ASC
            "#,
        )
        .bind(city)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }
}
