//! Data-freshness and aggregation pipeline for city weather readings.
//!
//! Polls a weather API for a fixed set of cities, keeps a rolling 24h
//! window of raw readings in SQLite, raises two-point heat warnings, rolls
//! readings up into per-city daily summaries and fans both out to
//! subscribers.
//!
//! Modules follow the same boundary rule as the binary: siblings depend on
//! what this gateway re-exports, not on each other's internals.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod freshness;
pub mod ingest;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod retention;
pub mod routes;
pub mod schema;
pub mod store;
pub mod warning;

pub use aggregate::{DailyAggregator, TieBreak};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{DeliveryFailure, Error, FetchError, IngestionFailure, NotifyError, Result};
pub use fetch::{OpenWeatherClient, WeatherFetch};
pub use freshness::{Freshness, FreshnessGate};
pub use ingest::{IngestOutcome, IngestReport, Ingestor};
pub use models::{DailySummary, Observation, Reading, TemperatureUnit};
pub use notify::{DispatchReport, Notifications, Notifier, ReportComposer, Subscriber, SubscriberDirectory};
pub use pipeline::{Pipeline, PipelineSettings};
pub use retention::RetentionSweeper;
pub use store::{ReadingStore, SummaryStore};
pub use warning::WarningDetector;

#[cfg(test)]
pub(crate) mod test_support {
    // ---
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use crate::{
        DailySummary, FetchError, Notifier, NotifyError, Observation, Reading, ReportComposer, Subscriber,
        SubscriberDirectory, WeatherFetch,
    };

    /// Single-connection in-memory database; more connections would each
    /// see their own empty database.
    pub async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    pub async fn setup_pool() -> SqlitePool {
        let pool = memory_pool().await;
        crate::schema::create_schema(&pool).await.unwrap();
        pool
    }

    pub fn reading_at(city: &str, observed_at: DateTime<Utc>, temperature: f64, status: &str) -> Reading {
        Reading {
            city: city.to_string(),
            observed_at,
            temperature,
            temperature_max: temperature + 1.0,
            temperature_min: temperature - 1.0,
            feels_like: temperature,
            wind_speed: 2.0,
            humidity: 50.0,
            status: status.to_string(),
        }
    }

    /// Fetcher with a fixed temperature per city; other cities are unknown.
    pub struct StubFetcher {
        temps: HashMap<String, f64>,
    }

    impl StubFetcher {
        pub fn with_temps(temps: &[(&str, f64)]) -> Self {
            Self {
                temps: temps.iter().map(|(c, t)| (c.to_string(), *t)).collect(),
            }
        }
    }

    #[async_trait]
    impl WeatherFetch for StubFetcher {
        async fn fetch(&self, city: &str) -> Result<Observation, FetchError> {
            let temperature = *self
                .temps
                .get(city)
                .ok_or_else(|| FetchError::UnknownCity(city.to_string()))?;

            Ok(Observation {
                temperature,
                temperature_max: temperature + 1.0,
                temperature_min: temperature - 1.0,
                feels_like: temperature,
                wind_speed: 2.0,
                humidity: 50.0,
                status: "clear".to_string(),
            })
        }
    }

    /// Fixed city -> subscribers map, or a directory that always fails.
    #[derive(Default)]
    pub struct StubDirectory {
        by_city: HashMap<String, Vec<Subscriber>>,
        broken: bool,
    }

    impl StubDirectory {
        pub fn with(entries: &[(&str, &str, &str)]) -> Self {
            let mut by_city: HashMap<String, Vec<Subscriber>> = HashMap::new();
            for (city, name, email) in entries {
                by_city.entry(city.to_string()).or_default().push(Subscriber {
                    name: name.to_string(),
                    email: email.to_string(),
                });
            }
            Self { by_city, broken: false }
        }

        pub fn failing() -> Self {
            Self {
                broken: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl SubscriberDirectory for StubDirectory {
        async fn subscribers_for(&self, city: &str) -> Result<Vec<Subscriber>, NotifyError> {
            if self.broken {
                return Err(NotifyError::Directory("directory offline".to_string()));
            }
            Ok(self.by_city.get(city).cloned().unwrap_or_default())
        }
    }

    /// Composer that remembers what it was asked to write.
    #[derive(Default)]
    pub struct RecordingComposer {
        warnings: Mutex<Vec<(String, String, f64)>>,
        summaries: Mutex<Vec<(String, DailySummary)>>,
    }

    impl RecordingComposer {
        pub fn warnings(&self) -> Vec<(String, String, f64)> {
            self.warnings.lock().unwrap().clone()
        }

        pub fn summaries(&self) -> Vec<(String, DailySummary)> {
            self.summaries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReportComposer for RecordingComposer {
        async fn compose_warning(&self, user: &str, city: &str, threshold_c: f64) -> Result<String, NotifyError> {
            self.warnings
                .lock()
                .unwrap()
                .push((user.to_string(), city.to_string(), threshold_c));
            Ok(format!("warning for {user} in {city}"))
        }

        async fn compose_summary(&self, user: &str, summary: &DailySummary) -> Result<String, NotifyError> {
            self.summaries.lock().unwrap().push((user.to_string(), summary.clone()));
            Ok(format!("report for {user} in {}", summary.city))
        }
    }

    /// Notifier that records (subject, body, recipient) and can refuse one address.
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
        reject: Option<String>,
    }

    impl RecordingNotifier {
        pub fn rejecting(recipient: &str) -> Self {
            Self {
                reject: Some(recipient.to_string()),
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), NotifyError> {
            if self.reject.as_deref() == Some(recipient) {
                return Err(NotifyError::Delivery(format!("mailbox {recipient} unavailable")));
            }
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string(), recipient.to_string()));
            Ok(())
        }
    }
}
