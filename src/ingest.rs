//! Ingestion orchestrator.
//!
//! One cycle: check the freshness gate, fetch and store one reading per
//! city in order, then run the retention sweep once.
//!
//! A fetch failure for one city is recorded in the report and the cycle
//! moves on to the next city. A storage failure aborts the cycle. The gate
//! check and the cycle run under a process-wide lock so two callers in the
//! same process cannot both ingest inside one freshness window; separate
//! processes sharing a database may still produce a duplicate cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::fetch::WeatherFetch;
use crate::freshness::{Freshness, FreshnessGate};
use crate::retention::RetentionSweeper;
use crate::store::ReadingStore;
use crate::{IngestionFailure, Reading, Result};

// ---

/// What one completed cycle did.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Readings written, in city order.
    pub succeeded: Vec<Reading>,
    /// Cities whose fetch failed.
    pub failed: Vec<IngestionFailure>,
    /// Readings removed by the retention sweep, or `None` if the sweep failed.
    pub pruned: Option<u64>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// All-or-nothing view: the first failed city becomes the error.
    pub fn into_strict(self) -> Result<Vec<Reading>> {
        match self.failed.into_iter().next() {
            Some(failure) => Err(failure.into()),
            None => Ok(self.succeeded),
        }
    }
}

/// Result of asking for an ingestion cycle.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The newest reading is still inside the freshness window; nothing ran.
    TooSoon { last_observed_at: DateTime<Utc> },
    /// A cycle ran. The report may still contain per-city failures.
    Completed(IngestReport),
}

#[derive(Clone)]
pub struct Ingestor {
    store: ReadingStore,
    fetcher: Arc<dyn WeatherFetch>,
    gate: FreshnessGate,
    sweeper: RetentionSweeper,
    clock: Arc<dyn Clock>,
    in_flight: Arc<Mutex<()>>,
}

impl Ingestor {
    pub fn new(
        store: ReadingStore,
        fetcher: Arc<dyn WeatherFetch>,
        gate: FreshnessGate,
        sweeper: RetentionSweeper,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            fetcher,
            gate,
            sweeper,
            clock,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Run one gated ingestion cycle over `cities`, in order.
    #[tracing::instrument(skip(self, cities), fields(cities = cities.len()))]
    pub async fn ingest_all(&self, cities: &[String]) -> Result<IngestOutcome> {
        // ---
        let _guard = self.in_flight.lock().await;

        if let Freshness::Fresh { last_observed_at } = self.gate.check().await? {
            debug!(%last_observed_at, "skipping ingestion, last update is too recent");
            return Ok(IngestOutcome::TooSoon { last_observed_at });
        }

        info!("starting ingestion cycle");
        let mut report = IngestReport::default();

        for city in cities {
            match self.fetcher.fetch(city).await {
                Ok(observation) => {
                    let reading = observation.into_reading(city, self.clock.now());
                    self.store.insert(&reading).await?;
                    debug!(city = %city, temperature = reading.temperature, "stored reading");
                    report.succeeded.push(reading);
                }
                Err(cause) => {
                    warn!(city = %city, error = %cause, "failed to fetch weather");
                    report.failed.push(IngestionFailure {
                        city: city.clone(),
                        cause,
                    });
                }
            }
        }

        report.pruned = match self.sweeper.sweep().await {
            Ok(deleted) => Some(deleted),
            Err(e) => {
                warn!(error = %e, "retention sweep failed");
                None
            }
        };

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            pruned = ?report.pruned,
            "ingestion cycle complete"
        );
        Ok(IngestOutcome::Completed(report))
    }
}
