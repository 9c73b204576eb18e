//! Wires the pipeline components to one pool, one fetcher and one clock.

use std::sync::Arc;

use chrono::{Duration, FixedOffset, Offset, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::aggregate::{DailyAggregator, TieBreak};
use crate::clock::Clock;
use crate::fetch::WeatherFetch;
use crate::freshness::{FreshnessGate, DEFAULT_FRESHNESS_SECS};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::notify::{DispatchReport, Notifications};
use crate::retention::{RetentionSweeper, DEFAULT_RETENTION_HOURS};
use crate::store::{ReadingStore, SummaryStore};
use crate::warning::{WarningDetector, DEFAULT_WARNING_THRESHOLD_C};
use crate::{DailySummary, Result};

// ---

/// Cities polled when none are configured.
pub const DEFAULT_CITIES: [&str; 6] = ["Delhi", "Mumbai", "Chennai", "Bangalore", "Kolkata", "Hyderabad"];

/// Tunables for the pipeline. `Config` builds this from the environment.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub cities: Vec<String>,
    pub freshness_window: Duration,
    pub retention_horizon: Duration,
    pub warning_threshold_c: f64,
    /// Offset used to decide which calendar day a reading belongs to.
    pub day_offset: FixedOffset,
    pub tie_break: TieBreak,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            freshness_window: Duration::seconds(DEFAULT_FRESHNESS_SECS),
            retention_horizon: Duration::hours(DEFAULT_RETENTION_HOURS),
            warning_threshold_c: DEFAULT_WARNING_THRESHOLD_C,
            day_offset: Utc.fix(),
            tie_break: TieBreak::default(),
        }
    }
}

/// The assembled pipeline. Cheap to clone; shared as HTTP state.
#[derive(Clone)]
pub struct Pipeline {
    cities: Arc<Vec<String>>,
    readings: ReadingStore,
    summaries: SummaryStore,
    gate: FreshnessGate,
    ingestor: Ingestor,
    warnings: WarningDetector,
    aggregator: DailyAggregator,
    notifications: Notifications,
}

impl Pipeline {
    pub fn new(
        pool: SqlitePool,
        fetcher: Arc<dyn WeatherFetch>,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self {
        // ---
        let readings = ReadingStore::new(pool.clone());
        let summaries = SummaryStore::new(pool.clone());
        let notifications = Notifications::local(pool);

        let gate = FreshnessGate::new(readings.clone(), clock.clone(), settings.freshness_window);
        let sweeper = RetentionSweeper::new(readings.clone(), clock.clone(), settings.retention_horizon);
        let ingestor = Ingestor::new(readings.clone(), fetcher, gate.clone(), sweeper, clock.clone());
        let warnings = WarningDetector::new(readings.clone(), settings.warning_threshold_c);
        let aggregator = DailyAggregator::new(
            readings.clone(),
            summaries.clone(),
            clock,
            settings.day_offset,
            settings.tie_break,
        );

        Self {
            cities: Arc::new(settings.cities),
            readings,
            summaries,
            gate,
            ingestor,
            warnings,
            aggregator,
            notifications,
        }
    }

    /// Replace the default notification collaborators.
    pub fn with_notifications(mut self, notifications: Notifications) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    pub fn readings(&self) -> &ReadingStore {
        &self.readings
    }

    pub fn summaries(&self) -> &SummaryStore {
        &self.summaries
    }

    pub fn gate(&self) -> &FreshnessGate {
        &self.gate
    }

    pub fn warnings(&self) -> &WarningDetector {
        &self.warnings
    }

    pub fn aggregator(&self) -> &DailyAggregator {
        &self.aggregator
    }

    /// Run a gated ingestion cycle over the tracked cities.
    pub async fn refresh(&self) -> Result<IngestOutcome> {
        self.ingestor.ingest_all(&self.cities).await
    }

    /// Today's summary for `city`, persisted when it has at least one reading.
    pub async fn report_today(&self, city: &str) -> Result<DailySummary> {
        let summary = self.aggregator.summarize_today(city).await?;
        self.persist(summary).await
    }

    /// Like [`Pipeline::report_today`], but a day without readings is
    /// `Error::NoData` rather than the sentinel.
    pub async fn require_report_today(&self, city: &str) -> Result<DailySummary> {
        let summary = self.aggregator.require_today(city).await?;
        self.persist(summary).await
    }

    async fn persist(&self, summary: DailySummary) -> Result<DailySummary> {
        // ---
        if summary.is_empty() {
            debug!(city = %summary.city, "no readings today, summary not persisted");
        } else {
            self.summaries.upsert(&summary).await?;
        }
        Ok(summary)
    }

    /// Warn the subscribers of every tracked city currently under a heat warning.
    ///
    /// Per-recipient failures are collected in the report; a storage error
    /// while checking warnings aborts the dispatch.
    pub async fn dispatch_warnings(&self) -> Result<DispatchReport> {
        // ---
        let mut report = DispatchReport::default();
        for city in self.cities.iter() {
            if self.warnings.is_warning(city).await? {
                self.notifications
                    .warn_subscribers(city, self.warnings.threshold_c(), &mut report)
                    .await;
            }
        }

        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "warning dispatch complete"
        );
        Ok(report)
    }

    /// Send today's report for every tracked city with readings to its
    /// subscribers. Each sent summary is persisted first.
    pub async fn dispatch_reports(&self) -> Result<DispatchReport> {
        // ---
        let mut report = DispatchReport::default();
        for city in self.cities.iter() {
            let summary = self.report_today(city).await?;
            if summary.is_empty() {
                continue;
            }
            self.notifications.send_report(&summary, &mut report).await;
        }

        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "report dispatch complete"
        );
        Ok(report)
    }
}
