//! Freshness gate: is a new ingestion cycle due?
//!
//! Always derived from the Reading Store; no cached "last updated" state.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::store::ReadingStore;
use crate::Result;

// ---

/// Default minimum age, in seconds, of the newest reading before ingesting again.
pub const DEFAULT_FRESHNESS_SECS: i64 = 360;

/// State of the newest stored reading relative to the freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No readings are stored.
    Empty,
    /// The newest reading is at least one window old.
    Stale { last_observed_at: DateTime<Utc> },
    /// The newest reading is younger than the window.
    Fresh { last_observed_at: DateTime<Utc> },
}

impl Freshness {
    pub fn is_due(&self) -> bool {
        !matches!(self, Freshness::Fresh { .. })
    }

    pub fn last_observed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Freshness::Empty => None,
            Freshness::Stale { last_observed_at } | Freshness::Fresh { last_observed_at } => {
                Some(*last_observed_at)
            }
        }
    }
}

#[derive(Clone)]
pub struct FreshnessGate {
    store: ReadingStore,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl FreshnessGate {
    pub fn new(store: ReadingStore, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self { store, clock, window }
    }

    pub async fn check(&self) -> Result<Freshness> {
        // ---
        let Some(latest) = self.store.latest().await? else {
            return Ok(Freshness::Empty);
        };

        let last_observed_at = latest.observed_at;
        if self.clock.now() - last_observed_at >= self.window {
            Ok(Freshness::Stale { last_observed_at })
        } else {
            Ok(Freshness::Fresh { last_observed_at })
        }
    }

    /// True when no reading exists or the newest is at least one window old.
    pub async fn should_ingest(&self) -> Result<bool> {
        Ok(self.check().await?.is_due())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{reading_at, setup_pool};
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_store_is_due() {
        // ---
        let store = ReadingStore::new(setup_pool().await);
        let gate = FreshnessGate::new(store, Arc::new(ManualClock::new(base())), Duration::seconds(DEFAULT_FRESHNESS_SECS));

        assert_eq!(gate.check().await.unwrap(), Freshness::Empty);
        assert!(gate.should_ingest().await.unwrap());
    }

    #[tokio::test]
    async fn window_boundary_is_inclusive() {
        // ---
        let store = ReadingStore::new(setup_pool().await);
        let clock = Arc::new(ManualClock::new(base()));
        store.insert(&reading_at("Delhi", base(), 30.0, "haze")).await.unwrap();
        let gate = FreshnessGate::new(store, clock.clone(), Duration::seconds(DEFAULT_FRESHNESS_SECS));

        clock.advance(Duration::seconds(359));
        assert_eq!(
            gate.check().await.unwrap(),
            Freshness::Fresh { last_observed_at: base() }
        );

        clock.advance(Duration::seconds(1));
        assert!(gate.should_ingest().await.unwrap());
    }

    #[tokio::test]
    async fn newest_reading_of_any_city_decides() {
        // ---
        let store = ReadingStore::new(setup_pool().await);
        store.insert(&reading_at("Delhi", base() - Duration::hours(1), 30.0, "haze")).await.unwrap();
        store.insert(&reading_at("Mumbai", base() - Duration::minutes(1), 28.0, "rain")).await.unwrap();

        let gate = FreshnessGate::new(store, Arc::new(ManualClock::new(base())), Duration::seconds(DEFAULT_FRESHNESS_SECS));
        assert!(!gate.should_ingest().await.unwrap());
    }
}
