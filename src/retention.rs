//! Rolling-window retention for raw readings.

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::store::ReadingStore;
use crate::{Error, Result};

// ---

pub const DEFAULT_RETENTION_HOURS: i64 = 24;

#[derive(Clone)]
pub struct RetentionSweeper {
    store: ReadingStore,
    clock: Arc<dyn Clock>,
    horizon: Duration,
}

impl RetentionSweeper {
    pub fn new(store: ReadingStore, clock: Arc<dyn Clock>, horizon: Duration) -> Self {
        Self { store, clock, horizon }
    }

    /// Delete readings observed strictly before `now - horizon`.
    ///
    /// The cutoff is fixed once at the start of the sweep, and the delete is a
    /// single statement. Returns the number of readings removed.
    pub async fn sweep(&self) -> Result<u64> {
        // ---
        let now = self.clock.now();
        let cutoff = now.checked_sub_signed(self.horizon).ok_or_else(|| {
            Error::TimeOutOfRange(format!("{now} minus retention horizon {}", self.horizon))
        })?;
        let deleted = self.store.delete_older_than(cutoff).await?;

        debug!(%cutoff, deleted, "retention sweep complete");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{reading_at, setup_pool};
    use chrono::{DateTime, TimeZone, Utc};

    #[tokio::test]
    async fn sweep_removes_only_readings_past_the_horizon() {
        // ---
        let now = Utc.with_ymd_and_hms(2025, 3, 27, 12, 0, 0).unwrap();
        let store = ReadingStore::new(setup_pool().await);
        let ages = [
            Duration::hours(48),
            Duration::hours(24) + Duration::seconds(1),
            Duration::hours(24),
            Duration::hours(23),
            Duration::minutes(6),
        ];
        for age in ages {
            store.insert(&reading_at("Delhi", now - age, 30.0, "haze")).await.unwrap();
        }

        let sweeper = RetentionSweeper::new(store.clone(), Arc::new(ManualClock::new(now)), Duration::hours(DEFAULT_RETENTION_HOURS));
        assert_eq!(sweeper.sweep().await.unwrap(), 2);

        let cutoff = now - Duration::hours(DEFAULT_RETENTION_HOURS);
        let remaining: Vec<DateTime<Utc>> = store.all().await.unwrap().iter().map(|r| r.observed_at).collect();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().all(|at| *at >= cutoff));

        // Nothing left to remove at the same instant.
        assert_eq!(sweeper.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cutoff_before_the_calendar_start_is_an_error() {
        // ---
        let store = ReadingStore::new(setup_pool().await);
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::MIN_UTC + Duration::hours(1)));
        let sweeper = RetentionSweeper::new(store, clock, Duration::hours(DEFAULT_RETENTION_HOURS));

        let err = sweeper.sweep().await.unwrap_err();
        assert!(matches!(err, Error::TimeOutOfRange(_)));
    }
}
