//! Two-consecutive-reading heat warning.

use crate::store::ReadingStore;
use crate::Result;

// ---

pub const DEFAULT_WARNING_THRESHOLD_C: f64 = 35.0;

#[derive(Debug, Clone)]
pub struct WarningDetector {
    store: ReadingStore,
    threshold_c: f64,
}

impl WarningDetector {
    pub fn new(store: ReadingStore, threshold_c: f64) -> Self {
        Self { store, threshold_c }
    }

    pub fn threshold_c(&self) -> f64 {
        self.threshold_c
    }

    /// True iff the two most recent readings for `city` are both strictly
    /// above the threshold. Fewer than two readings is never a warning.
    pub async fn is_warning(&self, city: &str) -> Result<bool> {
        // ---
        let recent = self.store.recent_for_city(city, 2).await?;
        if recent.len() < 2 {
            return Ok(false);
        }

        Ok(recent.iter().all(|r| r.temperature > self.threshold_c))
    }
}
