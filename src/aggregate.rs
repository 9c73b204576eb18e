//! Daily aggregation of readings into per-city, per-day summaries.
//!
//! The pure functions (`dominant_status`, `summarize`, `rollup`) hold the
//! algorithm. [`DailyAggregator`] binds them to the stores and the clock.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::store::{ReadingStore, SummaryStore};
use crate::{DailySummary, Error, Reading, Result};

// ---

/// How to choose between statuses with the same occurrence count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// The tied status whose first reading comes earliest in scan order.
    #[default]
    FirstSeen,
    /// The smallest tied status by byte order.
    Lexicographic,
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "first_seen" => Ok(Self::FirstSeen),
            "lexicographic" => Ok(Self::Lexicographic),
            other => Err(format!("unknown tie-break '{other}', expected first_seen or lexicographic")),
        }
    }
}

/// Most frequent status, or `None` for an empty input.
///
/// `statuses` must be in scan order for [`TieBreak::FirstSeen`] to be
/// meaningful.
pub fn dominant_status<'a, I>(statuses: I, tie_break: TieBreak) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    // ---
    // status -> (count, index of first occurrence)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, status) in statuses.into_iter().enumerate() {
        counts.entry(status).or_insert((0, index)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(a, (a_count, a_first)), (b, (b_count, b_first))| {
            a_count.cmp(b_count).then_with(|| match tie_break {
                // Reversed: the smaller key must compare as "greater" to win.
                TieBreak::FirstSeen => b_first.cmp(a_first),
                TieBreak::Lexicographic => b.cmp(a),
            })
        })
        .map(|(status, _)| status.to_string())
}

/// Summarize the readings of one city/day.
///
/// Readings are taken as-is; the caller is responsible for passing only
/// readings that belong to `city` on `date`. An empty slice yields the
/// [`DailySummary::empty`] sentinel.
pub fn summarize(city: &str, date: NaiveDate, readings: &[&Reading], tie_break: TieBreak) -> DailySummary {
    // ---
    let Some(dominant_weather) = dominant_status(readings.iter().map(|r| r.status.as_str()), tie_break)
    else {
        return DailySummary::empty(city, date);
    };

    let (min_temp, max_temp, sum) = readings.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), r| (min.min(r.temperature), max.max(r.temperature), sum + r.temperature),
    );

    // Summation rounding can leave the mean a few ulps outside the range.
    let avg_temp = (sum / readings.len() as f64).max(min_temp).min(max_temp);

    DailySummary {
        city: city.to_string(),
        date,
        min_temp,
        max_temp,
        avg_temp,
        dominant_weather,
        reading_count: readings.len() as i64,
    }
}

/// Calendar date of `reading` as seen from `offset`.
pub fn local_date(reading: &Reading, offset: FixedOffset) -> NaiveDate {
    reading.observed_at.with_timezone(&offset).date_naive()
}

/// Group readings by (city, date) and summarize each group.
///
/// Output is ordered by city then date. Input order is preserved within
/// each group, so it must be scan order for [`TieBreak::FirstSeen`].
pub fn rollup(readings: &[Reading], offset: FixedOffset, tie_break: TieBreak) -> Vec<DailySummary> {
    // ---
    let mut groups: BTreeMap<(&str, NaiveDate), Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        groups
            .entry((reading.city.as_str(), local_date(reading, offset)))
            .or_default()
            .push(reading);
    }

    groups
        .into_iter()
        .map(|((city, date), group)| summarize(city, date, &group, tie_break))
        .collect()
}

/// Computes daily summaries on demand and as a batch rollup.
#[derive(Clone)]
pub struct DailyAggregator {
    readings: ReadingStore,
    summaries: SummaryStore,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    tie_break: TieBreak,
}

impl DailyAggregator {
    pub fn new(
        readings: ReadingStore,
        summaries: SummaryStore,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        tie_break: TieBreak,
    ) -> Self {
        Self {
            readings,
            summaries,
            clock,
            offset,
            tie_break,
        }
    }

    /// Today's date according to the clock and the configured day offset.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    /// Summary of `city` on `date`, without persisting it.
    pub async fn summarize_day(&self, city: &str, date: NaiveDate) -> Result<DailySummary> {
        // ---
        let start = (date.and_time(NaiveTime::MIN) - self.offset).and_utc();
        let end = start + Duration::days(1);

        let readings = self.readings.for_city_between(city, start, end).await?;
        let refs: Vec<&Reading> = readings.iter().collect();

        debug!(city, %date, readings = refs.len(), "summarizing day");
        Ok(summarize(city, date, &refs, self.tie_break))
    }

    /// Today's summary for `city`. Returns the sentinel when there is no data.
    pub async fn summarize_today(&self, city: &str) -> Result<DailySummary> {
        self.summarize_day(city, self.today()).await
    }

    /// Today's summary for `city`, failing with [`Error::NoData`] when empty.
    pub async fn require_today(&self, city: &str) -> Result<DailySummary> {
        // ---
        let summary = self.summarize_today(city).await?;
        if summary.is_empty() {
            return Err(Error::NoData {
                city: city.to_string(),
                date: summary.date,
            });
        }
        Ok(summary)
    }

    /// Recompute every (city, date) summary from stored readings and upsert
    /// them. Returns the number of rows written.
    pub async fn rollup_all(&self) -> Result<usize> {
        // ---
        let started = Instant::now();
        let readings = self.readings.all().await?;
        let summaries = rollup(&readings, self.offset, self.tie_break);

        self.summaries.upsert_all(&summaries).await?;

        info!(
            readings = readings.len(),
            rows = summaries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "daily rollup complete"
        );
        Ok(summaries.len())
    }
}
