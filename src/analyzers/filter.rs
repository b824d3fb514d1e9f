//! Restricts rows to a closed time interval.

use crate::analyzers::types::Row;
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};

/// Closed interval `[start_ms, end_ms]` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        TimeRange { start_ms, end_ms }
    }

    /// Whole days from `from` 00:00 through `to` 23:59:59.999. An open end
    /// extends to the beginning or end of time. Returns `None` when both
    /// ends are open.
    pub fn from_dates(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<Self> {
        if from.is_none() && to.is_none() {
            return None;
        }
        let start_ms = from.map_or(i64::MIN, midnight_ms);
        let end_ms = to.map_or(i64::MAX, |d| midnight_ms(d) + 86_400_000 - 1);
        Some(TimeRange { start_ms, end_ms })
    }

    pub fn contains(&self, ms: i64) -> bool {
        self.start_ms <= ms && ms <= self.end_ms
    }
}

fn midnight_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Keeps rows whose timestamp falls inside `range`, both ends inclusive.
pub fn filter_time_range(rows: &[Row], range: TimeRange) -> Vec<Row> {
    if range.start_ms > range.end_ms {
        warn!(
            start_ms = range.start_ms,
            end_ms = range.end_ms,
            "Time range is reversed, nothing matches"
        );
        return Vec::new();
    }

    let kept: Vec<Row> = rows
        .iter()
        .filter(|row| range.contains(row.timestamp_ms()))
        .cloned()
        .collect();

    debug!(input = rows.len(), kept = kept.len(), "Filtered rows by time range");
    kept
}
