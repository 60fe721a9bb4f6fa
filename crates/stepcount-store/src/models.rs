//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use stepcount_types::{DailySteps, StepDate};

/// One persisted day: the `daily_steps` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDay {
    /// Calendar day (primary key).
    pub date: StepDate,
    /// Reconciled step count for the day as of the last write.
    pub accumulated_steps: u64,
    /// Raw cumulative sensor value at the moment `accumulated_steps` was written.
    pub sensor_snapshot: u64,
    /// Epoch milliseconds of the last write.
    pub timestamp: i64,
}

impl StoredDay {
    /// Create a row stamped with the current time.
    pub fn new(date: StepDate, accumulated_steps: u64, sensor_snapshot: u64) -> Self {
        Self {
            date,
            accumulated_steps,
            sensor_snapshot,
            timestamp: now_millis(),
        }
    }

    /// Override the write timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Project to the chart-friendly `(date, steps)` pair.
    pub fn to_daily_steps(&self) -> DailySteps {
        DailySteps::new(self.date, self.accumulated_steps)
    }

    /// Last write time as a datetime, if the timestamp is representable.
    pub fn written_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.timestamp) * 1_000_000).ok()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
