//! Trait seams for persistence backends and step sensors.
//!
//! [`StepPersistence`] is the record-keeping contract consumed by
//! [`DailyStepStore`](crate::DailyStepStore). [`StepSensor`] is the source of
//! raw cumulative counter values consumed by
//! [`StepCounterManager`](crate::StepCounterManager).
//!
//! # Example
//!
//! ```ignore
//! use stepcount_core::{Result, StepPersistence};
//! use stepcount_types::StepDate;
//!
//! async fn show<P: StepPersistence + ?Sized>(p: &P, date: StepDate) -> Result<()> {
//!     if let Some(day) = p.get_by_date(date).await? {
//!         println!("{}: {}", day.date, day.accumulated_steps);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

use stepcount_store::StoredDay;
use stepcount_types::{MonthKey, StepDate};

use crate::error::Result;
use crate::stream::SensorStream;

/// Keyed record storage for one row per calendar day.
///
/// Range bounds are inclusive. List operations return records in ascending
/// date order unless noted otherwise.
#[async_trait]
pub trait StepPersistence: Send + Sync {
    /// Fetch the record for a date.
    async fn get_by_date(&self, date: StepDate) -> Result<Option<StoredDay>>;

    /// Insert or replace the record for `day.date`.
    async fn upsert(&self, day: &StoredDay) -> Result<()>;

    /// Overwrite the step fields of an existing record.
    ///
    /// Returns `false` when no record exists.
    async fn update_fields(
        &self,
        date: StepDate,
        accumulated_steps: u64,
        sensor_snapshot: u64,
        timestamp: i64,
    ) -> Result<bool>;

    /// Sum of `accumulated_steps` over existing records in the range.
    ///
    /// `None` when no record falls in the range.
    async fn sum_between(&self, start: StepDate, end: StepDate) -> Result<Option<u64>>;

    /// Sum of `accumulated_steps` over records whose date starts with the
    /// month prefix.
    async fn sum_by_month_prefix(&self, month: MonthKey) -> Result<Option<u64>>;

    /// Existing records in the range, ascending.
    async fn list_between(&self, start: StepDate, end: StepDate) -> Result<Vec<StoredDay>>;

    /// Up to `limit` most recent records, newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<StoredDay>>;

    /// Every record, newest first.
    async fn list_all(&self) -> Result<Vec<StoredDay>>;

    /// Remove one record. Returns whether it existed.
    async fn delete_by_date(&self, date: StepDate) -> Result<bool>;

    /// Remove every record. Returns the number removed.
    async fn delete_all(&self) -> Result<usize>;
}

/// A cumulative step-counter sensor.
///
/// Values are monotonically non-decreasing between device reboots and reset
/// to a small number after one.
#[async_trait]
pub trait StepSensor: Send + Sync {
    /// Sensor name for logs and events.
    fn name(&self) -> &str;

    /// Whether the hardware is present.
    async fn is_available(&self) -> bool;

    /// Start delivering readings.
    async fn register(&self) -> Result<SensorStream>;

    /// Stop delivering readings. Safe to call when not registered.
    fn unregister(&self);
}
