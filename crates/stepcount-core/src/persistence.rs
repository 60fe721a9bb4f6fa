//! [`StepPersistence`] backends.
//!
//! - [`SqlitePersistence`] wraps a [`stepcount_store::Store`] behind an async
//!   mutex and is what the service runs on.
//! - [`MemoryPersistence`] keeps records in a map and supports failure
//!   injection for tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use stepcount_store::{Store, StoredDay};
use stepcount_types::{MonthKey, StepDate};

use crate::error::{Error, Result};
use crate::traits::StepPersistence;

/// SQLite-backed persistence.
pub struct SqlitePersistence {
    store: Mutex<Store>,
}

impl std::fmt::Debug for SqlitePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePersistence").finish_non_exhaustive()
    }
}

impl SqlitePersistence {
    /// Wrap an open store.
    pub fn new(store: Store) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Store::open(path)?))
    }

    /// Open an in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Store::open_in_memory()?))
    }
}

#[async_trait]
impl StepPersistence for SqlitePersistence {
    async fn get_by_date(&self, date: StepDate) -> Result<Option<StoredDay>> {
        Ok(self.store.lock().await.get_by_date(date)?)
    }

    async fn upsert(&self, day: &StoredDay) -> Result<()> {
        Ok(self.store.lock().await.upsert(day)?)
    }

    async fn update_fields(
        &self,
        date: StepDate,
        accumulated_steps: u64,
        sensor_snapshot: u64,
        timestamp: i64,
    ) -> Result<bool> {
        Ok(self.store.lock().await.update_fields(
            date,
            accumulated_steps,
            sensor_snapshot,
            timestamp,
        )?)
    }

    async fn sum_between(&self, start: StepDate, end: StepDate) -> Result<Option<u64>> {
        Ok(self.store.lock().await.sum_between(start, end)?)
    }

    async fn sum_by_month_prefix(&self, month: MonthKey) -> Result<Option<u64>> {
        Ok(self.store.lock().await.sum_by_month_prefix(month)?)
    }

    async fn list_between(&self, start: StepDate, end: StepDate) -> Result<Vec<StoredDay>> {
        Ok(self.store.lock().await.list_between(start, end)?)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StoredDay>> {
        Ok(self.store.lock().await.list_recent(limit)?)
    }

    async fn list_all(&self) -> Result<Vec<StoredDay>> {
        Ok(self.store.lock().await.list_all()?)
    }

    async fn delete_by_date(&self, date: StepDate) -> Result<bool> {
        Ok(self.store.lock().await.delete_by_date(date)?)
    }

    async fn delete_all(&self) -> Result<usize> {
        Ok(self.store.lock().await.delete_all()?)
    }
}

/// In-memory persistence with failure injection.
///
/// # Example
///
/// ```
/// use stepcount_core::{MemoryPersistence, StepPersistence};
/// use stepcount_store::StoredDay;
/// use stepcount_types::StepDate;
///
/// #[tokio::main]
/// async fn main() {
///     let p = MemoryPersistence::new();
///     let date = StepDate::parse("2024-03-01").unwrap();
///
///     p.set_remaining_failures(1);
///     assert!(p.upsert(&StoredDay::new(date, 10, 510)).await.is_err());
///     assert!(p.upsert(&StoredDay::new(date, 10, 510)).await.is_ok());
/// }
/// ```
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    days: RwLock<BTreeMap<StepDate, StoredDay>>,
    should_fail: AtomicBool,
    remaining_failures: AtomicU32,
    write_count: AtomicU64,
}

impl MemoryPersistence {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with records.
    pub fn with_days(days: impl IntoIterator<Item = StoredDay>) -> Self {
        let map = days.into_iter().map(|d| (d.date, d)).collect();
        Self {
            days: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Make every operation fail until cleared.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Fail the next `count` operations, then recover.
    pub fn set_remaining_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Number of successful writes (upserts and updates).
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Snapshot of every stored record, ascending.
    pub async fn records(&self) -> Vec<StoredDay> {
        self.days.read().await.values().cloned().collect()
    }

    fn check_should_fail(&self, operation: &str) -> Result<()> {
        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::persistence(operation, "injected transient failure"));
        }
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::persistence(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl StepPersistence for MemoryPersistence {
    async fn get_by_date(&self, date: StepDate) -> Result<Option<StoredDay>> {
        self.check_should_fail("get_by_date")?;
        Ok(self.days.read().await.get(&date).cloned())
    }

    async fn upsert(&self, day: &StoredDay) -> Result<()> {
        self.check_should_fail("upsert")?;
        let mut days = self.days.write().await;
        let mut row = day.clone();
        if let Some(existing) = days.get(&day.date) {
            row.timestamp = row.timestamp.max(existing.timestamp);
        }
        days.insert(day.date, row);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn update_fields(
        &self,
        date: StepDate,
        accumulated_steps: u64,
        sensor_snapshot: u64,
        timestamp: i64,
    ) -> Result<bool> {
        self.check_should_fail("update_fields")?;
        let mut days = self.days.write().await;
        let Some(row) = days.get_mut(&date) else {
            return Ok(false);
        };
        row.accumulated_steps = accumulated_steps;
        row.sensor_snapshot = sensor_snapshot;
        row.timestamp = row.timestamp.max(timestamp);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    async fn sum_between(&self, start: StepDate, end: StepDate) -> Result<Option<u64>> {
        self.check_should_fail("sum_between")?;
        let days = self.days.read().await;
        let mut rows = days.range(start..=end).peekable();
        if rows.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(rows.map(|(_, d)| d.accumulated_steps).sum()))
    }

    async fn sum_by_month_prefix(&self, month: MonthKey) -> Result<Option<u64>> {
        self.check_should_fail("sum_by_month_prefix")?;
        let days = self.days.read().await;
        let mut rows = days
            .values()
            .filter(|d| d.date.month() == month)
            .peekable();
        if rows.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(rows.map(|d| d.accumulated_steps).sum()))
    }

    async fn list_between(&self, start: StepDate, end: StepDate) -> Result<Vec<StoredDay>> {
        self.check_should_fail("list_between")?;
        if start > end {
            return Ok(Vec::new());
        }
        let days = self.days.read().await;
        Ok(days.range(start..=end).map(|(_, d)| d.clone()).collect())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StoredDay>> {
        self.check_should_fail("list_recent")?;
        let days = self.days.read().await;
        Ok(days.values().rev().take(limit as usize).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<StoredDay>> {
        self.check_should_fail("list_all")?;
        let days = self.days.read().await;
        Ok(days.values().rev().cloned().collect())
    }

    async fn delete_by_date(&self, date: StepDate) -> Result<bool> {
        self.check_should_fail("delete_by_date")?;
        Ok(self.days.write().await.remove(&date).is_some())
    }

    async fn delete_all(&self) -> Result<usize> {
        self.check_should_fail("delete_all")?;
        let mut days = self.days.write().await;
        let removed = days.len();
        days.clear();
        Ok(removed)
    }
}
