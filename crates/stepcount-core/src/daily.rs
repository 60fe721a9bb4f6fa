//! Date-keyed step ledger with absence-tolerant reconciliation.
//!
//! [`DailyStepStore`] is the single source of truth shared by every tracking
//! session. It recovers steps taken while no tracker was running by comparing
//! the live sensor value with the snapshot stored alongside each day's total,
//! and it refuses any save that would lower a day's total.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stepcount_core::{DailyStepStore, FixedClock, MemoryPersistence};
//! use stepcount_types::StepDate;
//!
//! #[tokio::main]
//! async fn main() -> stepcount_core::Result<()> {
//!     let clock = Arc::new(FixedClock::new(StepDate::parse("2024-01-02")?));
//!     let store = DailyStepStore::new(Arc::new(MemoryPersistence::new()), clock);
//!
//!     // First session of the day starts at zero.
//!     assert_eq!(store.initialize_today_data(5000).await?, 0);
//!
//!     // App restarts later; 50 steps were taken while it was gone.
//!     assert_eq!(store.initialize_today_data(5050).await?, 50);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use stepcount_store::StoredDay;
use stepcount_types::{DailySteps, DateRange, MonthKey, StepDate};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::traits::StepPersistence;

/// How a day's record was reconciled against a sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileKind {
    /// No record existed; one was created at zero.
    Created,
    /// The sensor advanced while untracked; the difference was added.
    BackgroundSteps(u64),
    /// The sensor went backwards since the snapshot (device reboot);
    /// the snapshot was moved, the total kept.
    CounterReset {
        /// Snapshot that was replaced.
        previous_snapshot: u64,
    },
    /// The sensor matched the snapshot.
    Unchanged,
}

/// Result of [`DailyStepStore::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Day that was reconciled.
    pub date: StepDate,
    /// Reconciled total for that day.
    pub steps: u64,
    /// What happened.
    pub kind: ReconcileKind,
}

/// Result of a save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new record was written.
    Inserted,
    /// The existing record was raised to the new total.
    Updated {
        /// Total before the write.
        previous: u64,
    },
    /// The write would not have raised the total and was ignored.
    Rejected {
        /// Total currently stored.
        stored: u64,
    },
}

impl SaveOutcome {
    /// Whether anything was written.
    pub fn is_written(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Durable per-day step totals.
pub struct DailyStepStore {
    persistence: Arc<dyn StepPersistence>,
    clock: Arc<dyn Clock>,
    /// Serialises read-modify-write sequences within this process.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for DailyStepStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyStepStore")
            .field("today", &self.today())
            .finish_non_exhaustive()
    }
}

impl DailyStepStore {
    /// Create a store over a persistence backend and clock.
    pub fn new(persistence: Arc<dyn StepPersistence>, clock: Arc<dyn Clock>) -> Self {
        Self {
            persistence,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store that uses the system clock.
    pub fn with_system_clock(persistence: Arc<dyn StepPersistence>) -> Self {
        Self::new(persistence, Arc::new(SystemClock))
    }

    /// The current calendar day.
    pub fn today(&self) -> StepDate {
        self.clock.today()
    }

    /// The clock this store stamps writes with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Whether today has no record yet, meaning a new day started since the
    /// last session.
    pub async fn handle_date_change(&self) -> Result<bool> {
        let today = self.today();
        let is_new = self.persistence.get_by_date(today).await?.is_none();
        if is_new {
            info!("New day detected: {}", today);
        }
        Ok(is_new)
    }

    /// Reconcile today's record against the current raw sensor value.
    ///
    /// Returns the reconciled total for today.
    pub async fn initialize_today_data(&self, current_sensor_value: u64) -> Result<u64> {
        Ok(self
            .reconcile(self.today(), current_sensor_value)
            .await?
            .steps)
    }

    /// Reconcile a day's record against the current raw sensor value.
    ///
    /// A missing record is created at zero: each date starts fresh and prior
    /// progress is never carried forward. An existing record gains any steps
    /// counted since its snapshot. A counter that went backwards only moves
    /// the snapshot.
    pub async fn reconcile(&self, date: StepDate, current_sensor_value: u64) -> Result<Reconciliation> {
        let _guard = self.write_lock.lock().await;

        let Some(record) = self.persistence.get_by_date(date).await? else {
            let row = StoredDay::new(date, 0, current_sensor_value)
                .with_timestamp(self.clock.now_millis());
            self.persistence.upsert(&row).await?;
            info!(
                "Created record for {} at sensor value {}",
                date, current_sensor_value
            );
            return Ok(Reconciliation {
                date,
                steps: 0,
                kind: ReconcileKind::Created,
            });
        };

        let (steps, kind) = if current_sensor_value > record.sensor_snapshot {
            let background = current_sensor_value - record.sensor_snapshot;
            let steps = record.accumulated_steps.saturating_add(background);
            self.write_fields(date, steps, current_sensor_value).await?;
            info!(
                "Recovered {} background steps for {} (total {})",
                background, date, steps
            );
            (steps, ReconcileKind::BackgroundSteps(background))
        } else if current_sensor_value < record.sensor_snapshot {
            self.write_fields(date, record.accumulated_steps, current_sensor_value)
                .await?;
            info!(
                "Sensor counter reset for {} ({} -> {}), keeping {} steps",
                date, record.sensor_snapshot, current_sensor_value, record.accumulated_steps
            );
            (
                record.accumulated_steps,
                ReconcileKind::CounterReset {
                    previous_snapshot: record.sensor_snapshot,
                },
            )
        } else {
            debug!("No background steps for {}", date);
            (record.accumulated_steps, ReconcileKind::Unchanged)
        };

        Ok(Reconciliation { date, steps, kind })
    }

    /// Persist today's total, unless it would not raise the stored value.
    pub async fn save_today_steps(
        &self,
        accumulated_steps: u64,
        sensor_snapshot: u64,
    ) -> Result<SaveOutcome> {
        self.save_steps_for(self.today(), accumulated_steps, sensor_snapshot)
            .await
    }

    /// Persist a day's total, unless it would not raise the stored value.
    ///
    /// Rejection is not an error; the stored total is reported back.
    pub async fn save_steps_for(
        &self,
        date: StepDate,
        accumulated_steps: u64,
        sensor_snapshot: u64,
    ) -> Result<SaveOutcome> {
        let _guard = self.write_lock.lock().await;

        match self.persistence.get_by_date(date).await? {
            Some(existing) if accumulated_steps <= existing.accumulated_steps => {
                debug!(
                    "Ignoring stale save for {}: {} <= stored {}",
                    date, accumulated_steps, existing.accumulated_steps
                );
                Ok(SaveOutcome::Rejected {
                    stored: existing.accumulated_steps,
                })
            }
            Some(existing) => {
                self.write_fields(date, accumulated_steps, sensor_snapshot)
                    .await?;
                debug!(
                    "Saved {} steps for {} (was {})",
                    accumulated_steps, date, existing.accumulated_steps
                );
                Ok(SaveOutcome::Updated {
                    previous: existing.accumulated_steps,
                })
            }
            None => {
                let row = StoredDay::new(date, accumulated_steps, sensor_snapshot)
                    .with_timestamp(self.clock.now_millis());
                self.persistence.upsert(&row).await?;
                debug!("Inserted {} steps for {}", accumulated_steps, date);
                Ok(SaveOutcome::Inserted)
            }
        }
    }

    /// Overwrite both step fields, recreating the row if it vanished.
    async fn write_fields(&self, date: StepDate, steps: u64, snapshot: u64) -> Result<()> {
        let now = self.clock.now_millis();
        if !self
            .persistence
            .update_fields(date, steps, snapshot, now)
            .await?
        {
            warn!("Record for {} disappeared during update, re-inserting", date);
            self.persistence
                .upsert(&StoredDay::new(date, steps, snapshot).with_timestamp(now))
                .await?;
        }
        Ok(())
    }
}

// Queries
impl DailyStepStore {
    /// Stored total for a date, 0 when absent.
    pub async fn get_steps_for_date(&self, date: StepDate) -> Result<u64> {
        Ok(self
            .persistence
            .get_by_date(date)
            .await?
            .map_or(0, |d| d.accumulated_steps))
    }

    /// Stored total for today.
    pub async fn today_steps(&self) -> Result<u64> {
        self.get_steps_for_date(self.today()).await
    }

    /// The full record for a date.
    pub async fn get_record(&self, date: StepDate) -> Result<Option<StoredDay>> {
        self.persistence.get_by_date(date).await
    }

    /// One entry per calendar day in `start..=end`, ascending, with 0 for
    /// days that have no record.
    pub async fn get_steps_in_range(
        &self,
        start: StepDate,
        end: StepDate,
    ) -> Result<Vec<DailySteps>> {
        let range = DateRange::new(start, end)?;
        let stored = self.persistence.list_between(start, end).await?;

        let mut stored = stored.into_iter().peekable();
        let mut series = Vec::with_capacity(range.len());
        for date in range.days() {
            // Skip anything the backend returned outside the calendar walk.
            while stored.peek().is_some_and(|d| d.date < date) {
                stored.next();
            }
            let steps = match stored.peek() {
                Some(d) if d.date == date => d.accumulated_steps,
                _ => 0,
            };
            series.push(DailySteps::new(date, steps));
        }
        Ok(series)
    }

    /// Sum over existing records in `start..=end`, 0 when none.
    pub async fn get_total_in_range(&self, start: StepDate, end: StepDate) -> Result<u64> {
        Ok(self
            .persistence
            .sum_between(start, end)
            .await?
            .unwrap_or(0))
    }

    /// Sum over every record in the given calendar month.
    pub async fn get_monthly_total(&self, year: i32, month: u8) -> Result<u64> {
        self.month_total(MonthKey::new(year, month)?).await
    }

    /// Sum over every record in a month.
    pub async fn month_total(&self, month: MonthKey) -> Result<u64> {
        Ok(self
            .persistence
            .sum_by_month_prefix(month)
            .await?
            .unwrap_or(0))
    }

    /// Sum over the month containing today.
    pub async fn current_month_total(&self) -> Result<u64> {
        self.month_total(self.today().month()).await
    }

    /// Up to `limit` most recent recorded days, newest first.
    pub async fn recent_days(&self, limit: u32) -> Result<Vec<DailySteps>> {
        Ok(self
            .persistence
            .list_recent(limit)
            .await?
            .iter()
            .map(StoredDay::to_daily_steps)
            .collect())
    }

    /// Every recorded day, newest first.
    pub async fn all_days(&self) -> Result<Vec<DailySteps>> {
        Ok(self
            .persistence
            .list_all()
            .await?
            .iter()
            .map(StoredDay::to_daily_steps)
            .collect())
    }

    /// Remove one day's record. Returns whether it existed.
    pub async fn delete_date(&self, date: StepDate) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let removed = self.persistence.delete_by_date(date).await?;
        info!("Deleted record for {} (existed: {})", date, removed);
        Ok(removed)
    }

    /// Remove every record. Returns the number removed.
    pub async fn delete_all(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let removed = self.persistence.delete_all().await?;
        warn!("Deleted all {} step records", removed);
        Ok(removed)
    }
}
