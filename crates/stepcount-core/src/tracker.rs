//! Baseline tracking of the raw step-counter stream.
//!
//! The hardware counter is cumulative since boot. [`SensorBaselineTracker`]
//! turns it into "steps since midnight" by remembering the raw value that
//! corresponds to zero live steps (the baseline) and flushing the live delta
//! into the [`DailyStepStore`] whenever it reaches a multiple of
//! `save_interval`. Live steps not yet flushed when the device reboots are
//! not recoverable: the counter no longer covers them.
//!
//! | Reading | Tracker state | Action |
//! |---------|---------------|--------|
//! | any | no baseline | reconcile today, baseline = reading |
//! | any | tracking an earlier day | reconcile the new day, start at zero |
//! | `< baseline` | tracking | reboot: reconcile today, baseline = reading |
//! | `>= baseline` | tracking | live = reading - baseline, flush on each multiple of `save_interval` |
//!
//! When a required write fails the tracker keeps its previous state, emits
//! [`StepEvent::PersistenceFailed`] and returns the error; the next reading
//! retries from the same point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stepcount_types::StepDate;

use crate::daily::{DailyStepStore, ReconcileKind, Reconciliation, SaveOutcome};
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, StepEvent};

/// Default number of live steps between automatic saves.
pub const DEFAULT_SAVE_INTERVAL: u64 = 10;

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Live steps between automatic saves.
    pub save_interval: u64,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            save_interval: DEFAULT_SAVE_INTERVAL,
            event_capacity: 100,
        }
    }
}

impl TrackerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.save_interval == 0 {
            return Err(Error::invalid_config("save_interval must be at least 1"));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Read-only view of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSnapshot {
    /// Day the tracker is counting for, once a reading has been reconciled.
    pub date: Option<StepDate>,
    /// Persisted total for that day as known to this tracker.
    pub today_steps: u64,
    /// Unsaved steps since the baseline.
    pub live_steps: u64,
    /// Last raw sensor value.
    pub sensor_value: Option<u64>,
    /// Raw value corresponding to zero live steps.
    pub baseline: Option<u64>,
    /// Persisted total for the current month.
    pub monthly_steps: u64,
    /// `today_steps + live_steps`.
    pub display_total: u64,
}

/// What a single reading did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOutcome {
    /// First reading of the session; today was reconciled.
    Initialized(Reconciliation),
    /// The calendar day changed; the new day was reconciled.
    NewDay(Reconciliation),
    /// The counter went backwards; today was reconciled again.
    Rebooted(Reconciliation),
    /// Forward progress.
    Progress {
        /// Steps since the baseline before any flush.
        live_steps: u64,
        /// Result of the flush, if one ran.
        saved: Option<SaveOutcome>,
    },
    /// Same value as before; nothing changed.
    Unchanged,
}

#[derive(Debug, Default)]
struct TrackerState {
    baseline: Option<u64>,
    live_steps: u64,
    last_sensor_value: Option<u64>,
    persisted_steps: u64,
    tracking_date: Option<StepDate>,
    monthly_steps: u64,
    pending_flush: bool,
}

/// Converts raw cumulative readings into a persisted daily total.
pub struct SensorBaselineTracker {
    store: Arc<DailyStepStore>,
    config: TrackerConfig,
    events: EventDispatcher,
    state: TrackerState,
}

impl std::fmt::Debug for SensorBaselineTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorBaselineTracker")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SensorBaselineTracker {
    /// Create an uninitialized tracker.
    pub fn new(
        store: Arc<DailyStepStore>,
        config: TrackerConfig,
        events: EventDispatcher,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            events,
            state: TrackerState::default(),
        })
    }

    /// The tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Whether a baseline is set.
    pub fn is_tracking(&self) -> bool {
        self.state.baseline.is_some()
    }

    /// Persisted plus live steps.
    pub fn current_display_total(&self) -> u64 {
        self.state.persisted_steps.saturating_add(self.state.live_steps)
    }

    /// Copy of the current view.
    pub fn snapshot(&self) -> StepSnapshot {
        StepSnapshot {
            date: self.state.tracking_date,
            today_steps: self.state.persisted_steps,
            live_steps: self.state.live_steps,
            sensor_value: self.state.last_sensor_value,
            baseline: self.state.baseline,
            monthly_steps: self.state.monthly_steps,
            display_total: self.current_display_total(),
        }
    }

    /// Process one raw sensor value.
    pub async fn on_reading(&mut self, raw: u64) -> Result<ReadingOutcome> {
        let today = self.store.today();

        let Some(baseline) = self.state.baseline else {
            let rec = self.enter_day(today, raw).await?;
            self.state.last_sensor_value = Some(raw);
            if rec.kind == ReconcileKind::Created {
                self.events.send(StepEvent::NewDay { date: today });
            }
            self.notify_updated();
            return Ok(ReadingOutcome::Initialized(rec));
        };

        if self.state.tracking_date != Some(today) {
            return self.roll_over(today, raw).await;
        }

        if raw < baseline {
            info!(
                "Reboot detected: sensor {} < baseline {}, {} unsaved steps lost",
                raw, baseline, self.state.live_steps
            );
            let rec = self.enter_day(today, raw).await?;
            self.state.last_sensor_value = Some(raw);
            self.events.send(StepEvent::RebootDetected { sensor_value: raw });
            self.notify_updated();
            return Ok(ReadingOutcome::Rebooted(rec));
        }

        let delta = raw - baseline;
        let changed = delta != self.state.live_steps;
        self.state.live_steps = delta;
        self.state.last_sensor_value = Some(raw);
        if changed {
            self.notify_updated();
        }

        let due = delta % self.config.save_interval == 0 || self.state.pending_flush;
        if delta > 0 && due {
            let saved = self.flush(today, raw).await?;
            return Ok(ReadingOutcome::Progress {
                live_steps: delta,
                saved: Some(saved),
            });
        }

        if changed {
            Ok(ReadingOutcome::Progress {
                live_steps: delta,
                saved: None,
            })
        } else {
            Ok(ReadingOutcome::Unchanged)
        }
    }

    /// Flush live steps now, regardless of cadence.
    ///
    /// Returns `None` when no reading has been reconciled yet, or when the
    /// day changed since the last reading (the live steps belong to a closed
    /// day and are dropped; the new day is reconciled instead).
    pub async fn manual_save(&mut self) -> Result<Option<SaveOutcome>> {
        let (Some(date), Some(raw)) = (self.state.tracking_date, self.state.last_sensor_value)
        else {
            debug!("Manual save ignored: no reading yet");
            return Ok(None);
        };
        if self.state.baseline.is_none() {
            debug!("Manual save ignored: tracker reset");
            return Ok(None);
        }

        let today = self.store.today();
        if date != today {
            self.roll_over(today, raw).await?;
            return Ok(None);
        }

        self.flush(date, raw).await.map(Some)
    }

    /// Reload persisted totals and clear the live delta.
    ///
    /// The baseline is kept, so the next reading recomputes the live delta
    /// from the same zero point.
    pub async fn refresh(&mut self) -> Result<()> {
        let date = self.state.tracking_date.unwrap_or_else(|| self.store.today());
        let persisted = self
            .store
            .get_steps_for_date(date)
            .await
            .map_err(|e| self.report("get_steps_for_date", e))?;
        let monthly = self
            .store
            .month_total(date.month())
            .await
            .map_err(|e| self.report("sum_by_month_prefix", e))?;

        self.state.persisted_steps = persisted;
        self.state.monthly_steps = monthly;
        self.state.live_steps = 0;
        debug!("Refreshed {}: {} steps, month {}", date, persisted, monthly);
        self.notify_updated();
        Ok(())
    }

    /// Forget the baseline and live delta. Persisted data is untouched.
    pub fn reset(&mut self) {
        self.state.baseline = None;
        self.state.live_steps = 0;
        self.state.pending_flush = false;
        info!("Tracker reset");
        self.notify_updated();
    }

    /// Reconcile `date` against `raw` and rebase on success.
    async fn enter_day(&mut self, date: StepDate, raw: u64) -> Result<Reconciliation> {
        let rec = self
            .store
            .reconcile(date, raw)
            .await
            .map_err(|e| self.report("initialize_today_data", e))?;

        self.state.baseline = Some(raw);
        self.state.live_steps = 0;
        self.state.persisted_steps = rec.steps;
        self.state.tracking_date = Some(date);
        self.state.pending_flush = false;
        self.reload_monthly(date).await;
        Ok(rec)
    }

    async fn roll_over(&mut self, today: StepDate, raw: u64) -> Result<ReadingOutcome> {
        let previous = self.state.tracking_date;
        let dropped = self.state.live_steps;
        let rec = self.enter_day(today, raw).await?;
        self.state.last_sensor_value = Some(raw);
        info!(
            "Day changed {:?} -> {}, {} unsaved steps left with the previous day",
            previous.map(|d| d.to_string()),
            today,
            dropped
        );
        self.events.send(StepEvent::NewDay { date: today });
        self.notify_updated();
        Ok(ReadingOutcome::NewDay(rec))
    }

    async fn flush(&mut self, date: StepDate, raw: u64) -> Result<SaveOutcome> {
        let total = self.current_display_total();
        let result = self.store.save_steps_for(date, total, raw).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state.pending_flush = true;
                return Err(self.report("save_today_steps", e));
            }
        };

        let before = self.current_display_total();
        self.state.persisted_steps = match outcome {
            SaveOutcome::Rejected { stored } => total.max(stored),
            _ => total,
        };
        self.state.live_steps = 0;
        self.state.baseline = Some(raw);
        self.state.pending_flush = false;

        if outcome.is_written() {
            debug!("Flushed {} steps for {} at sensor {}", total, date, raw);
            self.events.send(StepEvent::Saved {
                date,
                total: self.state.persisted_steps,
            });
        } else {
            debug!("Flush for {} rejected by stored total", date);
        }
        self.reload_monthly(date).await;
        if self.current_display_total() != before {
            self.notify_updated();
        }
        Ok(outcome)
    }

    /// Best effort: the monthly figure is informational.
    async fn reload_monthly(&mut self, date: StepDate) {
        match self.store.month_total(date.month()).await {
            Ok(total) => self.state.monthly_steps = total,
            Err(e) => warn!("Failed to reload monthly total: {}", e),
        }
    }

    fn notify_updated(&self) {
        self.events.send(StepEvent::Updated {
            display_total: self.current_display_total(),
            live_steps: self.state.live_steps,
            sensor_snapshot: self.state.last_sensor_value.unwrap_or(0),
        });
    }

    fn report(&self, operation: &str, error: Error) -> Error {
        warn!("Persistence failure during {}: {}", operation, error);
        self.events.send(StepEvent::PersistenceFailed {
            operation: operation.to_string(),
            error: error.to_string(),
        });
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::persistence::MemoryPersistence;
    use crate::traits::StepPersistence;
    use proptest::prelude::*;
    use stepcount_store::StoredDay;

    fn date(s: &str) -> StepDate {
        StepDate::parse(s).unwrap()
    }

    struct Harness {
        tracker: SensorBaselineTracker,
        store: Arc<DailyStepStore>,
        persistence: Arc<MemoryPersistence>,
        clock: Arc<FixedClock>,
        events: EventDispatcher,
    }

    fn harness(today: &str) -> Harness {
        let persistence = Arc::new(MemoryPersistence::new());
        let clock = Arc::new(FixedClock::new(date(today)));
        let store = Arc::new(DailyStepStore::new(persistence.clone(), clock.clone()));
        let events = EventDispatcher::new(256);
        let tracker =
            SensorBaselineTracker::new(store.clone(), TrackerConfig::default(), events.clone())
                .unwrap();
        Harness {
            tracker,
            store,
            persistence,
            clock,
            events,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());
        let bad = TrackerConfig {
            save_interval: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_first_reading_initializes() {
        let mut h = harness("2024-01-02");
        let mut rx = h.events.subscribe();

        let outcome = h.tracker.on_reading(500).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Initialized(Reconciliation {
                steps: 0,
                kind: ReconcileKind::Created,
                ..
            })
        ));
        let snap = h.tracker.snapshot();
        assert_eq!(snap.baseline, Some(500));
        assert_eq!(snap.live_steps, 0);
        assert_eq!(snap.date, Some(date("2024-01-02")));

        assert!(matches!(rx.recv().await.unwrap(), StepEvent::NewDay { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            StepEvent::Updated { display_total: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_live_delta() {
        let mut h = harness("2024-01-02");
        h.persistence
            .upsert(&StoredDay::new(date("2024-01-02"), 300, 1000))
            .await
            .unwrap();

        h.tracker.on_reading(1000).await.unwrap();
        let writes = h.persistence.write_count();
        let outcome = h.tracker.on_reading(1025).await.unwrap();
        assert_eq!(
            outcome,
            ReadingOutcome::Progress {
                live_steps: 25,
                saved: None
            }
        );

        let snap = h.tracker.snapshot();
        assert_eq!(snap.live_steps, 25);
        assert_eq!(snap.baseline, Some(1000));
        assert_eq!(snap.display_total, 325);
        assert_eq!(h.store.today_steps().await.unwrap(), 300);
        assert_eq!(h.persistence.write_count(), writes);
    }

    #[tokio::test]
    async fn test_off_multiple_jump_does_not_flush() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(500).await.unwrap();
        let writes = h.persistence.write_count();

        h.tracker.on_reading(509).await.unwrap();
        let outcome = h.tracker.on_reading(511).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Progress {
                live_steps: 11,
                saved: None
            }
        ));
        assert_eq!(h.persistence.write_count(), writes);

        // The next multiple flushes the whole delta.
        let outcome = h.tracker.on_reading(520).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Progress {
                live_steps: 20,
                saved: Some(_)
            }
        ));
        assert_eq!(h.store.today_steps().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_live_delta_below_cadence() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(1000).await.unwrap();
        h.tracker.on_reading(1007).await.unwrap();

        let snap = h.tracker.snapshot();
        assert_eq!(snap.live_steps, 7);
        assert_eq!(snap.display_total, 7);
        assert_eq!(h.store.today_steps().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_cadence() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(500).await.unwrap();
        let writes = h.persistence.write_count();

        for raw in 501..510 {
            let outcome = h.tracker.on_reading(raw).await.unwrap();
            assert!(matches!(outcome, ReadingOutcome::Progress { saved: None, .. }));
        }
        assert_eq!(h.persistence.write_count(), writes);

        let outcome = h.tracker.on_reading(510).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Progress {
                live_steps: 10,
                saved: Some(SaveOutcome::Updated { previous: 0 })
            }
        ));
        assert_eq!(h.persistence.write_count(), writes + 1);

        let snap = h.tracker.snapshot();
        assert_eq!(snap.live_steps, 0);
        assert_eq!(snap.baseline, Some(510));
        assert_eq!(snap.today_steps, 10);

        let row = h.store.get_record(date("2024-01-02")).await.unwrap().unwrap();
        assert_eq!((row.accumulated_steps, row.sensor_snapshot), (10, 510));
    }

    #[tokio::test]
    async fn test_repeated_value_is_unchanged() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(500).await.unwrap();
        h.tracker.on_reading(503).await.unwrap();
        assert_eq!(
            h.tracker.on_reading(503).await.unwrap(),
            ReadingOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_reboot_reconciles() {
        let mut h = harness("2024-01-02");
        let mut rx = h.events.subscribe();
        h.tracker.on_reading(5000).await.unwrap();
        h.tracker.on_reading(5020).await.unwrap();
        assert_eq!(h.tracker.current_display_total(), 20);

        let outcome = h.tracker.on_reading(3).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Rebooted(Reconciliation {
                steps: 20,
                kind: ReconcileKind::CounterReset { previous_snapshot: 5020 },
                ..
            })
        ));
        let snap = h.tracker.snapshot();
        assert_eq!(snap.baseline, Some(3));
        assert_eq!(snap.live_steps, 0);
        assert_eq!(snap.display_total, 20);

        h.tracker.on_reading(8).await.unwrap();
        assert_eq!(h.tracker.current_display_total(), 25);

        let mut saw_reboot = false;
        while let Ok(event) = rx.try_recv() {
            if event == (StepEvent::RebootDetected { sensor_value: 3 }) {
                saw_reboot = true;
            }
        }
        assert!(saw_reboot);
    }

    #[tokio::test]
    async fn test_reboot_only_reconciles() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(5000).await.unwrap();
        h.tracker.on_reading(5006).await.unwrap();
        let writes = h.persistence.write_count();

        let outcome = h.tracker.on_reading(2).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Rebooted(Reconciliation {
                steps: 0,
                kind: ReconcileKind::CounterReset { previous_snapshot: 5000 },
                ..
            })
        ));
        // Only the snapshot moves; the unsaved delta is not written.
        assert_eq!(h.persistence.write_count(), writes + 1);
        let snap = h.tracker.snapshot();
        assert_eq!((snap.baseline, snap.live_steps, snap.display_total), (Some(2), 0, 0));
        let row = h.store.get_record(date("2024-01-02")).await.unwrap().unwrap();
        assert_eq!((row.accumulated_steps, row.sensor_snapshot), (0, 2));
    }

    #[tokio::test]
    async fn test_day_rollover_starts_new_day_at_zero() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(1000).await.unwrap();
        h.tracker.on_reading(1010).await.unwrap();
        h.tracker.on_reading(1014).await.unwrap();

        h.clock.advance_days(1);
        let outcome = h.tracker.on_reading(1020).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::NewDay(Reconciliation {
                steps: 0,
                kind: ReconcileKind::Created,
                ..
            })
        ));

        // Closed day keeps its last saved total.
        assert_eq!(h.store.get_steps_for_date(date("2024-01-02")).await.unwrap(), 10);
        let row = h.store.get_record(date("2024-01-03")).await.unwrap().unwrap();
        assert_eq!((row.accumulated_steps, row.sensor_snapshot), (0, 1020));

        h.tracker.on_reading(1030).await.unwrap();
        assert_eq!(h.store.get_steps_for_date(date("2024-01-03")).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_state_and_retries() {
        let mut h = harness("2024-01-02");
        let mut rx = h.events.subscribe();
        h.tracker.on_reading(500).await.unwrap();

        h.persistence.set_remaining_failures(1);
        assert!(h.tracker.on_reading(510).await.is_err());
        let snap = h.tracker.snapshot();
        assert_eq!(snap.baseline, Some(500));
        assert_eq!(snap.live_steps, 10);
        assert_eq!(snap.today_steps, 0);

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StepEvent::PersistenceFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);

        // Next reading retries even though 11 is off-cadence.
        let outcome = h.tracker.on_reading(511).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Progress { saved: Some(_), .. }
        ));
        assert_eq!(h.store.today_steps().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_failed_initialization_stays_uninitialized() {
        let mut h = harness("2024-01-02");
        h.persistence.set_remaining_failures(1);

        let err = h.tracker.on_reading(500).await.unwrap_err();
        assert!(err.is_transient());
        assert!(!h.tracker.is_tracking());

        h.tracker.on_reading(505).await.unwrap();
        assert!(h.tracker.is_tracking());
    }

    #[tokio::test]
    async fn test_manual_save_and_reset() {
        let mut h = harness("2024-01-02");
        assert_eq!(h.tracker.manual_save().await.unwrap(), None);

        h.tracker.on_reading(500).await.unwrap();
        h.tracker.on_reading(504).await.unwrap();

        let saved = h.tracker.manual_save().await.unwrap();
        assert_eq!(saved, Some(SaveOutcome::Updated { previous: 0 }));
        let snap = h.tracker.snapshot();
        assert_eq!((snap.today_steps, snap.live_steps, snap.baseline), (4, 0, Some(504)));

        h.tracker.reset();
        assert!(!h.tracker.is_tracking());
        assert_eq!(h.store.today_steps().await.unwrap(), 4);

        // After reset the next reading reconciles again and recovers the gap.
        h.tracker.on_reading(520).await.unwrap();
        assert_eq!(h.tracker.current_display_total(), 20);
    }

    #[tokio::test]
    async fn test_refresh_reloads_persisted_total() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(500).await.unwrap();
        h.tracker.on_reading(505).await.unwrap();

        // Another writer raised the total.
        h.store.save_today_steps(40, 540).await.unwrap();
        h.tracker.refresh().await.unwrap();

        let snap = h.tracker.snapshot();
        assert_eq!(snap.today_steps, 40);
        assert_eq!(snap.live_steps, 0);
        assert_eq!(snap.baseline, Some(500));
        assert_eq!(snap.monthly_steps, 40);
    }

    #[tokio::test]
    async fn test_stale_flush_adopts_stored_total() {
        let mut h = harness("2024-01-02");
        h.tracker.on_reading(500).await.unwrap();
        h.store.save_today_steps(100, 600).await.unwrap();

        let outcome = h.tracker.on_reading(510).await.unwrap();
        assert!(matches!(
            outcome,
            ReadingOutcome::Progress {
                saved: Some(SaveOutcome::Rejected { stored: 100 }),
                ..
            }
        ));
        assert_eq!(h.tracker.current_display_total(), 100);
        assert_eq!(h.store.today_steps().await.unwrap(), 100);
    }

    fn run<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(f)
    }

    proptest! {
        #[test]
        fn prop_total_equals_forward_progress(
            start in 0u64..1_000_000,
            steps in prop::collection::vec(0u64..25, 1..60),
        ) {
            run(async {
                let mut h = harness("2024-05-05");
                let mut raw = start;
                h.tracker.on_reading(raw).await.unwrap();
                for s in &steps {
                    raw += s;
                    h.tracker.on_reading(raw).await.unwrap();
                }
                prop_assert_eq!(h.tracker.current_display_total(), raw - start);
                h.tracker.manual_save().await.unwrap();
                prop_assert_eq!(h.store.today_steps().await.unwrap(), raw - start);
                Ok(())
            })?;
        }

        #[test]
        fn prop_totals_never_decrease(
            readings in prop::collection::vec((0u64..30, prop::bool::weighted(0.05)), 1..80),
        ) {
            run(async {
                let mut h = harness("2024-05-05");
                let mut raw = 10_000u64;
                h.tracker.on_reading(raw).await.unwrap();
                let mut last_display = 0;
                let mut last_stored = 0;
                for (step, reboot) in readings {
                    // A reboot restarts the counter below the current baseline.
                    let baseline = h.tracker.snapshot().baseline.unwrap_or(0);
                    let rebooted = reboot && baseline > 0;
                    raw = if rebooted { step % baseline } else { raw + step };
                    h.tracker.on_reading(raw).await.unwrap();

                    let snap = h.tracker.snapshot();
                    prop_assert_eq!(snap.display_total, snap.today_steps + snap.live_steps);
                    prop_assert!(snap.baseline.is_some_and(|b| b <= raw));
                    if rebooted {
                        // Unsaved steps are dropped; the persisted part stays.
                        prop_assert_eq!(snap.live_steps, 0);
                        prop_assert!(snap.today_steps >= last_stored);
                    } else {
                        prop_assert!(snap.display_total >= last_display);
                    }

                    let stored = h.store.today_steps().await.unwrap();
                    prop_assert!(stored >= last_stored);
                    last_display = snap.display_total;
                    last_stored = stored;
                }
                Ok(())
            })?;
        }
    }
}
