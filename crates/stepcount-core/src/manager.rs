//! The shared tracking session.
//!
//! [`StepCounterManager`] owns the one [`SensorBaselineTracker`] of the
//! process. The UI layer and the background worker both hold an
//! `Arc<StepCounterManager>`, so they observe the same baseline instead of
//! drifting apart. Tracker mutation is serialised by an async mutex; readings
//! and manual actions queue behind each other.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::daily::{DailyStepStore, SaveOutcome};
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, StepEvent};
use crate::guard::SensorSubscription;
use crate::stream::SensorStream;
use crate::tracker::{ReadingOutcome, SensorBaselineTracker, StepSnapshot, TrackerConfig};
use crate::traits::StepSensor;

/// Process-wide step counting service.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stepcount_core::{
///     DailyStepStore, FixedClock, MemoryPersistence, StepCounterManager, TrackerConfig,
/// };
/// use stepcount_types::StepDate;
///
/// #[tokio::main]
/// async fn main() -> stepcount_core::Result<()> {
///     let clock = Arc::new(FixedClock::new(StepDate::parse("2024-01-02")?));
///     let store = Arc::new(DailyStepStore::new(Arc::new(MemoryPersistence::new()), clock));
///     let manager = StepCounterManager::new(store, TrackerConfig::default())?;
///
///     manager.on_reading(500).await?;
///     manager.on_reading(507).await?;
///     assert_eq!(manager.display_total().await, 7);
///     Ok(())
/// }
/// ```
pub struct StepCounterManager {
    store: Arc<DailyStepStore>,
    tracker: Mutex<SensorBaselineTracker>,
    events: EventDispatcher,
}

impl std::fmt::Debug for StepCounterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepCounterManager")
            .field("store", &self.store)
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl StepCounterManager {
    /// Create the shared session.
    pub fn new(store: Arc<DailyStepStore>, config: TrackerConfig) -> Result<Arc<Self>> {
        let events = EventDispatcher::new(config.event_capacity);
        let tracker = SensorBaselineTracker::new(store.clone(), config, events.clone())?;
        Ok(Arc::new(Self {
            store,
            tracker: Mutex::new(tracker),
            events,
        }))
    }

    /// The shared ledger.
    pub fn store(&self) -> &Arc<DailyStepStore> {
        &self.store
    }

    /// The event dispatcher.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to step events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Load today's and this month's persisted totals.
    ///
    /// Returns `true` when today has no record yet.
    pub async fn load(&self) -> Result<bool> {
        let new_day = self.store.handle_date_change().await?;
        self.tracker.lock().await.refresh().await?;
        Ok(new_day)
    }

    /// Feed one raw sensor value.
    pub async fn on_reading(&self, raw: u64) -> Result<ReadingOutcome> {
        self.tracker.lock().await.on_reading(raw).await
    }

    /// Flush live steps now.
    pub async fn save(&self) -> Result<Option<SaveOutcome>> {
        self.tracker.lock().await.manual_save().await
    }

    /// Reload persisted totals and clear the live delta.
    pub async fn refresh(&self) -> Result<()> {
        self.tracker.lock().await.refresh().await
    }

    /// Forget the baseline. Persisted data is untouched.
    pub async fn reset(&self) {
        self.tracker.lock().await.reset();
    }

    /// Copy of the tracker view.
    pub async fn snapshot(&self) -> StepSnapshot {
        self.tracker.lock().await.snapshot()
    }

    /// Persisted plus live steps for today.
    pub async fn display_total(&self) -> u64 {
        self.tracker.lock().await.current_display_total()
    }

    /// Start feeding a sensor into the tracker.
    ///
    /// `permitted` is checked first; when it returns `false` the sensor is not
    /// touched and [`Error::PermissionDenied`] is returned. A missing sensor is
    /// reported once with [`StepEvent::SensorUnavailable`] and
    /// [`Error::SensorUnavailable`].
    pub async fn start<F>(
        self: &Arc<Self>,
        sensor: Arc<dyn StepSensor>,
        permitted: F,
    ) -> Result<TrackingSession>
    where
        F: Fn() -> bool,
    {
        if !permitted() {
            warn!("Sensor access not permitted, staying idle");
            return Err(Error::PermissionDenied);
        }

        let name = sensor.name().to_string();
        if !sensor.is_available().await {
            return Err(self.unavailable(&name));
        }

        let stream = match sensor.register().await {
            Ok(stream) => stream,
            Err(Error::SensorUnavailable { .. }) => return Err(self.unavailable(&name)),
            Err(e) => return Err(e),
        };
        let subscription = SensorSubscription::new(sensor);
        info!("Registered step sensor {}", name);

        let token = CancellationToken::new();
        let handle = tokio::spawn(pump(
            Arc::clone(self),
            stream,
            subscription,
            token.clone(),
        ));

        Ok(TrackingSession {
            sensor: name,
            token,
            handle: Some(handle),
        })
    }

    fn unavailable(&self, name: &str) -> Error {
        warn!("Step counter sensor {} unavailable", name);
        self.events.send(StepEvent::SensorUnavailable {
            sensor: name.to_string(),
        });
        Error::sensor_unavailable(name)
    }
}

/// Feed readings into the manager until cancelled or the stream ends.
///
/// The subscription lives inside the task so the sensor is unregistered on
/// every exit path.
async fn pump(
    manager: Arc<StepCounterManager>,
    mut stream: SensorStream,
    subscription: SensorSubscription,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Tracking session cancelled");
                break;
            }
            reading = stream.next() => match reading {
                Some(raw) => {
                    if let Err(e) = manager.on_reading(raw).await {
                        warn!("Reading {} not applied: {}", raw, e);
                    }
                }
                None => {
                    debug!("Sensor stream ended");
                    break;
                }
            }
        }
    }
    subscription.release();
}

/// A running sensor pump.
///
/// Dropping the session cancels the pump; [`stop`](Self::stop) also waits for
/// it. A reading already being applied completes first.
#[derive(Debug)]
pub struct TrackingSession {
    sensor: String,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TrackingSession {
    /// Name of the sensor being tracked.
    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    /// Whether the pump is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Token that cancels this session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the pump and wait for it to unregister the sensor.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!("Tracking task for {} ended abnormally: {}", self.sensor, e);
        }
        info!("Stopped tracking {}", self.sensor);
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::mock::MockStepSensor;
    use crate::persistence::MemoryPersistence;
    use stepcount_types::StepDate;
    use std::time::Duration;

    fn manager() -> Arc<StepCounterManager> {
        let clock = Arc::new(FixedClock::new(StepDate::parse("2024-01-02").unwrap()));
        let store = Arc::new(DailyStepStore::new(Arc::new(MemoryPersistence::new()), clock));
        StepCounterManager::new(store, TrackerConfig::default()).unwrap()
    }

    async fn wait_for_total(manager: &StepCounterManager, expected: u64) {
        for _ in 0..200 {
            if manager.display_total().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "display total stuck at {}, expected {}",
            manager.display_total().await,
            expected
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let clock = Arc::new(FixedClock::new(StepDate::parse("2024-01-02").unwrap()));
        let store = Arc::new(DailyStepStore::new(Arc::new(MemoryPersistence::new()), clock));
        let config = TrackerConfig {
            save_interval: 0,
            ..Default::default()
        };
        assert!(StepCounterManager::new(store, config).is_err());
    }

    #[tokio::test]
    async fn test_permission_gate_leaves_sensor_untouched() {
        let manager = manager();
        let sensor = Arc::new(MockStepSensor::new("step_counter"));

        let result = manager.start(sensor.clone(), || false).await;
        assert!(matches!(result, Err(Error::PermissionDenied)));
        assert_eq!(sensor.register_count(), 0);
        assert!(manager.snapshot().await.baseline.is_none());
    }

    #[tokio::test]
    async fn test_missing_sensor_reported_once() {
        let manager = manager();
        let mut rx = manager.subscribe();
        let sensor = Arc::new(MockStepSensor::builder().available(false).build());

        let result = manager.start(sensor.clone(), || true).await;
        assert!(matches!(result, Err(Error::SensorUnavailable { .. })));
        assert!(matches!(
            rx.try_recv().unwrap(),
            StepEvent::SensorUnavailable { .. }
        ));
        assert!(rx.try_recv().is_err());
        assert_eq!(sensor.register_count(), 0);
    }

    #[tokio::test]
    async fn test_session_pumps_readings_and_unregisters() {
        let manager = manager();
        let sensor = Arc::new(MockStepSensor::builder().counter(500).build());

        let session = manager.start(sensor.clone(), || true).await.unwrap();
        assert_eq!(session.sensor(), "mock_step_counter");
        assert!(session.is_running());

        sensor.emit(500).await;
        sensor.walk(10).await;
        wait_for_total(&manager, 10).await;
        assert_eq!(manager.store().today_steps().await.unwrap(), 10);

        session.stop().await;
        assert!(!sensor.is_registered());
        assert_eq!(sensor.unregister_count(), 1);
    }

    #[tokio::test]
    async fn test_dropping_session_unregisters() {
        let manager = manager();
        let sensor = Arc::new(MockStepSensor::new("step_counter"));

        let session = manager.start(sensor.clone(), || true).await.unwrap();
        drop(session);

        for _ in 0..200 {
            if !sensor.is_registered() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!sensor.is_registered());
    }

    #[tokio::test]
    async fn test_shared_session_sees_one_baseline() {
        let manager = manager();
        let ui = Arc::clone(&manager);
        let worker = Arc::clone(&manager);

        worker.on_reading(1000).await.unwrap();
        worker.on_reading(1004).await.unwrap();
        assert_eq!(ui.display_total().await, 4);

        ui.save().await.unwrap();
        assert_eq!(worker.snapshot().await.today_steps, 4);
        assert_eq!(worker.snapshot().await.baseline, Some(1004));
    }

    #[tokio::test]
    async fn test_load_reads_persisted_totals() {
        let manager = manager();
        assert!(manager.load().await.unwrap());

        manager.store().save_today_steps(42, 900).await.unwrap();
        assert!(!manager.load().await.unwrap());
        let snap = manager.snapshot().await;
        assert_eq!(snap.today_steps, 42);
        assert_eq!(snap.monthly_steps, 42);
        assert!(snap.baseline.is_none());
    }
}
