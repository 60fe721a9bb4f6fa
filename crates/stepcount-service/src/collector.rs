//! Background step collector.
//!
//! Wires the configured sensor into the shared manager and logs the event
//! stream. Collection runs until [`Collector::stop`] or process exit.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use stepcount_core::{StepEvent, StepSensor};

use crate::sensor::build_sensor;
use crate::state::AppState;

/// Background collector that feeds sensor readings into the manager.
pub struct Collector {
    state: Arc<AppState>,
}

impl Collector {
    /// Create a new collector.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start collecting from the configured sensor.
    pub async fn start(&self) -> stepcount_core::Result<()> {
        let sensor = build_sensor(&self.state.config.sensor);
        self.start_with(sensor).await
    }

    /// Start collecting from a specific sensor.
    ///
    /// Loads persisted totals first so the API shows today's figure before
    /// the first reading arrives. Returns immediately; collection happens in
    /// the background.
    pub async fn start_with(&self, sensor: Arc<dyn StepSensor>) -> stepcount_core::Result<()> {
        let mut slot = self.state.collector.session.lock().await;
        if slot.is_some() {
            debug!("Collector already running");
            return Ok(());
        }

        let manager = &self.state.manager;
        if manager.load().await? {
            info!("No steps recorded yet today");
        }

        let permitted = self.state.config.sensor.permitted;
        let session = manager.start(sensor, move || permitted).await?;
        info!("Collecting steps from {}", session.sensor());

        tokio::spawn(log_events(
            Arc::clone(&self.state),
            session.cancellation_token(),
        ));

        *slot = Some(session);
        self.state.collector.set_running(true);
        Ok(())
    }

    /// Stop collecting. Live steps are flushed first.
    pub async fn stop(&self) {
        let session = self.state.collector.session.lock().await.take();
        let Some(session) = session else {
            return;
        };
        session.stop().await;
        if let Err(e) = self.state.manager.save().await {
            warn!("Failed to flush steps on shutdown: {}", e);
        }
        self.state.collector.set_running(false);
    }
}

async fn log_events(state: Arc<AppState>, token: tokio_util::sync::CancellationToken) {
    let mut rx = state.manager.subscribe();
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = rx.recv() => event,
        };
        match event {
            Ok(StepEvent::Updated { display_total, .. }) => {
                debug!("Steps today: {}", display_total)
            }
            Ok(StepEvent::Saved { date, total }) => debug!("Saved {} steps for {}", total, date),
            Ok(StepEvent::NewDay { date }) => info!("New day started: {}", date),
            Ok(StepEvent::RebootDetected { sensor_value }) => {
                info!("Device reboot detected (sensor at {})", sensor_value)
            }
            Ok(StepEvent::PersistenceFailed { operation, error }) => {
                warn!("Persistence failure in {}: {}", operation, error)
            }
            Ok(StepEvent::SensorUnavailable { sensor }) => warn!("Sensor {} unavailable", sensor),
            Ok(other) => debug!("Event: {:?}", other),
            Err(RecvError::Lagged(n)) => debug!("Event log lagged by {} events", n),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use stepcount_core::{
        DailyStepStore, FixedClock, MemoryPersistence, MockStepSensor, StepCounterManager,
        StepDate,
    };

    use crate::config::Config;

    fn state(config: Config) -> Arc<AppState> {
        let clock = Arc::new(FixedClock::new(StepDate::parse("2024-01-02").unwrap()));
        let store = Arc::new(DailyStepStore::new(Arc::new(MemoryPersistence::new()), clock));
        let manager = StepCounterManager::new(store, config.tracker.clone()).unwrap();
        AppState::new(manager, config)
    }

    #[tokio::test]
    async fn test_collector_feeds_manager_and_flushes_on_stop() {
        let state = state(Config::default());
        let collector = Collector::new(Arc::clone(&state));
        let sensor = Arc::new(MockStepSensor::builder().counter(700).build());

        collector.start_with(sensor.clone()).await.unwrap();
        assert!(state.collector.is_running());

        sensor.emit(700).await;
        sensor.walk(4).await;
        for _ in 0..200 {
            if state.manager.display_total().await == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(state.manager.display_total().await, 4);
        assert_eq!(state.store().today_steps().await.unwrap(), 0);

        collector.stop().await;
        assert!(!state.collector.is_running());
        assert!(!sensor.is_registered());
        assert_eq!(state.store().today_steps().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_collector_respects_permission_gate() {
        let mut config = Config::default();
        config.sensor.permitted = false;
        let state = state(config);
        let collector = Collector::new(Arc::clone(&state));
        let sensor = Arc::new(MockStepSensor::new("step_counter"));

        let result = collector.start_with(sensor.clone()).await;
        assert!(matches!(result, Err(stepcount_core::Error::PermissionDenied)));
        assert_eq!(sensor.register_count(), 0);
        assert!(!state.collector.is_running());
    }

    #[tokio::test]
    async fn test_second_start_is_ignored() {
        let state = state(Config::default());
        let collector = Collector::new(Arc::clone(&state));
        let sensor = Arc::new(MockStepSensor::new("step_counter"));

        collector.start_with(sensor.clone()).await.unwrap();
        collector.start_with(sensor.clone()).await.unwrap();
        assert_eq!(sensor.register_count(), 1);
        collector.stop().await;
    }

    #[tokio::test]
    async fn test_simulated_sensor_end_to_end() {
        let mut config = Config::default();
        config.sensor.cadence_ms = 10;
        config.sensor.max_steps_per_reading = 5;
        let state = state(config);
        let collector = Collector::new(Arc::clone(&state));

        collector.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        collector.stop().await;

        let snap = state.manager.snapshot().await;
        assert!(snap.baseline.is_some());
        assert_eq!(snap.live_steps, 0);
        assert_eq!(state.store().today_steps().await.unwrap(), snap.today_steps);
    }
}
