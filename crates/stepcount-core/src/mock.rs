//! Mock step sensor for testing.
//!
//! [`MockStepSensor`] implements [`StepSensor`] without any hardware. Tests
//! drive it by walking, emitting raw values or simulating a reboot.
//!
//! # Features
//!
//! - **Scripted readings**: `walk(n)` advances the cumulative counter
//! - **Reboots**: `reboot()` resets the counter to zero and emits it
//! - **Absence**: build with `available(false)` to simulate missing hardware
//! - **Call counting**: registrations and unregistrations are counted

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stream::SensorStream;
use crate::traits::StepSensor;

/// A scripted step-counter sensor.
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use stepcount_core::{MockStepSensor, StepSensor};
///
/// #[tokio::main]
/// async fn main() {
///     let sensor = MockStepSensor::builder().name("pedometer").counter(500).build();
///     let mut stream = sensor.register().await.unwrap();
///
///     sensor.walk(3).await;
///     assert_eq!(stream.next().await, Some(503));
/// }
/// ```
pub struct MockStepSensor {
    name: String,
    available: AtomicBool,
    counter: AtomicU64,
    buffer: usize,
    sender: Mutex<Option<mpsc::Sender<u64>>>,
    register_count: AtomicU32,
    unregister_count: AtomicU32,
}

impl std::fmt::Debug for MockStepSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStepSensor")
            .field("name", &self.name)
            .field("available", &self.available.load(Ordering::Relaxed))
            .field("counter", &self.counter.load(Ordering::Relaxed))
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl MockStepSensor {
    /// Create an available sensor with its counter at zero.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: AtomicBool::new(true),
            counter: AtomicU64::new(0),
            buffer: 64,
            sender: Mutex::new(None),
            register_count: AtomicU32::new(0),
            unregister_count: AtomicU32::new(0),
        }
    }

    /// Create a builder.
    pub fn builder() -> MockStepSensorBuilder {
        MockStepSensorBuilder::default()
    }

    /// Current raw counter value.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Mark the hardware present or absent.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Whether a handler is registered.
    pub fn is_registered(&self) -> bool {
        self.sender
            .lock()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    /// Number of successful `register` calls.
    pub fn register_count(&self) -> u32 {
        self.register_count.load(Ordering::Relaxed)
    }

    /// Number of `unregister` calls that released a handler.
    pub fn unregister_count(&self) -> u32 {
        self.unregister_count.load(Ordering::Relaxed)
    }

    /// Take `steps` steps and emit the new counter value.
    ///
    /// Returns whether a registered handler received it.
    pub async fn walk(&self, steps: u64) -> bool {
        let value = self.counter.fetch_add(steps, Ordering::Relaxed) + steps;
        self.deliver(value).await
    }

    /// Set the counter to `value` and emit it.
    pub async fn emit(&self, value: u64) -> bool {
        self.counter.store(value, Ordering::Relaxed);
        self.deliver(value).await
    }

    /// Simulate a device reboot: the counter restarts at zero.
    pub async fn reboot(&self) -> bool {
        self.emit(0).await
    }

    async fn deliver(&self, value: u64) -> bool {
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(value).await.is_ok(),
            None => {
                debug!("{}: reading {} dropped, not registered", self.name, value);
                false
            }
        }
    }
}

#[async_trait]
impl StepSensor for MockStepSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn register(&self) -> Result<SensorStream> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(Error::sensor_unavailable(&self.name));
        }
        let (tx, stream) = SensorStream::channel(self.buffer);
        if let Ok(mut sender) = self.sender.lock() {
            *sender = Some(tx);
        }
        self.register_count.fetch_add(1, Ordering::Relaxed);
        Ok(stream)
    }

    fn unregister(&self) {
        let released = self
            .sender
            .lock()
            .map(|mut s| s.take().is_some())
            .unwrap_or(false);
        if released {
            self.unregister_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Builder for [`MockStepSensor`].
#[derive(Debug, Clone)]
pub struct MockStepSensorBuilder {
    name: String,
    available: bool,
    counter: u64,
    buffer: usize,
}

impl Default for MockStepSensorBuilder {
    fn default() -> Self {
        Self {
            name: "mock_step_counter".to_string(),
            available: true,
            counter: 0,
            buffer: 64,
        }
    }
}

impl MockStepSensorBuilder {
    /// Set the sensor name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set whether the hardware is present.
    #[must_use]
    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Set the starting counter value.
    #[must_use]
    pub fn counter(mut self, counter: u64) -> Self {
        self.counter = counter;
        self
    }

    /// Set the reading channel capacity.
    #[must_use]
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Build the sensor.
    pub fn build(self) -> MockStepSensor {
        let sensor = MockStepSensor::new(&self.name);
        sensor.available.store(self.available, Ordering::Relaxed);
        sensor.counter.store(self.counter, Ordering::Relaxed);
        MockStepSensor {
            buffer: self.buffer,
            ..sensor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_walk_and_reboot() {
        let sensor = MockStepSensor::builder().counter(100).build();
        let mut stream = sensor.register().await.unwrap();

        assert!(sensor.walk(5).await);
        assert!(sensor.reboot().await);
        assert!(sensor.walk(2).await);

        assert_eq!(stream.next().await, Some(105));
        assert_eq!(stream.next().await, Some(0));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(sensor.register_count(), 1);
    }

    #[tokio::test]
    async fn test_unregister_ends_stream() {
        let sensor = MockStepSensor::new("step_counter");
        let mut stream = sensor.register().await.unwrap();

        sensor.unregister();
        sensor.unregister();
        assert_eq!(sensor.unregister_count(), 1);
        assert!(!sensor.walk(1).await);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_unavailable_sensor_refuses_registration() {
        let sensor = MockStepSensor::builder().available(false).build();
        assert!(!sensor.is_available().await);
        assert!(matches!(
            sensor.register().await,
            Err(Error::SensorUnavailable { .. })
        ));
        assert_eq!(sensor.register_count(), 0);
    }
}
