//! Sensor subscription guard for automatic unregistration on drop.
//!
//! A [`SensorSubscription`] is the scoped acquisition of a sensor: holding it
//! keeps readings flowing, dropping it (on any exit path, panics included)
//! unregisters the handler.

use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use crate::traits::StepSensor;

/// A guard that unregisters from the sensor when dropped.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stepcount_core::{MockStepSensor, SensorSubscription, StepSensor};
///
/// #[tokio::main]
/// async fn main() {
///     let sensor = Arc::new(MockStepSensor::new("step_counter"));
///     let _stream = sensor.register().await.unwrap();
///     {
///         let _guard = SensorSubscription::new(sensor.clone());
///     }
///     assert_eq!(sensor.unregister_count(), 1);
/// }
/// ```
pub struct SensorSubscription {
    sensor: Option<Arc<dyn StepSensor>>,
}

impl std::fmt::Debug for SensorSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSubscription")
            .field("sensor", &self.sensor.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl SensorSubscription {
    /// Guard an already registered sensor.
    pub fn new(sensor: Arc<dyn StepSensor>) -> Self {
        Self {
            sensor: Some(sensor),
        }
    }

    /// Release the sensor without unregistering it.
    ///
    /// The caller becomes responsible for calling `unregister`.
    pub fn into_inner(mut self) -> Option<Arc<dyn StepSensor>> {
        self.sensor.take()
    }

    /// Unregister now instead of at drop.
    pub fn release(mut self) {
        self.unregister();
    }

    fn unregister(&mut self) {
        if let Some(sensor) = self.sensor.take() {
            debug!("Unregistering sensor {}", sensor.name());
            sensor.unregister();
        }
    }
}

impl Deref for SensorSubscription {
    type Target = Option<Arc<dyn StepSensor>>;

    fn deref(&self) -> &Self::Target {
        &self.sensor
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.unregister();
    }
}
