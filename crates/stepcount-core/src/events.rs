//! Step event system for live updates and persistence notifications.
//!
//! Every [`StepCounterManager`](crate::StepCounterManager) owns an
//! [`EventDispatcher`]. Any number of observers may subscribe; slow observers
//! lag and drop old events instead of blocking the sensor path.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use stepcount_types::StepDate;

/// Events emitted while tracking steps.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum StepEvent {
    /// The live total changed.
    Updated {
        /// Persisted plus live steps for today.
        display_total: u64,
        /// Steps counted since the last rebase.
        live_steps: u64,
        /// Latest raw sensor value.
        sensor_snapshot: u64,
    },
    /// A day's total was written.
    Saved { date: StepDate, total: u64 },
    /// Tracking moved to a new calendar day.
    NewDay { date: StepDate },
    /// The sensor counter went backwards.
    RebootDetected { sensor_value: u64 },
    /// A persistence operation failed; tracker state was kept.
    PersistenceFailed { operation: String, error: String },
    /// The step-counter sensor is missing.
    SensorUnavailable { sensor: String },
}

/// Sender for step events.
pub type EventSender = broadcast::Sender<StepEvent>;

/// Receiver for step events.
pub type EventReceiver = broadcast::Receiver<StepEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: StepEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
