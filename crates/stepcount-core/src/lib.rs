//! Step-counter baseline tracking and daily reconciliation.
//!
//! This crate turns a raw, boot-resettable cumulative step counter into a
//! durable "steps today" figure.
//!
//! # Components
//!
//! - [`DailyStepStore`]: date-keyed ledger that recovers steps taken while
//!   nothing was tracking and never lets a day's total go down
//! - [`SensorBaselineTracker`]: baseline/live-delta state machine with reboot
//!   detection and a fixed save cadence
//! - [`StepCounterManager`]: the single shared session, with event broadcast
//!   and a sensor pump
//! - [`StepPersistence`] / [`StepSensor`]: trait seams for storage and
//!   hardware, with SQLite, in-memory and mock implementations
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stepcount_core::{
//!     DailyStepStore, FixedClock, SqlitePersistence, StepCounterManager, TrackerConfig,
//! };
//! use stepcount_types::StepDate;
//!
//! #[tokio::main]
//! async fn main() -> stepcount_core::Result<()> {
//!     let today = StepDate::parse("2024-01-02")?;
//!     let persistence = Arc::new(SqlitePersistence::in_memory()?);
//!     let store = Arc::new(DailyStepStore::new(persistence, Arc::new(FixedClock::new(today))));
//!     let manager = StepCounterManager::new(store.clone(), TrackerConfig::default())?;
//!
//!     for raw in [500, 509, 510] {
//!         manager.on_reading(raw).await?;
//!     }
//!     assert_eq!(store.get_total_in_range(today, today).await?, 10);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod daily;
pub mod error;
pub mod events;
pub mod guard;
pub mod manager;
pub mod mock;
pub mod persistence;
pub mod stream;
pub mod tracker;
pub mod traits;

pub use clock::{Clock, FixedClock, SystemClock};
pub use daily::{DailyStepStore, ReconcileKind, Reconciliation, SaveOutcome};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, StepEvent, event_channel};
pub use guard::SensorSubscription;
pub use manager::{StepCounterManager, TrackingSession};
pub use mock::{MockStepSensor, MockStepSensorBuilder};
pub use persistence::{MemoryPersistence, SqlitePersistence};
pub use stream::SensorStream;
pub use tracker::{
    DEFAULT_SAVE_INTERVAL, ReadingOutcome, SensorBaselineTracker, StepSnapshot, TrackerConfig,
};
pub use traits::{StepPersistence, StepSensor};

// Re-export the value types so callers need only this crate.
pub use stepcount_types::{DailySteps, DateRange, MonthKey, StepDate};
