//! Background step tracker and HTTP REST API for daily step totals.
//!
//! This crate provides a service that:
//! - Feeds a cumulative step sensor into one shared [`StepCounterManager`]
//! - Persists reconciled daily totals in the local database
//! - Exposes a REST API for today's figure and history
//! - Streams step events to WebSocket clients
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/today` - Live snapshot for today
//! - `POST /api/save` - Flush unsaved steps now
//! - `POST /api/refresh` - Reload persisted totals
//! - `POST /api/reset` - Drop the in-memory baseline
//! - `GET /api/days/{date}` - Stored record for one day
//! - `DELETE /api/days/{date}` - Delete one day
//! - `DELETE /api/days` - Delete every day
//! - `GET /api/range?start=&end=` - Dense per-day series and total
//! - `GET /api/months/{year}/{month}` - Monthly total
//! - `GET /api/recent?limit=` - Most recent recorded days
//! - `WS /api/ws` - Real-time step events
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/stepcount/service.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! path = "~/.local/share/stepcount/steps.db"
//!
//! [tracker]
//! save_interval = 10
//!
//! [sensor]
//! kind = "simulated"
//! cadence_ms = 1000
//! max_steps_per_reading = 3
//! ```
//!
//! [`StepCounterManager`]: stepcount_core::StepCounterManager

pub mod api;
pub mod collector;
pub mod config;
pub mod sensor;
pub mod state;
pub mod ws;

pub use collector::Collector;
pub use config::{
    Config, ConfigError, SensorConfig, SensorKind, ServerConfig, StorageConfig, ValidationError,
};
pub use sensor::{SimulatedSensor, StdinSensor, build_sensor};
pub use state::{AppState, CollectorState};
