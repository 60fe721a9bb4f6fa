//! Application state shared across handlers.
//!
//! The REST handlers, the WebSocket feed and the collector all hold the same
//! `Arc<AppState>` and therefore the same [`StepCounterManager`]: there is
//! exactly one baseline per process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use time::OffsetDateTime;
use tokio::sync::Mutex;

use stepcount_core::{
    DailyStepStore, SqlitePersistence, StepCounterManager, SystemClock, TrackingSession,
};

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The shared tracking session.
    pub manager: Arc<StepCounterManager>,
    /// Configuration.
    pub config: Config,
    /// Collector control state.
    pub collector: CollectorState,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("manager", &self.manager)
            .field("collector_running", &self.collector.is_running())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state around an existing manager.
    pub fn new(manager: Arc<StepCounterManager>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            manager,
            config,
            collector: CollectorState::new(),
        })
    }

    /// Open the configured database and build the shared manager.
    pub fn open(config: Config) -> stepcount_core::Result<Arc<Self>> {
        let persistence = Arc::new(SqlitePersistence::open(&config.storage.path)?);
        let store = Arc::new(DailyStepStore::new(persistence, Arc::new(SystemClock)));
        let manager = StepCounterManager::new(store, config.tracker.clone())?;
        Ok(Self::new(manager, config))
    }

    /// The shared ledger.
    pub fn store(&self) -> &Arc<DailyStepStore> {
        self.manager.store()
    }
}

/// State for tracking and controlling the collector.
pub struct CollectorState {
    running: AtomicBool,
    /// Unix timestamp of the last start, 0 when never started.
    started_at: AtomicI64,
    /// The active sensor session.
    pub(crate) session: Mutex<Option<TrackingSession>>,
}

impl CollectorState {
    /// Create a new collector state.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicI64::new(0),
            session: Mutex::new(None),
        }
    }

    /// Check if the collector is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the collector as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the collector start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        match self.started_at.load(Ordering::SeqCst) {
            0 => None,
            ts => OffsetDateTime::from_unix_timestamp(ts).ok(),
        }
    }
}

impl Default for CollectorState {
    fn default() -> Self {
        Self::new()
    }
}
