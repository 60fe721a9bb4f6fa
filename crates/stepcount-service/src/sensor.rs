//! Step sensors available to the service.
//!
//! A desktop host has no pedometer, so the service either simulates one
//! ([`SimulatedSensor`]) or accepts raw values from another process on
//! standard input ([`StdinSensor`]).

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stepcount_core::{SensorStream, StepSensor};

use crate::config::{SensorConfig, SensorKind};

/// Build the sensor described by the configuration.
pub fn build_sensor(config: &SensorConfig) -> Arc<dyn StepSensor> {
    match config.kind {
        SensorKind::Simulated => Arc::new(SimulatedSensor::new(config)),
        SensorKind::Stdin => Arc::new(StdinSensor::new(&config.name)),
    }
}

/// Holds the cancellation token of the running producer task.
#[derive(Debug, Default)]
struct Producer {
    token: Mutex<Option<CancellationToken>>,
}

impl Producer {
    fn start(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.token.lock()
            && let Some(previous) = slot.replace(token.clone())
        {
            previous.cancel();
        }
        token
    }

    fn stop(&self) -> bool {
        let token = self.token.lock().ok().and_then(|mut slot| slot.take());
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn is_running(&self) -> bool {
        self.token
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

/// A random walker.
///
/// Every `cadence_ms` it takes between 0 and `max_steps_per_reading` steps and
/// emits the cumulative counter. With `reboot_after` set the counter drops to
/// zero periodically, like a device reboot.
#[derive(Debug)]
pub struct SimulatedSensor {
    name: String,
    cadence: Duration,
    max_steps: u64,
    reboot_after: Option<u64>,
    counter: Arc<AtomicU64>,
    producer: Producer,
}

impl SimulatedSensor {
    /// Create a walker from configuration.
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            name: config.name.clone(),
            cadence: Duration::from_millis(config.cadence_ms.max(1)),
            max_steps: config.max_steps_per_reading.max(1),
            reboot_after: config.reboot_after,
            counter: Arc::new(AtomicU64::new(config.start_value)),
            producer: Producer::default(),
        }
    }

    /// Current raw counter value.
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StepSensor for SimulatedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn register(&self) -> stepcount_core::Result<SensorStream> {
        let (tx, stream) = SensorStream::channel(16);
        let token = self.producer.start();
        let counter = Arc::clone(&self.counter);
        let cadence = self.cadence;
        let max_steps = self.max_steps;
        let reboot_after = self.reboot_after;
        let name = self.name.clone();

        tokio::spawn(async move {
            let mut ticker = interval(cadence);
            let mut readings = 0u64;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        readings += 1;
                        let value = if reboot_after.is_some_and(|n| readings % n == 0) {
                            debug!("{}: simulating reboot", name);
                            counter.store(0, Ordering::Relaxed);
                            0
                        } else {
                            let steps = rand::rng().random_range(0..=max_steps);
                            counter.fetch_add(steps, Ordering::Relaxed) + steps
                        };
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("{}: walker stopped", name);
        });

        Ok(stream)
    }

    fn unregister(&self) {
        self.producer.stop();
    }
}

/// Reads one raw cumulative value per line from standard input.
#[derive(Debug)]
pub struct StdinSensor {
    name: String,
    producer: Producer,
}

impl StdinSensor {
    /// Create a stdin-backed sensor.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            producer: Producer::default(),
        }
    }

    /// Whether a reader task is active.
    pub fn is_registered(&self) -> bool {
        self.producer.is_running()
    }
}

/// Parse one input line. Blank lines and `#` comments are skipped.
pub fn parse_reading(line: &str) -> Option<Result<u64, std::num::ParseIntError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.parse())
}

#[async_trait]
impl StepSensor for StdinSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn register(&self) -> stepcount_core::Result<SensorStream> {
        let (tx, stream) = SensorStream::channel(16);
        let token = self.producer.start();
        let name = self.name.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = tokio::select! {
                    _ = token.cancelled() => break,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) => match parse_reading(&line) {
                        Some(Ok(value)) => {
                            if tx.send(value).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => warn!("{}: ignoring '{}': {}", name, line.trim(), e),
                        None => {}
                    },
                    Ok(None) => {
                        debug!("{}: end of input", name);
                        break;
                    }
                    Err(e) => {
                        warn!("{}: failed to read stdin: {}", name, e);
                        break;
                    }
                }
            }
        });

        Ok(stream)
    }

    fn unregister(&self) {
        self.producer.stop();
    }
}
