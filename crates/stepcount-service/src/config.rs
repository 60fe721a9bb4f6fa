//! Service configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use stepcount_core::TrackerConfig;

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Tracker settings.
    pub tracker: TrackerConfig,
    /// Step sensor settings.
    pub sensor: SensorConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// # Example
    ///
    /// ```
    /// use stepcount_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(validate_tracker(&self.tracker));
        errors.extend(self.sensor.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let Some((host, port)) = self.bind.rsplit_once(':') else {
            errors.push(ValidationError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            ));
            return errors;
        };

        if host.is_empty() {
            errors.push(ValidationError::new("server.bind", "host cannot be empty"));
        }
        match port.parse::<u16>() {
            Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::new(
                "server.bind",
                format!("invalid port '{}': must be a number 1-65535", port),
            )),
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: stepcount_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }
        errors
    }
}

fn validate_tracker(tracker: &TrackerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if tracker.save_interval == 0 {
        errors.push(ValidationError::new(
            "tracker.save_interval",
            "save interval must be at least 1 step",
        ));
    }
    if tracker.event_capacity == 0 {
        errors.push(ValidationError::new(
            "tracker.event_capacity",
            "event capacity must be at least 1",
        ));
    }
    errors
}

/// Where raw step-counter values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// A random walker, for demos and development.
    #[default]
    Simulated,
    /// One raw cumulative value per line on standard input.
    Stdin,
}

/// Minimum simulated cadence in milliseconds.
pub const MIN_CADENCE_MS: u64 = 10;
/// Maximum simulated cadence in milliseconds (1 hour).
pub const MAX_CADENCE_MS: u64 = 3_600_000;

/// Step sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Sensor source.
    pub kind: SensorKind,
    /// Sensor name used in logs and events.
    pub name: String,
    /// Capability gate: when false the sensor is never touched.
    pub permitted: bool,
    /// Simulated: milliseconds between readings.
    pub cadence_ms: u64,
    /// Simulated: upper bound of steps taken per reading.
    pub max_steps_per_reading: u64,
    /// Simulated: starting counter value.
    pub start_value: u64,
    /// Simulated: reset the counter to zero after this many readings.
    pub reboot_after: Option<u64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Simulated,
            name: "step_counter".to_string(),
            permitted: true,
            cadence_ms: 1000,
            max_steps_per_reading: 3,
            start_value: 0,
            reboot_after: None,
        }
    }
}

impl SensorConfig {
    /// Validate sensor configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("sensor.name", "name cannot be empty"));
        }
        if self.kind == SensorKind::Simulated {
            if self.cadence_ms < MIN_CADENCE_MS {
                errors.push(ValidationError::new(
                    "sensor.cadence_ms",
                    format!(
                        "cadence {}ms is too short (minimum {}ms)",
                        self.cadence_ms, MIN_CADENCE_MS
                    ),
                ));
            } else if self.cadence_ms > MAX_CADENCE_MS {
                errors.push(ValidationError::new(
                    "sensor.cadence_ms",
                    format!(
                        "cadence {}ms is too long (maximum {}ms / 1 hour)",
                        self.cadence_ms, MAX_CADENCE_MS
                    ),
                ));
            }
            if self.max_steps_per_reading == 0 {
                errors.push(ValidationError::new(
                    "sensor.max_steps_per_reading",
                    "must be at least 1",
                ));
            }
            if self.reboot_after == Some(0) {
                errors.push(ValidationError::new(
                    "sensor.reboot_after",
                    "must be at least 1 reading when set",
                ));
            }
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `sensor.cadence_ms`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stepcount")
        .join("service.toml")
}
