//! Relay configuration with validation.
//!
//! Loaded from TOML, then overridden from the environment, then validated.
//! Every section has defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use shared_types::{Sensor, SensorId};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Default maximum inbound frame size (1MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Main relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Upper bound on graceful shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Listener configuration
    pub server: ServerConfig,
    /// Liveness record configuration
    pub liveness: LivenessConfig,
    /// Task distribution bus configuration
    pub bus: BusConfig,
    /// Sensors preloaded into the in-memory directory
    pub sensors: Vec<Sensor>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
            liveness: LivenessConfig::default(),
            bus: BusConfig::default(),
            sensors: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `RELAY_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognized: `RELAY_HOST`, `RELAY_PORT`, `RELAY_TASK_CHANNEL`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("RELAY_HOST") {
            self.server.host = host.parse().map_err(|_| ConfigError::InvalidOverride {
                var: "RELAY_HOST",
                value: host.clone(),
            })?;
        }
        if let Some(port) = lookup("RELAY_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidOverride {
                var: "RELAY_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(channel) = lookup("RELAY_TASK_CHANNEL") {
            self.bus.task_channel = channel;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "shutdown_timeout cannot be 0".into(),
            ));
        }

        if self.liveness.monitor_period.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "liveness monitor_period cannot be 0".into(),
            ));
        }

        if self.bus.task_channel.trim().is_empty() {
            return Err(ConfigError::Invalid("bus task_channel cannot be empty".into()));
        }

        if self.bus.capacity == 0 {
            return Err(ConfigError::InvalidLimit("bus capacity cannot be 0".into()));
        }

        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if !seen.insert(sensor.id) {
                return Err(ConfigError::DuplicateSensor(sensor.id));
            }
        }

        Ok(())
    }

    /// Get listener bind address
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
    /// Frames above this size are dropped
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Liveness record configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Key prefix; the sensor id is appended
    pub key_prefix: String,
    /// Interval at which sensors report telemetry
    #[serde(with = "humantime_serde")]
    pub monitor_period: Duration,
    /// Grace added to the monitor period
    #[serde(with = "humantime_serde")]
    pub threshold: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            key_prefix: "active_sensors:".to_string(),
            monitor_period: Duration::from_secs(60),
            threshold: Duration::from_secs(30),
        }
    }
}

impl LivenessConfig {
    /// Liveness key of a sensor.
    pub fn key_for(&self, sensor_id: SensorId) -> String {
        format!("{}{}", self.key_prefix, sensor_id)
    }

    /// Lifetime of a liveness record.
    pub fn ttl(&self) -> Duration {
        self.monitor_period + self.threshold
    }
}

/// Task distribution bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Channel carrying newly scheduled tasks
    pub task_channel: String,
    /// Per-subscriber buffer of the in-memory bus
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            task_channel: shared_bus::DEFAULT_TASK_CHANNEL.to_string(),
            capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("config io: {0}")]
    Io(String),
    /// Config file is not valid TOML for this schema
    #[error("config parse: {0}")]
    Parse(String),
    /// An environment override does not parse
    #[error("invalid value {value:?} for {var}")]
    InvalidOverride { var: &'static str, value: String },
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Same sensor id seeded twice
    #[error("duplicate sensor {0}")]
    DuplicateSensor(SensorId),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn scaled_secs(count: &str, unit_secs: u64) -> Option<Duration> {
        count
            .trim()
            .parse::<u64>()
            .ok()?
            .checked_mul(unit_secs)
            .map(Duration::from_secs)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            scaled_secs(mins, 60).ok_or("invalid minutes")
        } else if let Some(hours) = s.strip_suffix('h') {
            scaled_secs(hours, 3600).ok_or("invalid hours")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
