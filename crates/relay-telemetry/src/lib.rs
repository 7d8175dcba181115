//! # Relay Telemetry
//!
//! Logging and metrics for the probe relay.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events through a `tracing-subscriber` registry,
//!   JSON in containers and pretty-printed in development
//! - **Metrics**: Prometheus collectors served by the relay's `/metrics`
//!   endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! let _telemetry = relay_telemetry::init_telemetry(&TelemetryConfig::from_env())?;
//! relay_telemetry::SENSORS_CONNECTED.inc();
//! let body = relay_telemetry::encode_metrics();
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `probe-relay` | Service name in logs |
//! | `RELAY_INSTANCE_ID` | `$HOSTNAME` | Instance label |
//! | `RELAY_LOG_LEVEL` | `info` | Log level filter |
//! | `RELAY_JSON_LOGS` | container-dependent | JSON log output |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, ADMISSIONS, BUS_FORWARDS,
    FRAMES_RECEIVED, SENSORS_CONNECTED, TASK_RESULTS, TASK_RESULT_DURATION, TELEMETRY_REPORTS,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register the relay collectors and install the global subscriber.
///
/// Hold the returned guard until the process exits.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_logging(config)?;
    tracing::debug!(
        service = %config.service_name,
        instance = %config.instance_id,
        "Telemetry initialized"
    );
    Ok(TelemetryGuard { _metrics: metrics })
}

/// Keeps the metrics registration alive; logs once when the relay exits.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Relay telemetry stopped");
    }
}
