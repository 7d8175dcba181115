//! Prometheus collectors for the relay, named `relay_<area>_<metric>_<unit>`.
//!
//! | Collector | Labels |
//! |-----------|--------|
//! | `relay_sensors_connected` | |
//! | `relay_admissions_total` | `outcome` |
//! | `relay_frames_received_total` | `kind` |
//! | `relay_bus_forwards_total` | `outcome` |
//! | `relay_task_results_total` | `task_name`, `outcome` |
//! | `relay_task_result_duration_seconds` | |
//! | `relay_telemetry_reports_total` | `outcome` |

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CONNECTION METRICS
    // =========================================================================

    /// Sensors currently holding a registered connection on this instance
    pub static ref SENSORS_CONNECTED: IntGauge = IntGauge::new(
        "relay_sensors_connected",
        "Number of sensors with a live connection on this instance"
    ).expect("metric creation failed");

    /// Admission attempts by outcome
    pub static ref ADMISSIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_admissions_total", "Sensor admission attempts"),
        &["outcome"]  // outcome: admitted/missing_token/unauthorized/upgrade_failed
    ).expect("metric creation failed");

    /// Inbound frames by kind
    pub static ref FRAMES_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_frames_received_total", "Inbound sensor frames"),
        &["kind"]  // kind: task_result/telemetry/unknown/malformed/oversized
    ).expect("metric creation failed");

    // =========================================================================
    // BUS METRICS
    // =========================================================================

    /// Scheduled tasks seen on the bus by routing outcome
    pub static ref BUS_FORWARDS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_bus_forwards_total", "Scheduled tasks handled by the bus listener"),
        &["outcome"]  // outcome: forwarded/not_owned/malformed/failed/lagged
    ).expect("metric creation failed");

    // =========================================================================
    // RESULT METRICS
    // =========================================================================

    /// Task results by task name and outcome
    pub static ref TASK_RESULTS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_task_results_total", "Task results processed"),
        &["task_name", "outcome"]  // outcome: done/sensor_error/failed/malformed
    ).expect("metric creation failed");

    /// Time spent persisting one task result
    pub static ref TASK_RESULT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "relay_task_result_duration_seconds",
            "Time spent handling a task result frame"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).unwrap_or_default())
    ).expect("metric creation failed");

    /// Telemetry reports by outcome
    pub static ref TELEMETRY_REPORTS: IntCounterVec = IntCounterVec::new(
        Opts::new("relay_telemetry_reports_total", "Host telemetry reports processed"),
        &["outcome"]  // outcome: stored/failed
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors that are already registered are
/// skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Connections
        Box::new(SENSORS_CONNECTED.clone()),
        Box::new(ADMISSIONS.clone()),
        Box::new(FRAMES_RECEIVED.clone()),
        // Bus
        Box::new(BUS_FORWARDS.clone()),
        // Results
        Box::new(TASK_RESULTS.clone()),
        Box::new(TASK_RESULT_DURATION.clone()),
        Box::new(TELEMETRY_REPORTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Observes the elapsed seconds into a histogram when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    started: Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            started: Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram
            .observe(self.started.elapsed().as_secs_f64());
    }
}

/// `let _timer = time_histogram!(TASK_RESULT_DURATION);`
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::HistogramTimer::new(&$histogram)
    };
}
