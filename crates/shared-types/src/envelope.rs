//! # Sensor Wire Envelopes
//!
//! JSON frames exchanged with sensors and the scheduler.
//!
//! ## Framing
//!
//! Every inbound sensor frame is a JSON object carrying the
//! `message_general_type` discriminator. The router decodes only the
//! discriminator first ([`GeneralMessage`]); the kind-specific envelope is
//! decoded from the same bytes afterwards:
//!
//! | Code | Kind | Envelope |
//! |------|------|----------|
//! | 1 | Task result | [`TaskResultEnvelope`] |
//! | 2 | Telemetry | [`HostTelemetry`] |

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::entities::{ConnectionId, SensorId, TaskId};
use crate::errors::DecodeError;

/// Discriminator of an inbound sensor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageGeneralType {
    /// The frame carries the outcome of a task.
    TaskResult,
    /// The frame carries a periodic host-health report.
    Telemetry,
}

impl MessageGeneralType {
    /// Wire code of the discriminator.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::TaskResult => 1,
            Self::Telemetry => 2,
        }
    }

    /// Map a wire code to a known kind.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::TaskResult),
            2 => Some(Self::Telemetry),
            _ => None,
        }
    }

    /// Label used for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskResult => "task_result",
            Self::Telemetry => "telemetry",
        }
    }
}

/// Discriminator-only view of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GeneralMessage {
    /// Raw discriminator code.
    pub message_general_type: i64,
}

impl GeneralMessage {
    /// Decode only the discriminator of a frame.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(frame).map_err(|e| DecodeError::Envelope(e.to_string()))
    }

    /// The known kind, if any.
    #[must_use]
    pub fn kind(&self) -> Option<MessageGeneralType> {
        MessageGeneralType::from_code(self.message_general_type)
    }
}

/// CPU section of a telemetry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuTelemetry {
    pub cores: i64,
    pub usage: f64,
    pub model_name: String,
}

/// Memory section of a telemetry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTelemetry {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub used_percent: f64,
}

/// Per-interface network counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkTelemetry {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// Host-health snapshot reported by a sensor.
///
/// Sent standalone as a telemetry frame and embedded in every task result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostTelemetry {
    /// Concurrent task count of the sensor runtime.
    pub goroutines: i64,
    pub cpu: CpuTelemetry,
    pub memory: MemoryTelemetry,
    pub network: Vec<NetworkTelemetry>,
}

impl HostTelemetry {
    /// Decode a telemetry frame.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(frame).map_err(|e| DecodeError::Envelope(e.to_string()))
    }
}

/// Generic result envelope of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultEnvelope {
    pub task_id: TaskId,
    pub task_name: String,
    /// Kind-specific payload.
    ///
    /// Either embedded JSON or a base64 string of JSON bytes, depending on the
    /// sensor build. Use [`TaskResultEnvelope::result_bytes`].
    #[serde(default)]
    pub result: serde_json::Value,
    /// Sensor-side failure. Empty when the probe succeeded.
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub host_telemetry: Option<HostTelemetry>,
}

impl TaskResultEnvelope {
    /// Decode a task result frame.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(frame).map_err(|e| DecodeError::Envelope(e.to_string()))
    }

    /// Whether the sensor reported a failure for this task.
    #[must_use]
    pub fn has_sensor_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Raw JSON bytes of the kind-specific result.
    pub fn result_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        match &self.result {
            serde_json::Value::String(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| DecodeError::ResultEncoding(e.to_string())),
            serde_json::Value::Null => Err(DecodeError::MissingResult),
            other => {
                serde_json::to_vec(other).map_err(|e| DecodeError::ResultEncoding(e.to_string()))
            }
        }
    }
}

/// A task submission published by the scheduler.
///
/// Only the routing fields are decoded. The relay forwards the original bytes,
/// never a re-encoding of this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub sensor_id: SensorId,
}

impl ScheduledTask {
    /// Decode the routing fields of a bus payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(payload).map_err(|e| DecodeError::Envelope(e.to_string()))
    }
}

/// Body of the liveness record published for a connected sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSensor {
    pub connection_id: ConnectionId,
    pub sensor_id: SensorId,
    pub sensor_version: String,
}
