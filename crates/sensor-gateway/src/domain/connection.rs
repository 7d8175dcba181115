//! A live, authenticated sensor connection.

use shared_types::{ActiveSensor, ConnectionId, SensorId};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::error::TransportError;
use crate::ports::FrameSink;

/// Handle to the write half of an admitted sensor's transport.
///
/// Cheap to clone; every clone writes to the same transport. The read half is
/// owned by the read loop that created the connection and never appears here.
#[derive(Clone)]
pub struct SensorConnection {
    /// Fresh per accepted transport
    pub connection_id: ConnectionId,
    /// Authenticated identity; payload ids are never trusted over this
    pub sensor_id: SensorId,
    /// Reported by the sensor at admission, if at all
    pub sensor_version: Option<String>,
    sink: Arc<dyn FrameSink>,
}

impl SensorConnection {
    /// Wrap a transport for an authenticated sensor.
    pub fn new(
        sensor_id: SensorId,
        sensor_version: Option<String>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            sensor_id,
            sensor_version,
            sink,
        }
    }

    /// Write one text frame.
    pub async fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.sink.send_text(text).await
    }

    /// Close the transport.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.sink.close().await
    }

    /// Whether both handles refer to the same accepted transport.
    pub fn same_transport(&self, other: &SensorConnection) -> bool {
        self.connection_id == other.connection_id
    }

    /// Body of the liveness record for this connection.
    pub fn liveness_record(&self) -> ActiveSensor {
        ActiveSensor {
            connection_id: self.connection_id,
            sensor_id: self.sensor_id,
            sensor_version: self.sensor_version.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Debug for SensorConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorConnection")
            .field("connection_id", &self.connection_id)
            .field("sensor_id", &self.sensor_id)
            .field("sensor_version", &self.sensor_version)
            .finish_non_exhaustive()
    }
}
