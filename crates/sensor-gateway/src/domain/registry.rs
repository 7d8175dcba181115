//! Connection Registry.
//!
//! In-process map from sensor id to its live connection. One mutex guards
//! every operation; nothing awaits while it is held.
//!
//! ## Semantics
//!
//! - `put` replaces any previous entry for the sensor. The replaced transport
//!   is not closed here; its own read loop will notice and clean up.
//! - `remove` is unconditional and a no-op for unknown sensors.
//! - The registry starts empty and does not survive a restart.

use parking_lot::Mutex;
use shared_types::SensorId;
use std::collections::HashMap;

use crate::domain::connection::SensorConnection;

/// Live connections owned by this relay instance.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<SensorId, SensorConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the connection of a sensor.
    ///
    /// Returns the replaced connection, if any.
    pub fn put(&self, sensor_id: SensorId, conn: SensorConnection) -> Option<SensorConnection> {
        self.connections.lock().insert(sensor_id, conn)
    }

    /// Clone of the current connection handle of a sensor.
    pub fn get(&self, sensor_id: &SensorId) -> Option<SensorConnection> {
        self.connections.lock().get(sensor_id).cloned()
    }

    /// Drop the entry of a sensor.
    pub fn remove(&self, sensor_id: &SensorId) -> Option<SensorConnection> {
        self.connections.lock().remove(sensor_id)
    }

    /// Number of registered sensors.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Ids of all registered sensors.
    pub fn sensor_ids(&self) -> Vec<SensorId> {
        self.connections.lock().keys().copied().collect()
    }
}
