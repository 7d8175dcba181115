//! Liveness records for connected sensors.
//!
//! Each telemetry report refreshes a TTL'd key announcing that the sensor is
//! connected to this relay. Sensors that stop reporting expire on their own;
//! a clean disconnect deletes the key right away.

use shared_types::SensorId;
use std::sync::Arc;
use tracing::debug;

use crate::domain::config::LivenessConfig;
use crate::domain::connection::SensorConnection;
use crate::domain::error::StoreError;
use crate::ports::LivenessStore;

/// Writes and clears liveness keys.
pub struct LivenessPublisher {
    store: Arc<dyn LivenessStore>,
    config: LivenessConfig,
}

impl LivenessPublisher {
    pub fn new(store: Arc<dyn LivenessStore>, config: LivenessConfig) -> Self {
        Self { store, config }
    }

    /// Write or refresh the record of a connection.
    pub async fn publish(&self, conn: &SensorConnection) -> Result<(), StoreError> {
        let key = self.config.key_for(conn.sensor_id);
        let value = serde_json::to_vec(&conn.liveness_record())?;
        let ttl = self.config.ttl();
        self.store.set(&key, value, ttl).await?;
        debug!(sensor_id = %conn.sensor_id, key = %key, ttl_secs = ttl.as_secs(), "Liveness refreshed");
        Ok(())
    }

    /// Remove the record of a sensor.
    pub async fn clear(&self, sensor_id: SensorId) -> Result<(), StoreError> {
        self.store.delete(&self.config.key_for(sensor_id)).await
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }
}
