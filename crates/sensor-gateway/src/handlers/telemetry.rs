//! Host telemetry handling.

use relay_telemetry::TELEMETRY_REPORTS;
use shared_types::{
    HostNetworkStat, HostRuntimeStat, HostTelemetry, NetworkInterfaceStat, ResultRecord,
};
use std::sync::Arc;
use tracing::debug;

use crate::domain::connection::SensorConnection;
use crate::domain::error::HandlerError;
use crate::liveness::LivenessPublisher;
use crate::ports::{Clock, ResultStore};

/// Stores host telemetry and keeps the sensor's liveness record fresh.
pub struct TelemetryHandler {
    results: Arc<dyn ResultStore>,
    liveness: Arc<LivenessPublisher>,
    clock: Arc<dyn Clock>,
}

impl TelemetryHandler {
    pub fn new(
        results: Arc<dyn ResultStore>,
        liveness: Arc<LivenessPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            results,
            liveness,
            clock,
        }
    }

    /// Process one telemetry frame.
    ///
    /// Writes the runtime stat, the network parent and one child per
    /// interface, then refreshes liveness. The first failure ends the frame.
    pub async fn handle_telemetry(
        &self,
        conn: &SensorConnection,
        frame: &[u8],
    ) -> Result<(), HandlerError> {
        let result = self.store(conn, frame).await;
        let outcome = if result.is_ok() { "stored" } else { "failed" };
        TELEMETRY_REPORTS.with_label_values(&[outcome]).inc();
        result
    }

    async fn store(&self, conn: &SensorConnection, frame: &[u8]) -> Result<(), HandlerError> {
        let telemetry = HostTelemetry::decode(frame)?;
        let now = self.clock.now();

        self.results
            .insert(ResultRecord::HostRuntime(HostRuntimeStat::from_telemetry(
                now,
                conn.sensor_id,
                &telemetry,
            )))
            .await?;

        let parent = HostNetworkStat::new(now, conn.sensor_id);
        self.results
            .insert(ResultRecord::HostNetwork(parent))
            .await?;
        for interface in &telemetry.network {
            self.results
                .insert(ResultRecord::NetworkInterface(
                    NetworkInterfaceStat::from_interface(&parent, interface),
                ))
                .await?;
        }

        self.liveness.publish(conn).await?;

        debug!(
            sensor_id = %conn.sensor_id,
            interfaces = telemetry.network.len(),
            "Telemetry stored"
        );
        Ok(())
    }
}
