//! Message router for inbound sensor frames.
//!
//! Reads only the `message_general_type` discriminator and hands the whole
//! frame to the matching handler, keyed by the connection's sensor id.

use relay_telemetry::FRAMES_RECEIVED;
use shared_types::{GeneralMessage, MessageGeneralType};
use std::sync::Arc;

use crate::domain::connection::SensorConnection;
use crate::domain::error::HandlerError;
use crate::handlers::{TaskResultHandler, TelemetryHandler};

/// Dispatches frames by kind.
pub struct MessageRouter {
    task_results: Arc<TaskResultHandler>,
    telemetry: Arc<TelemetryHandler>,
}

impl MessageRouter {
    pub fn new(task_results: Arc<TaskResultHandler>, telemetry: Arc<TelemetryHandler>) -> Self {
        Self {
            task_results,
            telemetry,
        }
    }

    /// Route one frame and return the kind it was handled as.
    pub async fn route(
        &self,
        conn: &SensorConnection,
        frame: &[u8],
    ) -> Result<MessageGeneralType, HandlerError> {
        let general = match GeneralMessage::decode(frame) {
            Ok(general) => general,
            Err(e) => {
                FRAMES_RECEIVED.with_label_values(&["malformed"]).inc();
                return Err(e.into());
            }
        };

        let Some(kind) = general.kind() else {
            FRAMES_RECEIVED.with_label_values(&["unknown"]).inc();
            return Err(HandlerError::UnknownKind(general.message_general_type));
        };
        FRAMES_RECEIVED.with_label_values(&[kind.as_str()]).inc();

        match kind {
            MessageGeneralType::TaskResult => {
                self.task_results
                    .handle_task_result(conn.sensor_id, frame)
                    .await?;
            }
            MessageGeneralType::Telemetry => {
                self.telemetry.handle_telemetry(conn, frame).await?;
            }
        }
        Ok(kind)
    }
}
