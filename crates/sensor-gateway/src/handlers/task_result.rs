//! Task result handling.
//!
//! A result frame moves its task through `ResultsReceivedByServer` and then
//! either `Error` (the sensor reported a failure) or, once every record is
//! stored and the subscription is billed, `Done`.

use relay_telemetry::{time_histogram, TASK_RESULTS, TASK_RESULT_DURATION};
use shared_types::{SensorId, TaskId, TaskRecordBase, TaskResultEnvelope, TaskStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::error::HandlerError;
use crate::handlers::capabilities::TaskCapabilities;
use crate::ports::{Clock, ResultStore, TaskStore};

/// How a well-formed result frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Records stored, subscription billed, task `Done`.
    Done,
    /// The sensor reported an error; task set to `Error`.
    SensorError,
}

impl TaskOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::SensorError => "sensor_error",
        }
    }
}

/// Handles task result frames.
pub struct TaskResultHandler {
    tasks: Arc<dyn TaskStore>,
    results: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    capabilities: TaskCapabilities,
}

impl TaskResultHandler {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        results: Arc<dyn ResultStore>,
        clock: Arc<dyn Clock>,
        capabilities: TaskCapabilities,
    ) -> Self {
        Self {
            tasks,
            results,
            clock,
            capabilities,
        }
    }

    /// Process one task result frame from an authenticated sensor.
    ///
    /// `sensor_id` comes from the connection; any id in the frame is ignored.
    pub async fn handle_task_result(
        &self,
        sensor_id: SensorId,
        frame: &[u8],
    ) -> Result<TaskOutcome, HandlerError> {
        let _timer = time_histogram!(TASK_RESULT_DURATION);

        let envelope = match TaskResultEnvelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                TASK_RESULTS.with_label_values(&["unknown", "malformed"]).inc();
                return Err(e.into());
            }
        };

        let label = if self.capabilities.get(&envelope.task_name).is_some() {
            envelope.task_name.as_str()
        } else {
            "unknown"
        };

        let outcome = self.process(sensor_id, &envelope).await;
        let outcome_label = match &outcome {
            Ok(o) => o.as_str(),
            Err(_) => "failed",
        };
        TASK_RESULTS.with_label_values(&[label, outcome_label]).inc();
        outcome
    }

    async fn process(
        &self,
        sensor_id: SensorId,
        envelope: &TaskResultEnvelope,
    ) -> Result<TaskOutcome, HandlerError> {
        let task_id = envelope.task_id;

        self.tasks
            .update_status(task_id, TaskStatus::ResultsReceivedByServer)
            .await?;

        if envelope.has_sensor_error() {
            warn!(
                sensor_id = %sensor_id,
                task_id = %task_id,
                task_name = %envelope.task_name,
                error = %envelope.error,
                "Sensor reported task failure"
            );
            self.tasks.update_status(task_id, TaskStatus::Error).await?;
            return Ok(TaskOutcome::SensorError);
        }

        let capability = self
            .capabilities
            .get(&envelope.task_name)
            .ok_or_else(|| HandlerError::UnknownTaskType(envelope.task_name.clone()))?;

        let raw = envelope.result_bytes()?;
        let base = TaskRecordBase::new(self.clock.now(), sensor_id, task_id);
        let records = capability.decode(base, &raw)?;
        let inserted = capability.persist(self.results.as_ref(), records).await?;
        debug!(task_id = %task_id, inserted, "Task records stored");

        self.complete(task_id).await?;

        info!(
            sensor_id = %sensor_id,
            task_id = %task_id,
            task_name = %envelope.task_name,
            "Task completed"
        );
        Ok(TaskOutcome::Done)
    }

    /// Bill the subscription and mark the task done in one commit.
    async fn complete(&self, task_id: TaskId) -> Result<(), HandlerError> {
        let mut task = self.tasks.load_task(task_id).await?;
        let mut subscription = self
            .tasks
            .load_subscription(task.client_subscription_id)
            .await?;

        subscription.record_execution(self.clock.now());
        task.task_status = TaskStatus::Done;

        self.tasks.commit_completion(&subscription, &task).await?;
        Ok(())
    }

    pub fn capabilities(&self) -> &TaskCapabilities {
        &self.capabilities
    }
}
