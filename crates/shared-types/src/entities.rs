//! # Core Domain Entities
//!
//! External entities the relay reads and mutates. The relay never creates a
//! sensor, task or subscription during normal operation; it only advances task
//! status and subscription counters.
//!
//! ## Clusters
//!
//! - **Identity**: `SensorId`, `Sensor`
//! - **Work**: `TaskId`, `Task`, `TaskStatus`
//! - **Billing**: `ClientSubscription`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a sensor (external, issued at provisioning time).
pub type SensorId = Uuid;

/// Identity of a scheduled task.
pub type TaskId = Uuid;

/// Identity of a client subscription.
pub type SubscriptionId = Uuid;

/// Opaque identifier generated for every accepted transport connection.
pub type ConnectionId = Uuid;

/// A registered sensor as held by the sensor directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    /// Sensor identity.
    pub id: SensorId,
    /// Human readable name.
    pub name: String,
    /// Free-form location label.
    pub location: String,
    /// Per-sensor signing secret for admission tokens.
    ///
    /// An empty secret means the sensor cannot be admitted.
    pub secret: String,
}

/// Persisted task status.
///
/// The discriminants are the literal codes stored in the `task_status_id`
/// column and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum TaskStatus {
    /// Created by the scheduler.
    New = 1,
    /// Picked up by the relay that owns the sensor connection.
    ReceivedByServer = 3,
    /// Written to the sensor's transport.
    SentToSensorByServer = 4,
    /// A result frame for the task arrived.
    ResultsReceivedByServer = 7,
    /// Result persisted and subscription counters advanced.
    Done = 8,
    /// The sensor reported a failure.
    Error = 9,
}

impl TaskStatus {
    /// The persisted numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Parse a persisted numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TaskStatus::New),
            3 => Some(TaskStatus::ReceivedByServer),
            4 => Some(TaskStatus::SentToSensorByServer),
            7 => Some(TaskStatus::ResultsReceivedByServer),
            8 => Some(TaskStatus::Done),
            9 => Some(TaskStatus::Error),
            _ => None,
        }
    }

    /// Whether the task has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, String> {
        Self::from_code(code).ok_or_else(|| format!("unknown task status code {code}"))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::New => "NEW",
            TaskStatus::ReceivedByServer => "RECEIVED_BY_SERVER",
            TaskStatus::SentToSensorByServer => "SENT_TO_SENSOR_BY_SERVER",
            TaskStatus::ResultsReceivedByServer => "RESULTS_RECEIVED_BY_SERVER",
            TaskStatus::Done => "DONE",
            TaskStatus::Error => "ERROR",
        };
        write!(f, "{}({})", name, self.code())
    }
}

/// A scheduled unit of probe work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task identity.
    pub id: TaskId,
    /// Target sensor.
    pub sensor_id: SensorId,
    /// Subscription billed for this task.
    pub client_subscription_id: SubscriptionId,
    /// Current status.
    pub task_status: TaskStatus,
}

/// Usage counters of a customer subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSubscription {
    /// Subscription identity.
    pub id: SubscriptionId,
    /// Number of tasks completed under this subscription.
    pub tests_count_executed: u64,
    /// When the last task completed.
    pub last_execution_completed: Option<DateTime<Utc>>,
}

impl ClientSubscription {
    /// A fresh subscription with zeroed counters.
    #[must_use]
    pub fn new(id: SubscriptionId) -> Self {
        Self {
            id,
            tests_count_executed: 0,
            last_execution_completed: None,
        }
    }

    /// Account for one completed task.
    pub fn record_execution(&mut self, completed_at: DateTime<Utc>) {
        self.tests_count_executed += 1;
        self.last_execution_completed = Some(completed_at);
    }
}
