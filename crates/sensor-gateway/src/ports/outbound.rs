//! Outbound ports of the sensor gateway.
//!
//! The relational store, the liveness key-value store and the sensor
//! transport are reached only through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{
    ClientSubscription, ResultRecord, Sensor, SensorId, SubscriptionId, Task, TaskId, TaskStatus,
};
use std::time::Duration;

use crate::domain::error::{StoreError, TransportError};

/// Registered sensors and their signing secrets.
#[async_trait]
pub trait SensorDirectory: Send + Sync {
    /// Look up a sensor. `Ok(None)` when no such sensor exists.
    async fn find_sensor(&self, sensor_id: SensorId) -> Result<Option<Sensor>, StoreError>;
}

/// Tasks and the subscriptions billed for them.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Overwrite the status of a task. Last writer wins.
    async fn update_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), StoreError>;

    async fn load_task(&self, task_id: TaskId) -> Result<Task, StoreError>;

    async fn load_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<ClientSubscription, StoreError>;

    /// Persist an advanced subscription together with its completed task.
    ///
    /// Adapters with transactions apply both writes atomically.
    async fn commit_completion(
        &self,
        subscription: &ClientSubscription,
        task: &Task,
    ) -> Result<(), StoreError>;
}

/// Append-only sink for probe results and host statistics.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn insert(&self, record: ResultRecord) -> Result<(), StoreError>;
}

/// Short-lived key-value records announcing connected sensors.
#[async_trait]
pub trait LivenessStore: Send + Sync {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Write half of a sensor transport.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Time source trait for testability
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System time implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
