//! In-memory adapters for every store port.
//!
//! Back the default binary and the test suites. Failure switches let tests
//! exercise the error paths of the handlers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use shared_types::{
    ClientSubscription, ResultRecord, Sensor, SensorId, SubscriptionId, Task, TaskId, TaskStatus,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::domain::error::StoreError;
use crate::ports::{Clock, LivenessStore, ResultStore, SensorDirectory, TaskStore};

// =============================================================================
// SENSOR DIRECTORY
// =============================================================================

/// Sensor directory held in memory.
#[derive(Debug, Default)]
pub struct InMemorySensorDirectory {
    sensors: RwLock<HashMap<SensorId, Sensor>>,
    unavailable: AtomicBool,
}

impl InMemorySensorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory preloaded with sensors.
    pub fn with_sensors(sensors: impl IntoIterator<Item = Sensor>) -> Self {
        let directory = Self::new();
        for sensor in sensors {
            directory.insert(sensor);
        }
        directory
    }

    pub fn insert(&self, sensor: Sensor) {
        self.sensors.write().insert(sensor.id, sensor);
    }

    /// Make every lookup fail with a backend error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl SensorDirectory for InMemorySensorDirectory {
    async fn find_sensor(&self, sensor_id: SensorId) -> Result<Option<Sensor>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("sensor directory unavailable".into()));
        }
        Ok(self.sensors.read().get(&sensor_id).cloned())
    }
}

// =============================================================================
// TASK STORE
// =============================================================================

/// Status writes retained by default.
pub const DEFAULT_STATUS_HISTORY_LIMIT: usize = 4096;

#[derive(Debug, Default)]
struct TaskTables {
    tasks: HashMap<TaskId, Task>,
    subscriptions: HashMap<SubscriptionId, ClientSubscription>,
    /// Most recent status writes, oldest first
    history: VecDeque<(TaskId, TaskStatus)>,
}

impl TaskTables {
    fn record(&mut self, task_id: TaskId, status: TaskStatus, limit: usize) {
        if limit == 0 {
            return;
        }
        while self.history.len() >= limit {
            self.history.pop_front();
        }
        self.history.push_back((task_id, status));
    }
}

/// Task and subscription tables held in memory.
///
/// Status updates for unknown task ids touch no row and succeed, like an
/// `UPDATE ... WHERE id = ?` matching nothing. Only the most recent status
/// writes are kept for inspection.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    tables: Mutex<TaskTables>,
    failing_statuses: Mutex<HashSet<TaskStatus>>,
    history_limit: usize,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_STATUS_HISTORY_LIMIT)
    }
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` status writes; `0` keeps none.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            tables: Mutex::new(TaskTables::default()),
            failing_statuses: Mutex::new(HashSet::new()),
            history_limit: limit,
        }
    }

    pub fn insert_task(&self, task: Task) {
        self.tables.lock().tasks.insert(task.id, task);
    }

    pub fn insert_subscription(&self, subscription: ClientSubscription) {
        self.tables
            .lock()
            .subscriptions
            .insert(subscription.id, subscription);
    }

    pub fn task(&self, task_id: &TaskId) -> Option<Task> {
        self.tables.lock().tasks.get(task_id).cloned()
    }

    pub fn subscription(&self, id: &SubscriptionId) -> Option<ClientSubscription> {
        self.tables.lock().subscriptions.get(id).cloned()
    }

    /// Statuses written for a task, oldest first.
    pub fn status_history(&self, task_id: &TaskId) -> Vec<TaskStatus> {
        self.tables
            .lock()
            .history
            .iter()
            .filter(|(id, _)| id == task_id)
            .map(|(_, status)| *status)
            .collect()
    }

    /// Number of retained status writes.
    pub fn status_writes(&self) -> usize {
        self.tables.lock().history.len()
    }

    /// Make updates to `status` fail.
    pub fn fail_updates_to(&self, status: TaskStatus) {
        self.failing_statuses.lock().insert(status);
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn update_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), StoreError> {
        if self.failing_statuses.lock().contains(&status) {
            return Err(StoreError::Backend(format!("update to {status} rejected")));
        }

        let mut tables = self.tables.lock();
        if let Some(task) = tables.tasks.get_mut(&task_id) {
            task.task_status = status;
        }
        tables.record(task_id, status, self.history_limit);
        Ok(())
    }

    async fn load_task(&self, task_id: TaskId) -> Result<Task, StoreError> {
        self.task(&task_id)
            .ok_or_else(|| StoreError::not_found("task", task_id))
    }

    async fn load_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<ClientSubscription, StoreError> {
        self.subscription(&subscription_id)
            .ok_or_else(|| StoreError::not_found("client subscription", subscription_id))
    }

    async fn commit_completion(
        &self,
        subscription: &ClientSubscription,
        task: &Task,
    ) -> Result<(), StoreError> {
        if self.failing_statuses.lock().contains(&task.task_status) {
            return Err(StoreError::Backend(format!(
                "update to {} rejected",
                task.task_status
            )));
        }

        let mut tables = self.tables.lock();
        if !tables.tasks.contains_key(&task.id) {
            return Err(StoreError::not_found("task", task.id));
        }
        if !tables.subscriptions.contains_key(&subscription.id) {
            return Err(StoreError::not_found("client subscription", subscription.id));
        }

        tables
            .subscriptions
            .insert(subscription.id, subscription.clone());
        tables.tasks.insert(task.id, task.clone());
        tables.record(task.id, task.task_status, self.history_limit);
        Ok(())
    }
}

// =============================================================================
// RESULT STORE
// =============================================================================

/// Result records held in memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    records: Mutex<Vec<ResultRecord>>,
    failing_kinds: Mutex<HashSet<&'static str>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().clone()
    }

    /// Records of one kind (see [`ResultRecord::kind`]).
    pub fn records_of_kind(&self, kind: &str) -> Vec<ResultRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Make inserts of one record kind fail.
    pub fn fail_on_kind(&self, kind: &'static str) {
        self.failing_kinds.lock().insert(kind);
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn insert(&self, record: ResultRecord) -> Result<(), StoreError> {
        if self.failing_kinds.lock().contains(record.kind()) {
            return Err(StoreError::Backend(format!(
                "insert of {} rejected",
                record.kind()
            )));
        }
        self.records.lock().push(record);
        Ok(())
    }
}

// =============================================================================
// LIVENESS STORE
// =============================================================================

#[derive(Debug, Clone)]
struct LivenessEntry {
    value: Vec<u8>,
    ttl: Duration,
    expires_at: Instant,
}

/// Expiring key-value records held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLivenessStore {
    entries: Mutex<HashMap<String, LivenessEntry>>,
    failing: AtomicBool,
}

impl InMemoryLivenessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a key that has not expired.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// TTL the key was last written with.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).map(|e| e.ttl)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Make every call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Backend("liveness store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LivenessStore for InMemoryLivenessStore {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.lock().insert(
            key.to_string(),
            LivenessEntry {
                value,
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// Clock frozen at a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
