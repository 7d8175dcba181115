//! Bus listener forwarding scheduled tasks to connected sensors.
//!
//! Every relay instance sees every scheduled task. An instance forwards only
//! the tasks whose sensor is registered locally; the rest are someone else's.

use relay_telemetry::BUS_FORWARDS;
use shared_bus::{MessageSubscription, SubscriptionError};
use shared_types::{DecodeError, ScheduledTask, SensorId, TaskId, TaskStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::connection::SensorConnection;
use crate::domain::error::HandlerError;
use crate::domain::registry::ConnectionRegistry;
use crate::ports::TaskStore;

/// Result of handling one bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Written to the sensor and marked sent.
    Forwarded { task_id: TaskId, sensor_id: SensorId },
    /// The sensor is not connected to this instance.
    NotOwned { task_id: TaskId, sensor_id: SensorId },
}

/// Consumes the task distribution channel.
pub struct BusListener {
    registry: Arc<ConnectionRegistry>,
    tasks: Arc<dyn TaskStore>,
}

impl BusListener {
    pub fn new(registry: Arc<ConnectionRegistry>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { registry, tasks }
    }

    /// Run until shutdown is signalled or the bus closes.
    ///
    /// Per-message failures are logged and never end the loop.
    pub async fn run<S>(&self, mut subscription: S, mut shutdown: watch::Receiver<bool>)
    where
        S: MessageSubscription,
    {
        info!(channel = %subscription.channel(), "Bus listener started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                received = subscription.recv() => received,
            };

            match received {
                Ok(message) => {
                    if let Err(e) = self.handle_message(&message.payload).await {
                        warn!(channel = %message.channel, error = %e, "Failed to forward scheduled task");
                    }
                }
                Err(SubscriptionError::Lagged(dropped)) => {
                    BUS_FORWARDS.with_label_values(&["lagged"]).inc_by(dropped);
                    warn!(dropped, "Bus listener lagged, scheduled tasks lost");
                }
                Err(SubscriptionError::Closed) => {
                    error!("Task bus closed");
                    break;
                }
            }
        }

        info!("Bus listener stopped");
    }

    /// Forward one scheduled task if its sensor is connected here.
    ///
    /// The payload reaches the sensor byte for byte.
    pub async fn handle_message(&self, payload: &[u8]) -> Result<ForwardOutcome, HandlerError> {
        // Forwarded as a text frame, so the whole payload must be UTF-8.
        let decoded = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::Envelope(e.to_string()))
            .and_then(|text| ScheduledTask::decode(payload).map(|scheduled| (text, scheduled)));
        let (text, scheduled) = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                BUS_FORWARDS.with_label_values(&["malformed"]).inc();
                return Err(e.into());
            }
        };
        let (task_id, sensor_id) = (scheduled.id, scheduled.sensor_id);

        let Some(conn) = self.registry.get(&sensor_id) else {
            BUS_FORWARDS.with_label_values(&["not_owned"]).inc();
            info!(task_id = %task_id, sensor_id = %sensor_id, "Sensor not connected to this instance");
            return Ok(ForwardOutcome::NotOwned { task_id, sensor_id });
        };

        let result = self.forward(task_id, &conn, text).await;
        let label = if result.is_ok() { "forwarded" } else { "failed" };
        BUS_FORWARDS.with_label_values(&[label]).inc();
        result?;

        debug!(task_id = %task_id, sensor_id = %sensor_id, "Task forwarded to sensor");
        Ok(ForwardOutcome::Forwarded { task_id, sensor_id })
    }

    async fn forward(
        &self,
        task_id: TaskId,
        conn: &SensorConnection,
        text: &str,
    ) -> Result<(), HandlerError> {
        self.tasks
            .update_status(task_id, TaskStatus::ReceivedByServer)
            .await?;

        conn.send_text(text.to_string()).await?;

        self.tasks
            .update_status(task_id, TaskStatus::SentToSensorByServer)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryTaskStore, RecordingSink};
    use crate::domain::error::TransportError;
    use async_trait::async_trait;
    use shared_bus::{BusMessage, InMemoryTaskBus, TaskPublisher};
    use std::collections::VecDeque;
    use std::time::Duration;
    use uuid::Uuid;

    struct Fixture {
        listener: BusListener,
        registry: Arc<ConnectionRegistry>,
        tasks: Arc<InMemoryTaskStore>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let tasks = Arc::new(InMemoryTaskStore::new());
        Fixture {
            listener: BusListener::new(registry.clone(), tasks.clone()),
            registry,
            tasks,
        }
    }

    fn connect(registry: &ConnectionRegistry, sensor_id: SensorId) -> Arc<RecordingSink> {
        let sink = Arc::new(RecordingSink::new());
        registry.put(sensor_id, SensorConnection::new(sensor_id, None, sink.clone()));
        sink
    }

    fn payload(task_id: TaskId, sensor_id: SensorId) -> Vec<u8> {
        format!(
            r#"{{"id":"{task_id}","sensor_id":"{sensor_id}","task_name":"icmp","extra":{{"count":3}}}}"#
        )
        .into_bytes()
    }

    /// Replays a fixed sequence, then reports the bus closed.
    struct ScriptedSubscription {
        items: VecDeque<Result<BusMessage, SubscriptionError>>,
    }

    #[async_trait]
    impl MessageSubscription for ScriptedSubscription {
        async fn recv(&mut self) -> Result<BusMessage, SubscriptionError> {
            self.items
                .pop_front()
                .unwrap_or(Err(SubscriptionError::Closed))
        }

        fn channel(&self) -> &str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_hit_forwards_verbatim() {
        let f = fixture();
        let sensor_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let sink = connect(&f.registry, sensor_id);
        let raw = payload(task_id, sensor_id);

        let outcome = f.listener.handle_message(&raw).await.unwrap();

        assert_eq!(outcome, ForwardOutcome::Forwarded { task_id, sensor_id });
        assert_eq!(sink.sent(), vec![String::from_utf8(raw).unwrap()]);
        assert_eq!(
            f.tasks.status_history(&task_id),
            vec![TaskStatus::ReceivedByServer, TaskStatus::SentToSensorByServer]
        );
    }

    #[tokio::test]
    async fn test_miss_writes_nothing() {
        let f = fixture();
        let other = Uuid::new_v4();
        let sink = connect(&f.registry, other);
        let task_id = Uuid::new_v4();
        let sensor_id = Uuid::new_v4();

        let outcome = f
            .listener
            .handle_message(&payload(task_id, sensor_id))
            .await
            .unwrap();

        assert_eq!(outcome, ForwardOutcome::NotOwned { task_id, sensor_id });
        assert_eq!(f.tasks.status_writes(), 0);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let f = fixture();
        let err = f.listener.handle_message(b"{\"id\":1}").await.unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
        assert_eq!(f.tasks.status_writes(), 0);
    }

    #[tokio::test]
    async fn test_non_utf8_payload_touches_nothing() {
        let f = fixture();
        let sensor_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let sink = connect(&f.registry, sensor_id);
        let mut raw = format!(r#"{{"id":"{task_id}","sensor_id":"{sensor_id}","note":""#).into_bytes();
        raw.extend_from_slice(&[0xff, 0xfe]);
        raw.extend_from_slice(b"\"}");

        let err = f.listener.handle_message(&raw).await.unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
        assert!(f.tasks.status_history(&task_id).is_empty());
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_status_failure_skips_send() {
        let f = fixture();
        f.tasks.fail_updates_to(TaskStatus::ReceivedByServer);
        let sensor_id = Uuid::new_v4();
        let sink = connect(&f.registry, sensor_id);

        let err = f
            .listener
            .handle_message(&payload(Uuid::new_v4(), sensor_id))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Store(_)));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_keeps_registration() {
        let f = fixture();
        let sensor_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let sink = connect(&f.registry, sensor_id);
        sink.set_failing(true);

        let err = f
            .listener
            .handle_message(&payload(task_id, sensor_id))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Transport(TransportError::Send(_))));
        assert_eq!(
            f.tasks.status_history(&task_id),
            vec![TaskStatus::ReceivedByServer]
        );
        assert!(f.registry.get(&sensor_id).is_some());
    }

    #[tokio::test]
    async fn test_run_survives_bad_messages_and_stops_on_close() {
        let f = fixture();
        let sensor_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let sink = connect(&f.registry, sensor_id);

        let subscription = ScriptedSubscription {
            items: VecDeque::from(vec![
                Ok(BusMessage::new("test", b"garbage".to_vec())),
                Err(SubscriptionError::Lagged(4)),
                Ok(BusMessage::new("test", payload(task_id, sensor_id))),
            ]),
        };
        let (_tx, rx) = watch::channel(false);

        tokio::time::timeout(Duration::from_secs(2), f.listener.run(subscription, rx))
            .await
            .unwrap();

        assert_eq!(sink.sent().len(), 1);
        assert_eq!(
            f.tasks.status_history(&task_id),
            vec![TaskStatus::ReceivedByServer, TaskStatus::SentToSensorByServer]
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = Arc::new(fixture());
        let bus = InMemoryTaskBus::new();
        let subscription = bus.subscribe("scheduler-new-task");
        let (tx, rx) = watch::channel(false);

        let listener = Arc::clone(&f);
        let handle = tokio::spawn(async move { listener.listener.run(subscription, rx).await });

        let sensor_id = Uuid::new_v4();
        let sink = connect(&f.registry, sensor_id);
        bus.publish("scheduler-new-task", payload(Uuid::new_v4(), sensor_id))
            .await;

        tokio::time::timeout(Duration::from_secs(2), async {
            while sink.sent().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
