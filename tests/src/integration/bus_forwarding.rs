//! # Bus Forwarding
//!
//! Scheduled tasks published on the bus reach the owning sensor unchanged.

#[cfg(test)]
mod tests {
    use crate::harness::{next_text, RelayHarness};
    use shared_types::TaskStatus;
    use uuid::Uuid;

    fn scheduled(task_id: Uuid, sensor_id: Uuid) -> String {
        // Field order and spacing are deliberately irregular; the relay must not re-encode.
        format!(
            r#"{{ "sensor_id":"{sensor_id}",  "id":"{task_id}", "task_name":"dns", "options":{{"target":"example.org"}} }}"#
        )
    }

    #[tokio::test]
    async fn test_owned_task_forwarded_verbatim() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.connect().await;
        let task_id = Uuid::new_v4();
        let payload = scheduled(task_id, relay.sensor.id);

        relay.publish(payload.clone().into_bytes()).await;

        let received = next_text(&mut socket).await.expect("task forwarded");
        assert_eq!(received, payload);
        relay
            .wait_until("task marked sent", || {
                relay.tasks.status_history(&task_id).len() == 2
            })
            .await;
        assert_eq!(
            relay.tasks.status_history(&task_id),
            vec![TaskStatus::ReceivedByServer, TaskStatus::SentToSensorByServer]
        );

        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_task_ignored() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.connect().await;
        let foreign_task = Uuid::new_v4();
        let own_task = Uuid::new_v4();

        relay
            .publish(scheduled(foreign_task, Uuid::new_v4()).into_bytes())
            .await;
        relay
            .publish(scheduled(own_task, relay.sensor.id).into_bytes())
            .await;

        let received = next_text(&mut socket).await.expect("own task forwarded");
        assert!(received.contains(&own_task.to_string()));
        assert!(relay.tasks.status_history(&foreign_task).is_empty());

        relay.stop().await.unwrap();
    }
}
