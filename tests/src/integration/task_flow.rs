//! # Task Result and Telemetry Flows
//!
//! Frames sent by a connected sensor and what they leave behind in the
//! task and result stores.

#[cfg(test)]
mod tests {
    use crate::harness::{next_text, send_json, RelayHarness};
    use serde_json::json;
    use shared_types::{ClientSubscription, ResultRecord, Task, TaskStatus};
    use uuid::Uuid;

    /// Registers a subscription and a task already sent to the sensor.
    fn seed_task(relay: &RelayHarness) -> Task {
        let subscription = ClientSubscription::new(Uuid::new_v4());
        let task = Task {
            id: Uuid::new_v4(),
            sensor_id: relay.sensor.id,
            client_subscription_id: subscription.id,
            task_status: TaskStatus::SentToSensorByServer,
        };
        relay.tasks.insert_subscription(subscription);
        relay.tasks.insert_task(task.clone());
        task
    }

    #[tokio::test]
    async fn test_icmp_result_completes_task() {
        let relay = RelayHarness::start().await;
        let task = seed_task(&relay);
        let mut socket = relay.connect().await;

        send_json(
            &mut socket,
            &json!({
                "message_general_type": 1,
                "task_id": task.id,
                "task_name": "icmp",
                "result": {
                    "result_per_ip": [
                        {"ip_addr": "1.1.1.1", "packets_sent": 3, "packets_received": 3},
                        {"ip_addr": "1.0.0.1", "packets_sent": 3, "packets_received": 2}
                    ]
                },
                "error": ""
            }),
        )
        .await;

        relay
            .wait_until("task done", || {
                relay.tasks.task(&task.id).map(|t| t.task_status) == Some(TaskStatus::Done)
            })
            .await;

        let records = relay.results.records_of_kind("icmp_result");
        assert_eq!(records.len(), 2);
        let mut addrs: Vec<String> = records
            .iter()
            .map(|record| match record {
                ResultRecord::Icmp(r) => {
                    assert_eq!(r.base.sensor_id, relay.sensor.id);
                    assert_eq!(r.base.task_id, task.id);
                    r.ip_addr.clone()
                }
                other => panic!("unexpected record {other:?}"),
            })
            .collect();
        addrs.sort();
        assert_eq!(addrs, vec!["1.0.0.1", "1.1.1.1"]);

        assert_eq!(
            relay.tasks.status_history(&task.id),
            vec![TaskStatus::ResultsReceivedByServer, TaskStatus::Done]
        );
        let subscription = relay
            .tasks
            .subscription(&task.client_subscription_id)
            .unwrap();
        assert_eq!(subscription.tests_count_executed, 1);
        assert!(subscription.last_execution_completed.is_some());

        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduled_icmp_task_full_cycle() {
        let relay = RelayHarness::start().await;
        let subscription = ClientSubscription::new(Uuid::new_v4());
        let task = Task {
            id: Uuid::new_v4(),
            sensor_id: relay.sensor.id,
            client_subscription_id: subscription.id,
            task_status: TaskStatus::New,
        };
        relay.tasks.insert_subscription(subscription);
        relay.tasks.insert_task(task.clone());
        let mut socket = relay.connect().await;

        let scheduled = format!(
            r#"{{"id":"{}","sensor_id":"{}","task_name":"icmp","targets":["1.1.1.1","1.0.0.1"]}}"#,
            task.id, relay.sensor.id
        );
        relay.publish(scheduled.clone().into_bytes()).await;

        assert_eq!(next_text(&mut socket).await.as_deref(), Some(scheduled.as_str()));
        relay
            .wait_until("task sent", || {
                relay.tasks.task(&task.id).map(|t| t.task_status)
                    == Some(TaskStatus::SentToSensorByServer)
            })
            .await;

        send_json(
            &mut socket,
            &json!({
                "message_general_type": 1,
                "task_id": task.id,
                "task_name": "icmp",
                "result": {
                    "result_per_ip": [
                        {"ip_addr": "1.1.1.1", "packets_sent": 3, "packets_received": 3},
                        {"ip_addr": "1.0.0.1", "packets_sent": 3, "packets_received": 3}
                    ]
                },
                "error": ""
            }),
        )
        .await;

        relay
            .wait_until("task done", || {
                relay.tasks.task(&task.id).map(|t| t.task_status) == Some(TaskStatus::Done)
            })
            .await;
        assert_eq!(
            relay.tasks.status_history(&task.id),
            vec![
                TaskStatus::ReceivedByServer,
                TaskStatus::SentToSensorByServer,
                TaskStatus::ResultsReceivedByServer,
                TaskStatus::Done,
            ]
        );
        assert_eq!(relay.results.records_of_kind("icmp_result").len(), 2);
        let subscription = relay
            .tasks
            .subscription(&task.client_subscription_id)
            .unwrap();
        assert_eq!(subscription.tests_count_executed, 1);

        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_sensor_error_marks_task() {
        let relay = RelayHarness::start().await;
        let task = seed_task(&relay);
        let mut socket = relay.connect().await;

        send_json(
            &mut socket,
            &json!({
                "message_general_type": 1,
                "task_id": task.id,
                "task_name": "dns",
                "result": {},
                "error": "resolver unreachable"
            }),
        )
        .await;

        relay
            .wait_until("task errored", || {
                relay.tasks.task(&task.id).map(|t| t.task_status) == Some(TaskStatus::Error)
            })
            .await;
        assert_eq!(
            relay.tasks.status_history(&task.id),
            vec![TaskStatus::ResultsReceivedByServer, TaskStatus::Error]
        );
        assert!(relay.results.is_empty());

        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_frame_does_not_break_session() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.connect().await;

        send_json(&mut socket, &json!({"message_general_type": 42, "x": 1})).await;
        send_json(
            &mut socket,
            &json!({
                "message_general_type": 2,
                "goroutines": 9,
                "cpu": {"cores": 2, "usage": 3.5, "model_name": "test-cpu"},
                "memory": {"total": 2048, "used": 512, "free": 1536, "used_percent": 25.0},
                "network": [
                    {"name": "eth0", "bytes_sent": 1, "bytes_recv": 2, "packets_sent": 3, "packets_recv": 4}
                ]
            }),
        )
        .await;

        relay
            .wait_until("telemetry stored", || {
                relay.results.records_of_kind("network_interface_stat").len() == 1
            })
            .await;

        let runtime = relay.results.records_of_kind("host_runtime_stat");
        assert_eq!(runtime.len(), 1);
        let parents = relay.results.records_of_kind("host_network_stat");
        assert_eq!(parents.len(), 1);
        let parent_id = match &parents[0] {
            ResultRecord::HostNetwork(p) => p.id,
            other => panic!("unexpected record {other:?}"),
        };
        match &relay.results.records_of_kind("network_interface_stat")[0] {
            ResultRecord::NetworkInterface(c) => {
                assert_eq!(c.network_stat_id, parent_id);
                assert_eq!(c.interface_name, "eth0");
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert!(relay.liveness.contains(&relay.liveness_key()));
        assert!(relay.registry.get(&relay.sensor.id).is_some());

        relay.stop().await.unwrap();
    }
}
