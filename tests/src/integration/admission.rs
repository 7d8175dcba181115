//! # Admission Flows
//!
//! Upgrade requests against a running relay:
//!
//! 1. No token: `400`, nothing registered
//! 2. Bad token: `401`, nothing registered
//! 3. Valid token without upgrade headers: `500`
//! 4. Valid token: registered, liveness published, cleaned up on close

#[cfg(test)]
mod tests {
    use crate::harness::RelayHarness;
    use futures::SinkExt;
    use sensor_gateway::issue_token;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};

    fn rejected_status(result: Result<impl Sized, WsError>) -> u16 {
        match result {
            Err(WsError::Http(response)) => response.status().as_u16(),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connection unexpectedly admitted"),
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_400() {
        let relay = RelayHarness::start().await;

        let status = rejected_status(relay.try_connect(None, None).await);

        assert_eq!(status, 400);
        assert!(relay.registry.is_empty());
        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_secret_is_401() {
        let relay = RelayHarness::start().await;
        let forged = issue_token(relay.sensor.id, b"not-the-secret").unwrap();

        let status = rejected_status(relay.try_connect(Some(&forged), None).await);

        assert_eq!(status, 401);
        assert!(relay.registry.is_empty());
        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_sensor_is_401() {
        let relay = RelayHarness::start().await;
        let stranger = issue_token(uuid::Uuid::new_v4(), b"whatever").unwrap();

        let status = rejected_status(relay.try_connect(Some(&stranger), None).await);

        assert_eq!(status, 401);
        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_plain_get_with_valid_token_is_500() {
        let relay = RelayHarness::start().await;

        let response = reqwest::Client::new()
            .get(relay.http_url("/"))
            .header("Authorization", format!("Bearer {}", relay.token))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 500);
        assert!(relay.registry.is_empty());
        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_plain_get_without_token_is_400() {
        let relay = RelayHarness::start().await;
        let response = reqwest::get(relay.http_url("/")).await.unwrap();
        assert_eq!(response.status().as_u16(), 400);
        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_bearer_is_400() {
        let relay = RelayHarness::start().await;
        let client = reqwest::Client::new();

        for value in ["Bearer", "Bearer   "] {
            let response = client
                .get(relay.http_url("/"))
                .header("Authorization", value)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status().as_u16(), 400, "header {value:?}");
        }

        let status = rejected_status(relay.try_connect(Some("Bearer"), None).await);
        assert_eq!(status, 400);
        assert!(relay.registry.is_empty());
        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_query_token_admitted() {
        let relay = RelayHarness::start().await;
        let url = format!("{}?token={}", relay.ws_url(), relay.token);

        let (mut socket, response) = tokio_tungstenite::connect_async(url).await.unwrap();
        assert_eq!(response.status().as_u16(), 101);
        relay
            .wait_until("sensor registered", || {
                relay.registry.get(&relay.sensor.id).is_some()
            })
            .await;

        socket.close(None).await.unwrap();
        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_admitted_sensor_lifecycle() {
        let relay = RelayHarness::start().await;

        let mut socket = relay
            .try_connect(Some(&relay.token), Some("3.2.1"))
            .await
            .unwrap();
        relay
            .wait_until("sensor registered", || {
                relay.registry.get(&relay.sensor.id).is_some()
            })
            .await;

        let conn = relay.registry.get(&relay.sensor.id).unwrap();
        assert_eq!(conn.sensor_version.as_deref(), Some("3.2.1"));

        let record: serde_json::Value =
            serde_json::from_slice(&relay.liveness.get(&relay.liveness_key()).unwrap()).unwrap();
        assert_eq!(record["sensorId"], relay.sensor.id.to_string());
        assert_eq!(record["connectionId"], conn.connection_id.to_string());
        assert_eq!(record["sensorVersion"], "3.2.1");

        let health: serde_json::Value = reqwest::get(relay.http_url("/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["connected_sensors"], 1);

        socket.send(Message::Close(None)).await.unwrap();
        relay
            .wait_until("sensor unregistered", || relay.registry.is_empty())
            .await;
        relay
            .wait_until("liveness cleared", || {
                !relay.liveness.contains(&relay.liveness_key())
            })
            .await;

        relay.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_text() {
        let relay = RelayHarness::start().await;
        let _ = relay.try_connect(None, None).await;
        let socket = relay.connect().await;

        let body = reqwest::get(relay.http_url("/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains(r#"relay_admissions_total{outcome="missing_token"}"#));
        assert!(body.contains(r#"relay_admissions_total{outcome="admitted"}"#));
        drop(socket);

        relay.stop().await.unwrap();
    }
}
