//! # Graceful Shutdown

#[cfg(test)]
mod tests {
    use crate::harness::{next_text, RelayHarness};

    #[tokio::test]
    async fn test_stop_closes_connected_sensors() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.connect().await;
        let registry = relay.registry.clone();

        relay.stop().await.unwrap();

        assert!(registry.is_empty());
        assert_eq!(next_text(&mut socket).await, None);
    }

    #[tokio::test]
    async fn test_stop_without_sensors() {
        let relay = RelayHarness::start().await;
        relay.stop().await.unwrap();
    }
}
