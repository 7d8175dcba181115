//! Lifetime of one admitted sensor connection.
//!
//! `open` registers the connection and announces it; `run` reads frames in
//! order until the peer leaves, the transport fails or the service shuts
//! down; the close phase then always unwinds what `open` did.

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use relay_telemetry::{FRAMES_RECEIVED, SENSORS_CONNECTED};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::connection::SensorConnection;
use crate::domain::registry::ConnectionRegistry;
use crate::liveness::LivenessPublisher;
use crate::router::MessageRouter;

/// Why a read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Close frame or end of stream.
    PeerClosed,
    /// The transport reported an error.
    TransportError,
    /// The service is shutting down.
    Shutdown,
}

/// Read side of an admitted sensor connection.
pub struct SensorSession {
    conn: SensorConnection,
    registry: Arc<ConnectionRegistry>,
    router: Arc<MessageRouter>,
    liveness: Arc<LivenessPublisher>,
    max_message_size: usize,
}

impl SensorSession {
    /// Register the connection and publish its liveness record.
    ///
    /// A replaced registration is left to its own read loop. A liveness
    /// failure is logged; the session still opens.
    pub async fn open(
        conn: SensorConnection,
        registry: Arc<ConnectionRegistry>,
        router: Arc<MessageRouter>,
        liveness: Arc<LivenessPublisher>,
        max_message_size: usize,
    ) -> Self {
        if let Some(previous) = registry.put(conn.sensor_id, conn.clone()) {
            info!(
                sensor_id = %conn.sensor_id,
                previous_connection = %previous.connection_id,
                "Sensor reconnected, replacing registration"
            );
        }
        SENSORS_CONNECTED.set(registry.len() as i64);

        if let Err(e) = liveness.publish(&conn).await {
            warn!(sensor_id = %conn.sensor_id, error = %e, "Failed to publish liveness record");
        }

        info!(
            sensor_id = %conn.sensor_id,
            connection_id = %conn.connection_id,
            sensor_version = conn.sensor_version.as_deref().unwrap_or("unknown"),
            "Sensor connected"
        );

        Self {
            conn,
            registry,
            router,
            liveness,
            max_message_size,
        }
    }

    pub fn connection(&self) -> &SensorConnection {
        &self.conn
    }

    /// Read frames until the connection ends, then run the close phase.
    pub async fn run<S>(self, mut stream: S, mut shutdown: watch::Receiver<bool>) -> SessionEnd
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let end = loop {
            if *shutdown.borrow() {
                break SessionEnd::Shutdown;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break SessionEnd::Shutdown;
                    }
                    continue;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => self.process(text.as_bytes()).await,
                Some(Ok(Message::Binary(data))) => self.process(&data).await,
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => break SessionEnd::PeerClosed,
                Some(Err(e)) => {
                    warn!(
                        sensor_id = %self.conn.sensor_id,
                        connection_id = %self.conn.connection_id,
                        error = %e,
                        "Transport read failed"
                    );
                    break SessionEnd::TransportError;
                }
            }
        };

        self.close(end).await;
        end
    }

    async fn process(&self, frame: &[u8]) {
        if frame.len() > self.max_message_size {
            FRAMES_RECEIVED.with_label_values(&["oversized"]).inc();
            warn!(
                sensor_id = %self.conn.sensor_id,
                size = frame.len(),
                max = self.max_message_size,
                "Frame exceeds size limit, dropped"
            );
            return;
        }

        match self.router.route(&self.conn, frame).await {
            Ok(kind) => debug!(sensor_id = %self.conn.sensor_id, kind = kind.as_str(), "Frame handled"),
            Err(e) => warn!(
                sensor_id = %self.conn.sensor_id,
                connection_id = %self.conn.connection_id,
                error = %e,
                "Failed to handle frame"
            ),
        }
    }

    async fn close(&self, end: SessionEnd) {
        let sensor_id = self.conn.sensor_id;

        if let Err(e) = self.liveness.clear(sensor_id).await {
            warn!(sensor_id = %sensor_id, error = %e, "Failed to clear liveness record");
        }

        // Unconditional: a reconnect registered after this session is evicted too.
        match self.registry.remove(&sensor_id) {
            None => debug!(sensor_id = %sensor_id, "Sensor was not registered at close"),
            Some(removed) if !removed.same_transport(&self.conn) => warn!(
                sensor_id = %sensor_id,
                connection_id = %self.conn.connection_id,
                evicted_connection_id = %removed.connection_id,
                "Closing session removed a newer connection of the same sensor"
            ),
            Some(_) => {}
        }
        SENSORS_CONNECTED.set(self.registry.len() as i64);

        if let Err(e) = self.conn.close().await {
            debug!(sensor_id = %sensor_id, error = %e, "Transport close failed");
        }

        info!(
            sensor_id = %sensor_id,
            connection_id = %self.conn.connection_id,
            reason = ?end,
            "Sensor disconnected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        FixedClock, InMemoryLivenessStore, InMemoryResultStore, InMemoryTaskStore, RecordingSink,
    };
    use crate::domain::config::LivenessConfig;
    use crate::handlers::{TaskCapabilities, TaskResultHandler, TelemetryHandler};
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        router: Arc<MessageRouter>,
        liveness: Arc<LivenessPublisher>,
        liveness_store: Arc<InMemoryLivenessStore>,
        results: Arc<InMemoryResultStore>,
    }

    fn fixture() -> Fixture {
        let tasks = Arc::new(InMemoryTaskStore::new());
        let results = Arc::new(InMemoryResultStore::new());
        let liveness_store = Arc::new(InMemoryLivenessStore::new());
        let liveness = Arc::new(LivenessPublisher::new(
            liveness_store.clone(),
            LivenessConfig::default(),
        ));
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let router = Arc::new(MessageRouter::new(
            Arc::new(TaskResultHandler::new(
                tasks,
                results.clone(),
                clock.clone(),
                TaskCapabilities::with_defaults(),
            )),
            Arc::new(TelemetryHandler::new(
                results.clone(),
                liveness.clone(),
                clock,
            )),
        ));
        Fixture {
            registry: Arc::new(ConnectionRegistry::new()),
            router,
            liveness,
            liveness_store,
            results,
        }
    }

    async fn open(f: &Fixture, max: usize) -> (SensorSession, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let conn = SensorConnection::new(Uuid::new_v4(), None, sink.clone());
        let session = SensorSession::open(
            conn,
            f.registry.clone(),
            f.router.clone(),
            f.liveness.clone(),
            max,
        )
        .await;
        (session, sink)
    }

    fn telemetry() -> Message {
        Message::Text(r#"{"message_general_type":2,"goroutines":1}"#.to_string())
    }

    #[tokio::test]
    async fn test_open_registers_and_announces() {
        let f = fixture();
        let (session, _) = open(&f, 1024).await;
        let sensor_id = session.connection().sensor_id;

        assert!(f.registry.get(&sensor_id).is_some());
        assert!(f
            .liveness_store
            .contains(&LivenessConfig::default().key_for(sensor_id)));
    }

    #[tokio::test]
    async fn test_close_phase_always_runs() {
        let f = fixture();
        let (session, sink) = open(&f, 1024).await;
        let sensor_id = session.connection().sensor_id;
        let (_tx, rx) = watch::channel(false);

        let end = session.run(futures::stream::iter(vec![Ok(telemetry())]), rx).await;

        assert_eq!(end, SessionEnd::PeerClosed);
        assert!(f.registry.get(&sensor_id).is_none());
        assert!(!f
            .liveness_store
            .contains(&LivenessConfig::default().key_for(sensor_id)));
        assert!(sink.is_closed());
        assert_eq!(f.results.records_of_kind("host_runtime_stat").len(), 1);
    }

    #[tokio::test]
    async fn test_stale_close_evicts_reconnect() {
        let f = fixture();
        let (stale, stale_sink) = open(&f, 1024).await;
        let sensor_id = stale.connection().sensor_id;

        let fresh_sink = Arc::new(RecordingSink::new());
        let fresh = SensorSession::open(
            SensorConnection::new(sensor_id, None, fresh_sink.clone()),
            f.registry.clone(),
            f.router.clone(),
            f.liveness.clone(),
            1024,
        )
        .await;
        let fresh_id = fresh.connection().connection_id;
        assert_eq!(f.registry.get(&sensor_id).unwrap().connection_id, fresh_id);

        let (_tx, rx) = watch::channel(false);
        stale
            .run(futures::stream::empty::<Result<Message, axum::Error>>(), rx)
            .await;

        assert!(f.registry.get(&sensor_id).is_none());
        assert!(!f
            .liveness_store
            .contains(&LivenessConfig::default().key_for(sensor_id)));
        assert!(stale_sink.is_closed());
        assert!(!fresh_sink.is_closed());
    }

    #[tokio::test]
    async fn test_bad_frames_do_not_end_loop() {
        let f = fixture();
        let (session, _) = open(&f, 1024).await;
        let (_tx, rx) = watch::channel(false);

        let frames = vec![
            Ok(Message::Text(r#"{"message_general_type":7}"#.to_string())),
            Ok(Message::Text("not json".to_string())),
            Ok(Message::Ping(vec![1])),
            Ok(Message::Binary(
                br#"{"message_general_type":2,"goroutines":2}"#.to_vec(),
            )),
            Ok(telemetry()),
            Ok(Message::Close(None)),
            Ok(telemetry()),
        ];

        let end = session.run(futures::stream::iter(frames), rx).await;

        assert_eq!(end, SessionEnd::PeerClosed);
        // Two telemetry frames before the close frame; none after it
        assert_eq!(f.results.records_of_kind("host_runtime_stat").len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_frame_dropped() {
        let f = fixture();
        let (session, _) = open(&f, 16).await;
        let (_tx, rx) = watch::channel(false);

        session
            .run(futures::stream::iter(vec![Ok(telemetry())]), rx)
            .await;
        assert!(f.results.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_ends_loop() {
        let f = fixture();
        let (session, _) = open(&f, 1024).await;
        let sensor_id = session.connection().sensor_id;
        let (_tx, rx) = watch::channel(false);

        let frames = vec![
            Err(axum::Error::new(std::io::Error::other("connection reset"))),
            Ok(telemetry()),
        ];
        let end = session.run(futures::stream::iter(frames), rx).await;

        assert_eq!(end, SessionEnd::TransportError);
        assert!(f.results.is_empty());
        assert!(f.registry.get(&sensor_id).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_ends_idle_loop() {
        let f = fixture();
        let (session, sink) = open(&f, 1024).await;
        let sensor_id = session.connection().sensor_id;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(session.run(futures::stream::pending(), rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_replace(true);

        let end = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
        assert!(f.registry.get(&sensor_id).is_none());
        assert!(sink.is_closed());
    }
}
