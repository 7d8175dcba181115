//! # Relay Harness
//!
//! Runs a full relay on an ephemeral port with in-memory adapters and one
//! registered sensor, and connects sensors to it over real WebSockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_node::{ProvisionedSensor, RelayContainer};
use sensor_gateway::adapters::{
    InMemoryLivenessStore, InMemoryResultStore, InMemorySensorDirectory, InMemoryTaskStore,
};
use sensor_gateway::{ConnectionRegistry, GatewayError, RelayConfig};
use shared_bus::{InMemoryTaskBus, TaskPublisher};
use shared_types::Sensor;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Client side of a sensor connection.
pub type SensorSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for any single wait in a scenario.
pub const WAIT: Duration = Duration::from_secs(5);

/// A running relay plus handles on all of its stores.
pub struct RelayHarness {
    pub addr: SocketAddr,
    pub config: RelayConfig,
    pub sensor: Sensor,
    pub token: String,
    pub bus: Arc<InMemoryTaskBus>,
    pub directory: Arc<InMemorySensorDirectory>,
    pub tasks: Arc<InMemoryTaskStore>,
    pub results: Arc<InMemoryResultStore>,
    pub liveness: Arc<InMemoryLivenessStore>,
    pub registry: Arc<ConnectionRegistry>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), GatewayError>>,
}

impl RelayHarness {
    /// Start a relay with default configuration.
    pub async fn start() -> Self {
        Self::start_with(RelayConfig::default()).await
    }

    /// Start a relay; one freshly minted sensor is added to `config`.
    pub async fn start_with(mut config: RelayConfig) -> Self {
        let minted = ProvisionedSensor::mint("edge-test", "lab").expect("mint sensor");
        config.sensors.push(minted.sensor.clone());

        let container = RelayContainer::new(config);
        let service = container.build_service().expect("build service");
        let registry = service.registry();
        let subscription = container.bus.subscribe(&container.config.bus.task_channel);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(service.serve(listener, subscription, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            config: container.config.clone(),
            sensor: minted.sensor,
            token: minted.token,
            bus: Arc::clone(&container.bus),
            directory: Arc::clone(&container.directory),
            tasks: Arc::clone(&container.tasks),
            results: Arc::clone(&container.results),
            liveness: Arc::clone(&container.liveness),
            registry,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Connect as the harness sensor using the `Authorization` header.
    pub async fn connect(&self) -> SensorSocket {
        let socket = self
            .try_connect(Some(&self.token), None)
            .await
            .expect("sensor admitted");
        self.wait_until("sensor registered", || {
            self.registry.get(&self.sensor.id).is_some()
        })
        .await;
        socket
    }

    /// Attempt an admission with an optional header token and version.
    pub async fn try_connect(
        &self,
        token: Option<&str>,
        version: Option<&str>,
    ) -> Result<SensorSocket, tokio_tungstenite::tungstenite::Error> {
        let mut request = self.ws_url().into_client_request()?;
        if let Some(token) = token {
            request.headers_mut().insert(
                "Authorization",
                HeaderValue::from_str(token).expect("header value"),
            );
        }
        if let Some(version) = version {
            request.headers_mut().insert(
                "SensorVersion",
                HeaderValue::from_str(version).expect("header value"),
            );
        }
        connect_async(request).await.map(|(socket, _)| socket)
    }

    /// Publish a raw payload on the task channel.
    pub async fn publish(&self, payload: Vec<u8>) {
        self.bus
            .publish(&self.config.bus.task_channel, payload)
            .await;
    }

    /// Liveness key of the harness sensor.
    pub fn liveness_key(&self) -> String {
        self.config.liveness.key_for(self.sensor.id)
    }

    /// Poll `condition` until it holds or [`WAIT`] passes.
    pub async fn wait_until<F>(&self, what: &str, condition: F)
    where
        F: Fn() -> bool,
    {
        let result = tokio::time::timeout(WAIT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(result.is_ok(), "timed out waiting for: {what}");
    }

    /// Signal shutdown and wait for the service to finish.
    pub async fn stop(mut self) -> Result<(), GatewayError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(WAIT * 2, self.handle)
            .await
            .expect("service stopped in time")
            .expect("service task joined")
    }
}

/// Send one JSON frame as text.
pub async fn send_json(socket: &mut SensorSocket, value: &serde_json::Value) {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .expect("frame sent");
}

/// Next text frame from the relay, skipping control frames.
pub async fn next_text(socket: &mut SensorSocket) -> Option<String> {
    let next = tokio::time::timeout(WAIT, async {
        while let Some(message) = socket.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                _ => return None,
            }
        }
        None
    })
    .await;
    next.unwrap_or(None)
}
