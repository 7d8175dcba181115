//! Sensor gateway service: wiring, HTTP routes and lifecycle.
//!
//! Routes:
//! - `GET /`: sensor admission (WebSocket upgrade)
//! - `GET /health`: liveness probe with the connected sensor count
//! - `GET /metrics`: Prometheus text exposition

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use relay_telemetry::{encode_metrics, register_metrics};
use shared_bus::MessageSubscription;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::CredentialValidator;
use crate::domain::config::RelayConfig;
use crate::domain::error::GatewayError;
use crate::domain::registry::ConnectionRegistry;
use crate::handlers::{TaskCapabilities, TaskResultHandler, TelemetryHandler};
use crate::liveness::LivenessPublisher;
use crate::ports::{Clock, LivenessStore, ResultStore, SensorDirectory, TaskStore};
use crate::router::MessageRouter;
use crate::scheduler::BusListener;
use crate::ws::admit_sensor;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// External collaborators of the gateway.
#[derive(Clone)]
pub struct GatewayPorts {
    pub directory: Arc<dyn SensorDirectory>,
    pub tasks: Arc<dyn TaskStore>,
    pub results: Arc<dyn ResultStore>,
    pub liveness: Arc<dyn LivenessStore>,
    pub clock: Arc<dyn Clock>,
}

/// State shared by the HTTP handlers.
pub struct GatewayState {
    pub validator: CredentialValidator,
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<MessageRouter>,
    pub liveness: Arc<LivenessPublisher>,
    pub max_message_size: usize,
    /// Flips to `true` once; read loops exit on it
    pub shutdown: watch::Receiver<bool>,
}

/// The relay's sensor-facing service.
pub struct SensorGatewayService {
    config: RelayConfig,
    registry: Arc<ConnectionRegistry>,
    state: Arc<GatewayState>,
    bus_listener: Arc<BusListener>,
    shutdown_tx: watch::Sender<bool>,
}

impl SensorGatewayService {
    /// Build the service with the built-in task types.
    pub fn new(config: RelayConfig, ports: GatewayPorts) -> Result<Self, GatewayError> {
        Self::with_capabilities(config, ports, TaskCapabilities::with_defaults())
    }

    /// Build the service with a custom task capability table.
    pub fn with_capabilities(
        config: RelayConfig,
        ports: GatewayPorts,
        capabilities: TaskCapabilities,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        register_metrics().map_err(|e| GatewayError::Config(e.to_string()))?;

        let registry = Arc::new(ConnectionRegistry::new());
        let liveness = Arc::new(LivenessPublisher::new(
            ports.liveness,
            config.liveness.clone(),
        ));

        let task_results = Arc::new(TaskResultHandler::new(
            Arc::clone(&ports.tasks),
            Arc::clone(&ports.results),
            Arc::clone(&ports.clock),
            capabilities,
        ));
        let telemetry = Arc::new(TelemetryHandler::new(
            ports.results,
            Arc::clone(&liveness),
            ports.clock,
        ));
        let router = Arc::new(MessageRouter::new(task_results, telemetry));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = Arc::new(GatewayState {
            validator: CredentialValidator::new(ports.directory),
            registry: Arc::clone(&registry),
            router,
            liveness,
            max_message_size: config.server.max_message_size,
            shutdown: shutdown_rx,
        });

        let bus_listener = Arc::new(BusListener::new(Arc::clone(&registry), ports.tasks));

        Ok(Self {
            config,
            registry,
            state,
            bus_listener,
            shutdown_tx,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Connections currently owned by this instance.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Build the HTTP router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(admit_sensor))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_text))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<S, F>(self, subscription: S, shutdown: F) -> Result<(), GatewayError>
    where
        S: MessageSubscription + 'static,
        F: Future<Output = ()> + Send,
    {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "Sensor gateway listening");
        self.serve(listener, subscription, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// On shutdown every read loop and the bus listener are signalled, then
    /// the server, the listener and all sessions must finish within the
    /// configured deadline.
    pub async fn serve<S, F>(
        self,
        listener: TcpListener,
        subscription: S,
        shutdown: F,
    ) -> Result<(), GatewayError>
    where
        S: MessageSubscription + 'static,
        F: Future<Output = ()> + Send,
    {
        let app = self.router();

        let mut server_shutdown = self.shutdown_tx.subscribe();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.wait_for(|stop| *stop).await;
                })
                .await
        });

        let bus_listener = Arc::clone(&self.bus_listener);
        let bus_shutdown = self.shutdown_tx.subscribe();
        let bus = tokio::spawn(async move { bus_listener.run(subscription, bus_shutdown).await });

        info!("Sensor gateway started");

        tokio::select! {
            result = &mut server => {
                self.shutdown_tx.send_replace(true);
                let reason = match result {
                    Ok(Ok(())) => "server exited".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => e.to_string(),
                };
                error!(error = %reason, "HTTP server stopped unexpectedly");
                let _ = bus.await;
                return Err(GatewayError::Server(reason));
            }
            _ = shutdown => {
                info!("Received shutdown signal");
            }
        }

        self.shutdown_tx.send_replace(true);

        let deadline = self.config.shutdown_timeout;
        let registry = Arc::clone(&self.registry);
        let drained = tokio::time::timeout(deadline, async move {
            let server_result = server.await;
            let _ = bus.await;
            while !registry.is_empty() {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
            server_result
        })
        .await;

        match drained {
            Ok(Ok(Ok(()))) => {
                info!("Sensor gateway stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(GatewayError::Server(e.to_string())),
            Ok(Err(e)) => Err(GatewayError::Server(e.to_string())),
            Err(_) => {
                warn!(
                    timeout_ms = deadline.as_millis() as u64,
                    remaining = self.registry.len(),
                    "Graceful shutdown timed out"
                );
                Err(GatewayError::ShutdownTimeout(deadline))
            }
        }
    }

    /// Signal shutdown without waiting for it.
    pub fn trigger_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

async fn health_check(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connected_sensors": state.registry.len(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics_text() -> Response {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
