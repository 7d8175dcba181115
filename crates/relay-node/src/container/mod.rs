//! # Relay Container
//!
//! Owns the concrete adapters behind the gateway's ports and the task bus.
//! This build runs on the in-memory adapters; the sensor directory is seeded
//! from the `sensors` list of the configuration.

pub mod config;

pub use config::{load_config, load_config_with, CliOverrides};

use sensor_gateway::adapters::{
    InMemoryLivenessStore, InMemoryResultStore, InMemorySensorDirectory, InMemoryTaskStore,
};
use sensor_gateway::ports::SystemClock;
use sensor_gateway::{GatewayError, GatewayPorts, RelayConfig, SensorGatewayService};
use shared_bus::InMemoryTaskBus;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Adapters and bus of one relay process.
pub struct RelayContainer {
    pub config: RelayConfig,
    pub bus: Arc<InMemoryTaskBus>,
    pub directory: Arc<InMemorySensorDirectory>,
    pub tasks: Arc<InMemoryTaskStore>,
    pub results: Arc<InMemoryResultStore>,
    pub liveness: Arc<InMemoryLivenessStore>,
}

impl RelayContainer {
    pub fn new(config: RelayConfig) -> Self {
        let directory = Arc::new(InMemorySensorDirectory::with_sensors(
            config.sensors.iter().cloned(),
        ));
        info!(sensors = config.sensors.len(), "Sensor directory seeded");

        Self {
            bus: Arc::new(InMemoryTaskBus::with_capacity(config.bus.capacity)),
            directory,
            tasks: Arc::new(InMemoryTaskStore::new()),
            results: Arc::new(InMemoryResultStore::new()),
            liveness: Arc::new(InMemoryLivenessStore::new()),
            config,
        }
    }

    /// Port bundle for the gateway.
    pub fn ports(&self) -> GatewayPorts {
        GatewayPorts {
            directory: self.directory.clone(),
            tasks: self.tasks.clone(),
            results: self.results.clone(),
            liveness: self.liveness.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn build_service(&self) -> Result<SensorGatewayService, GatewayError> {
        SensorGatewayService::new(self.config.clone(), self.ports())
    }

    /// Serve sensors until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send,
    {
        let service = self.build_service()?;
        let subscription = self.bus.subscribe(&self.config.bus.task_channel);
        info!(channel = %self.config.bus.task_channel, "Subscribed to task bus");
        service.run(subscription, shutdown).await
    }
}
