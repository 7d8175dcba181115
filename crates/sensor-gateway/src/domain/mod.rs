//! Domain types for the sensor gateway.
//!
//! Configuration, errors, and the in-process connection state.

pub mod config;
pub mod connection;
pub mod error;
pub mod registry;

// Re-exports for convenience
pub use config::{BusConfig, ConfigError, LivenessConfig, RelayConfig, ServerConfig};
pub use connection::SensorConnection;
pub use error::{
    AdmissionError, CredentialError, GatewayError, HandlerError, StoreError, TransportError,
};
pub use registry::ConnectionRegistry;
