// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Sensor Gateway - telemetry and command relay for remote probe sensors.
//!
//! Sensors dial in over WebSocket, authenticate with a per-sensor signed
//! token and then stream task results and host telemetry. The scheduler
//! publishes new tasks on a bus; every relay instance listens and forwards
//! the tasks of the sensors it holds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              SENSOR GATEWAY                                 │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐        ┌──────────────────┐        ┌─────────────┐         │
//! │  │  Admission  │ ─put─▶ │    Connection    │ ◀─get─ │ Bus Listener│ ◀── Bus │
//! │  │   (GET /)   │        │     Registry     │        │             │         │
//! │  └──────┬──────┘        └──────────────────┘        └──────┬──────┘         │
//! │         │ session                                          │ status 3, 4    │
//! │  ┌──────┴──────┐        ┌──────────────────┐               │                │
//! │  │  Read Loop  │ ─────▶ │  Message Router  │               │                │
//! │  └─────────────┘        └────┬────────┬────┘               │                │
//! │                              │        │                    │                │
//! │                  ┌───────────┴──┐  ┌──┴──────────┐         │                │
//! │                  │ Task Results │  │  Telemetry  │         │                │
//! │                  └───────┬──────┘  └──────┬──────┘         │                │
//! └──────────────────────────┼────────────────┼────────────────┼────────────────┘
//!                            ▼                ▼                ▼
//!                 TaskStore / ResultStore   LivenessStore   TaskStore
//! ```
//!
//! # Task Status Flow
//!
//! `NEW(1)` → `RECEIVED_BY_SERVER(3)` → `SENT_TO_SENSOR_BY_SERVER(4)` →
//! `RESULTS_RECEIVED_BY_SERVER(7)` → `DONE(8)` or `ERROR(9)`
//!
//! # Usage
//!
//! ```ignore
//! use sensor_gateway::{GatewayPorts, RelayConfig, SensorGatewayService};
//!
//! let service = SensorGatewayService::new(RelayConfig::default(), ports)?;
//! service.run(subscription, shutdown_signal()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod auth;
pub mod domain;
pub mod handlers;
pub mod liveness;
pub mod ports;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod ws;

// Re-exports
pub use auth::{extract_token, issue_token, CredentialValidator, SensorCredentials};
pub use domain::{
    AdmissionError, BusConfig, ConfigError, ConnectionRegistry, CredentialError, GatewayError,
    HandlerError, LivenessConfig, RelayConfig, SensorConnection, ServerConfig, StoreError,
    TransportError,
};
pub use handlers::{TaskCapabilities, TaskCapability, TaskOutcome};
pub use liveness::LivenessPublisher;
pub use router::MessageRouter;
pub use scheduler::{BusListener, ForwardOutcome};
pub use service::{GatewayPorts, GatewayState, SensorGatewayService};
