//! # Probe Relay Node
//!
//! Process wiring for the probe relay.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration loading and the adapters behind each port
//! - `provisioning` - Credentials for new sensors
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging, metrics registry)
//! 2. Load configuration (defaults, file, env, flags) and validate it
//! 3. Build adapters and seed the sensor directory
//! 4. Subscribe to the task bus and start the gateway
//! 5. On SIGTERM or Ctrl+C, drain within `shutdown_timeout`

pub mod container;
pub mod provisioning;

pub use container::{load_config, CliOverrides, RelayContainer};
pub use provisioning::ProvisionedSensor;
