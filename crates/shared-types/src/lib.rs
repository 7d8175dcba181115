//! # Shared Types Crate
//!
//! Domain entities, wire envelopes and persisted record shapes for the probe
//! relay.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: task status codes live here and nowhere else;
//!   the external store depends on their exact numeric values.
//! - **Connection is Identity**: envelopes received from a sensor never carry
//!   an identity the relay trusts. The sensor id always comes from the
//!   authenticated connection.
//! - **Opaque Forwarding**: scheduled tasks are only partially decoded
//!   (`id`, `sensor_id`); the raw bytes are what reaches the sensor.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod probes;
pub mod records;

pub use entities::*;
pub use envelope::*;
pub use errors::*;
pub use records::*;
