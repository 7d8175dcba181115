//! WebSocket transport for sensors.
//!
//! - `handler`: admission (token, validation, upgrade)
//! - `session`: per-connection read loop and close phase

pub mod handler;
pub mod session;

pub use handler::{admit_sensor, AdmissionQuery};
pub use session::{SensorSession, SessionEnd};
