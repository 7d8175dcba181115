//! Handlers for inbound sensor frames.

pub mod capabilities;
pub mod task_result;
pub mod telemetry;

pub use capabilities::{
    DnsCapability, HttpCapability, IcmpCapability, TaskCapabilities, TaskCapability,
    TracerouteCapability,
};
pub use task_result::{TaskOutcome, TaskResultHandler};
pub use telemetry::TelemetryHandler;
