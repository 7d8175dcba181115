//! # End-to-End Scenarios
//!
//! Each module drives a relay started by [`crate::harness::RelayHarness`]
//! through real sockets.

pub mod admission;
pub mod bus_forwarding;
pub mod shutdown;
pub mod task_flow;
