//! Adapters for the sensor gateway.
//!
//! Infrastructure implementations of the ports: in-memory stores, the
//! WebSocket frame sink, and a recording sink for tests.

mod error_conversions;
pub mod memory;
pub mod recording;
pub mod ws_sink;

pub use memory::{
    FixedClock, InMemoryLivenessStore, InMemoryResultStore, InMemorySensorDirectory,
    InMemoryTaskStore,
};
pub use recording::RecordingSink;
pub use ws_sink::WsFrameSink;
