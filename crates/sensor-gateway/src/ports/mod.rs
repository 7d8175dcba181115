//! Ports (hexagonal boundaries) of the sensor gateway.

pub mod outbound;

pub use outbound::{
    Clock, FrameSink, LivenessStore, ResultStore, SensorDirectory, SystemClock, TaskStore,
};
