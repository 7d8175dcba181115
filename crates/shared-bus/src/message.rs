//! # Bus Messages
//!
//! A message on the task-distribution bus: a channel name and an opaque
//! payload. The bus never inspects the payload.

use std::fmt;

/// A message published on a named channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Channel the message was published on.
    pub channel: String,
    /// Raw payload bytes, delivered unchanged to every subscriber.
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Build a message for a channel.
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.channel, self.payload.len())
    }
}
