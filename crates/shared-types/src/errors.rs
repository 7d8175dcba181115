//! # Error Types
//!
//! Decoding errors shared by the wire envelopes and the probe payloads.

use thiserror::Error;

/// A frame, envelope or probe payload could not be decoded.
///
/// Always scoped to a single message: the connection or bus subscription that
/// delivered it keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The envelope is not valid JSON or misses required fields.
    #[error("malformed envelope: {0}")]
    Envelope(String),

    /// The envelope carries no result payload.
    #[error("task result payload is missing")]
    MissingResult,

    /// The result payload is neither JSON nor base64-encoded JSON.
    #[error("result payload encoding: {0}")]
    ResultEncoding(String),

    /// The kind-specific payload does not match the declared task type.
    #[error("{task_name} result payload: {reason}")]
    Payload { task_name: String, reason: String },
}

impl DecodeError {
    /// Build a payload error for a task type.
    pub fn payload(task_name: &str, reason: impl ToString) -> Self {
        Self::Payload {
            task_name: task_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
