//! Error conversions from infrastructure types.
//!
//! These conversions involve I/O types and belong in the adapters layer.

use crate::domain::error::{StoreError, TransportError};

impl From<axum::Error> for TransportError {
    fn from(e: axum::Error) -> Self {
        TransportError::Send(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
