//! Error taxonomy of the sensor gateway.
//!
//! Scope of each error:
//! - [`AdmissionError`]: one upgrade request, mapped to an HTTP status
//! - [`CredentialError`]: one token validation
//! - [`HandlerError`]: one inbound frame or one bus message
//! - [`StoreError`], [`TransportError`]: a single port call
//! - [`GatewayError`]: the service as a whole

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared_types::{DecodeError, SensorId};
use std::time::Duration;
use thiserror::Error;

/// A store, directory or liveness port call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    /// The backend rejected or could not serve the call
    #[error("store backend: {0}")]
    Backend(String),
    /// A value could not be encoded for storage
    #[error("store serialization: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Writing to or closing a sensor transport failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("close failed: {0}")]
    Close(String),
    /// The transport was already closed
    #[error("transport closed")]
    Closed,
}

/// Token validation outcome other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Not a JWT, or the `sensorId` claim is missing or not a UUID
    #[error("malformed token: {0}")]
    MalformedToken(String),
    /// No such sensor, or the sensor has no secret
    #[error("unknown sensor {0}")]
    UnknownSensor(SensorId),
    /// Signature mismatch or a non-HMAC algorithm
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    TokenNotYetValid,
    /// The sensor directory could not be consulted
    #[error("sensor directory: {0}")]
    Store(#[from] StoreError),
    /// A token could not be issued
    #[error("token signing: {0}")]
    Signing(String),
}

/// Rejection of a sensor's upgrade request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("missing admission token")]
    MissingToken,
    #[error("credential rejected: {0}")]
    Credential(#[from] CredentialError),
    #[error("upgrade failed: {0}")]
    Upgrade(String),
}

impl AdmissionError {
    /// HTTP status returned to the sensor.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::BAD_REQUEST,
            Self::Credential(_) => StatusCode::UNAUTHORIZED,
            Self::Upgrade(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label for the admissions metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::Credential(_) => "unauthorized",
            Self::Upgrade(_) => "upgrade_failed",
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        // Credential details stay in the logs
        let body = match &self {
            Self::MissingToken => "missing token",
            Self::Credential(_) => "unauthorized",
            Self::Upgrade(_) => "upgrade failed",
        };
        (self.status_code(), body).into_response()
    }
}

/// Failure while handling one frame or bus message.
///
/// Never tears down the connection or the bus listener.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("unknown message kind {0}")]
    UnknownKind(i64),
    #[error("unknown task type {0:?}")]
    UnknownTaskType(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Service-level errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Bind error
    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),
    /// Server error
    #[error("Server error: {0}")]
    Server(String),
    /// In-flight work did not finish in time
    #[error("Graceful shutdown exceeded {0:?}")]
    ShutdownTimeout(Duration),
}
