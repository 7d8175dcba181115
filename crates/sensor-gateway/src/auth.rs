//! Sensor admission credentials.
//!
//! A sensor presents an HMAC-signed JWT whose `sensorId` claim names it. The
//! signing secret is per sensor, so validation runs in three phases:
//!
//! 1. Read the claims without checking the signature to learn the sensor id.
//! 2. Fetch that sensor's secret from the directory.
//! 3. Verify the signature (HS256/HS384/HS512 only) and the optional
//!    `exp`/`nbf` claims with that secret.
//!
//! The id from phase 1 is returned only after phase 3 succeeds.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared_types::SensorId;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::error::CredentialError;
use crate::ports::SensorDirectory;

/// Claim carrying the sensor id.
pub const SENSOR_ID_CLAIM: &str = "sensorId";

/// Header carrying the optional sensor build version.
pub const SENSOR_VERSION_HEADER: &str = "SensorVersion";

const SECRET_BYTES: usize = 32;

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims issued to a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorClaims {
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    /// Issued-at, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Validates admission tokens against the sensor directory.
pub struct CredentialValidator {
    directory: Arc<dyn SensorDirectory>,
}

impl CredentialValidator {
    pub fn new(directory: Arc<dyn SensorDirectory>) -> Self {
        Self { directory }
    }

    /// Authenticate a token and return the sensor it belongs to.
    pub async fn validate(&self, token: &str) -> Result<SensorId, CredentialError> {
        let sensor_id = unverified_sensor_id(token)?;

        let secret = match self.directory.find_sensor(sensor_id).await? {
            Some(sensor) if !sensor.secret.is_empty() => sensor.secret,
            Some(_) => {
                debug!(sensor_id = %sensor_id, "Sensor has no secret");
                return Err(CredentialError::UnknownSensor(sensor_id));
            }
            None => return Err(CredentialError::UnknownSensor(sensor_id)),
        };

        verify_signature(token, secret.as_bytes())?;
        Ok(sensor_id)
    }
}

/// Phase 1: the `sensorId` claim, signature unchecked.
fn unverified_sensor_id(token: &str) -> Result<SensorId, CredentialError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<serde_json::Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| CredentialError::MalformedToken(e.to_string()))?;

    let raw = data
        .claims
        .get(SENSOR_ID_CLAIM)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            CredentialError::MalformedToken(format!("{SENSOR_ID_CLAIM} claim missing or not a string"))
        })?;

    Uuid::parse_str(raw)
        .map_err(|e| CredentialError::MalformedToken(format!("{SENSOR_ID_CLAIM}: {e}")))
}

/// Phase 3: signature and time claims against the sensor's secret.
fn verify_signature(token: &str, secret: &[u8]) -> Result<(), CredentialError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.required_spec_claims.clear();
    validation.validate_aud = false;
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<serde_json::Value>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                CredentialError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => CredentialError::TokenExpired,
            ErrorKind::ImmatureSignature => CredentialError::TokenNotYetValid,
            _ => CredentialError::MalformedToken(e.to_string()),
        })
}

/// Freshly minted identity and secret for a new sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorCredentials {
    pub sensor_id: SensorId,
    pub secret: String,
}

impl SensorCredentials {
    /// New random sensor id and secret.
    pub fn generate() -> Self {
        let mut secret = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            sensor_id: Uuid::new_v4(),
            secret: URL_SAFE_NO_PAD.encode(secret),
        }
    }

    /// HS256 admission token for these credentials.
    pub fn signed_token(&self) -> Result<String, CredentialError> {
        issue_token(self.sensor_id, self.secret.as_bytes())
    }
}

/// Sign an HS256 admission token for a sensor.
pub fn issue_token(sensor_id: SensorId, secret: &[u8]) -> Result<String, CredentialError> {
    let claims = SensorClaims {
        sensor_id: sensor_id.to_string(),
        iat: Some(chrono::Utc::now().timestamp()),
        exp: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| CredentialError::Signing(e.to_string()))
}

/// Admission token of an upgrade request.
///
/// The `Authorization` header wins (raw token or `Bearer <token>`); the
/// `token` query parameter is the fallback for clients that cannot set
/// headers. Blank values count as absent.
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(strip_bearer)
        .filter(|v| !v.is_empty());

    from_header
        .or_else(|| query_token.map(str::trim).filter(|v| !v.is_empty()))
        .map(str::to_string)
}

/// Drop an optional `Bearer` scheme; a bare scheme leaves an empty token.
fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match value.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => value,
    }
}

/// Sensor build version from the upgrade request, if reported.
pub fn extract_sensor_version(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SENSOR_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
