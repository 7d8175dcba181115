//! Sensor admission over WebSocket upgrade.
//!
//! Checks run in order: token present (400), token valid (401), request
//! upgradable (500). Nothing is registered until all three pass.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use relay_telemetry::ADMISSIONS;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::WsFrameSink;
use crate::auth::{extract_sensor_version, extract_token};
use crate::domain::connection::SensorConnection;
use crate::domain::error::AdmissionError;
use crate::service::GatewayState;
use crate::ws::session::SensorSession;

/// Query parameters accepted on the admission route.
#[derive(Debug, Default, Deserialize)]
pub struct AdmissionQuery {
    /// Fallback for clients that cannot set the `Authorization` header
    pub token: Option<String>,
}

/// `GET /`: admit a sensor and start its session.
pub async fn admit_sensor(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    query: Option<Query<AdmissionQuery>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let query_token = query.as_ref().and_then(|q| q.token.as_deref());

    match admit(state, &headers, query_token, upgrade).await {
        Ok(response) => {
            ADMISSIONS.with_label_values(&["admitted"]).inc();
            response
        }
        Err(e) => {
            ADMISSIONS.with_label_values(&[e.outcome()]).inc();
            warn!(error = %e, status = %e.status_code(), "Sensor admission rejected");
            e.into_response()
        }
    }
}

async fn admit(
    state: Arc<GatewayState>,
    headers: &HeaderMap,
    query_token: Option<&str>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AdmissionError> {
    let token = extract_token(headers, query_token).ok_or(AdmissionError::MissingToken)?;
    let sensor_id = state.validator.validate(&token).await?;
    let upgrade = upgrade.map_err(|e| AdmissionError::Upgrade(e.body_text()))?;

    let sensor_version = extract_sensor_version(headers);
    debug!(sensor_id = %sensor_id, "Sensor authenticated, upgrading");

    let response = upgrade
        .on_failed_upgrade(move |e| {
            warn!(sensor_id = %sensor_id, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            let conn = SensorConnection::new(
                sensor_id,
                sensor_version,
                Arc::new(WsFrameSink::new(sink)),
            );
            let session = SensorSession::open(
                conn,
                Arc::clone(&state.registry),
                Arc::clone(&state.router),
                Arc::clone(&state.liveness),
                state.max_message_size,
            )
            .await;
            session.run(stream, state.shutdown.clone()).await;
        });

    Ok(response.into_response())
}
