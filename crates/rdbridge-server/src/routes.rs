// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upward HTTP surface — JSON routes consumed by the browser form UI.
//
// Capture outcomes always come back as a `CaptureResponse` body; the HTTP
// status only distinguishes "device absent" (503) and "device slow" (408)
// from other bridge-side failures (500). Device-reported failures are 200.

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use rdbridge_core::codes;
use rdbridge_core::error::BridgeError;
use rdbridge_core::types::{CaptureOptions, CaptureResponse, DeviceHealth, Modality};
use rdbridge_driver::DriverExchange;

use crate::state::AppState;

/// Build the router with every route, permissive CORS and request tracing.
pub fn router<E: DriverExchange + 'static>(state: AppState<E>) -> Router {
    Router::new()
        .route(
            "/api/captureFingerprint",
            get(capture_fingerprint::<E>).post(capture_fingerprint::<E>),
        )
        .route(
            "/api/captureIris",
            get(capture_iris::<E>).post(capture_iris::<E>),
        )
        .route(
            "/api/capturePhotograph",
            get(capture_photograph::<E>).post(capture_photograph::<E>),
        )
        .route("/api/deviceInfo", get(device_info::<E>))
        .route("/api/rdservice/status", get(rdservice_status::<E>))
        .route("/health", get(health::<E>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed request rendered as `{ success: false, error }`.
pub enum ApiError {
    Bridge(BridgeError),
    /// The request itself was unusable; the driver was never called.
    BadRequest(String),
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self::Bridge(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Bridge(err) => {
                let status = match &err {
                    BridgeError::UnknownModality(_) => StatusCode::NOT_FOUND,
                    BridgeError::Transport { class, .. } => {
                        status_code(codes::http_status_for_bridge_code(class.error_code()))
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };
        warn!(status = status.as_u16(), error = %message, "request failed");
        let body = json!({ "success": false, "error": message });
        (status, Json(body)).into_response()
    }
}

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Capture overrides, accepted from the query string and from a JSON body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureParams {
    /// Short form of `timeoutMs`.
    pub timeout: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub post_capture_timeout_ms: Option<u64>,
    pub page_count: Option<u32>,
    pub device_auth_key: Option<String>,
    pub device_auth_hash: Option<String>,
}

impl CaptureParams {
    /// Body fields win over query fields.
    fn into_options(self, body: Option<CaptureParams>) -> CaptureOptions {
        let body = body.unwrap_or_default();
        CaptureOptions {
            timeout_ms: body
                .timeout_ms
                .or(body.timeout)
                .or(self.timeout_ms)
                .or(self.timeout),
            post_capture_timeout_ms: body.post_capture_timeout_ms.or(self.post_capture_timeout_ms),
            page_count: body.page_count.or(self.page_count),
            device_auth_key: body.device_auth_key.or(self.device_auth_key),
            device_auth_hash: body.device_auth_hash.or(self.device_auth_hash),
        }
    }
}

/// An empty body means no overrides. Anything else must be a JSON object of
/// capture parameters, whatever the declared content type.
fn parse_capture_body(body: &[u8]) -> Result<Option<CaptureParams>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("invalid capture parameters: {e}")))
}

async fn capture<E: DriverExchange + 'static>(
    modality: Modality,
    state: AppState<E>,
    query: CaptureParams,
    body: Bytes,
) -> Result<Response, ApiError> {
    let opts = query.into_options(parse_capture_body(&body)?);
    let result = state.bridge.capture(modality, &opts).await?;
    let status = status_code(result.http_status());
    Ok((status, Json(CaptureResponse::from(&result))).into_response())
}

async fn capture_fingerprint<E: DriverExchange + 'static>(
    State(state): State<AppState<E>>,
    Query(query): Query<CaptureParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    capture(Modality::Fingerprint, state, query, body).await
}

async fn capture_iris<E: DriverExchange + 'static>(
    State(state): State<AppState<E>>,
    Query(query): Query<CaptureParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    capture(Modality::Iris, state, query, body).await
}

async fn capture_photograph<E: DriverExchange + 'static>(
    State(state): State<AppState<E>>,
    Query(query): Query<CaptureParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    capture(Modality::Photograph, state, query, body).await
}

// ---------------------------------------------------------------------------
// Device info, status and health
// ---------------------------------------------------------------------------

async fn device_info<E: DriverExchange + 'static>(
    State(state): State<AppState<E>>,
) -> Result<Response, ApiError> {
    let doc = state.bridge.device_info().await?;
    Ok(Json(json!({ "success": true, "data": doc })).into_response())
}

async fn rdservice_status<E: DriverExchange + 'static>(
    State(state): State<AppState<E>>,
) -> Result<Response, ApiError> {
    let status = state.bridge.rdservice_status().await?;
    Ok(Json(status).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RdServiceReport {
    connected: bool,
    url: Option<String>,
    response_time: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    service: String,
    timestamp: String,
    rdservice: RdServiceReport,
    devices: DeviceHealth,
}

async fn health<E: DriverExchange + 'static>(
    State(state): State<AppState<E>>,
) -> Result<Response, ApiError> {
    let (connection, devices) = state.bridge.probe_health().await?;
    let report = HealthReport {
        status: if connection.connected { "healthy" } else { "degraded" },
        service: state.service_name.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        rdservice: RdServiceReport {
            connected: connection.connected,
            url: connection.endpoint_used,
            response_time: connection.response_time_ms,
            error: connection.error,
        },
        devices,
    };
    Ok(Json(report).into_response())
}
