//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use telemetry::HealthReport;

/// Acknowledgment for an ingested batch. Not a persistence guarantee.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    /// Records accepted for dispatch
    pub received: usize,
    /// Records rejected by validation or tenant resolution
    pub skipped: usize,
    /// Records beyond the batch cap, dropped unread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<usize>,
    pub timestamp: i64,
}

impl IngestResponse {
    pub fn new(received: usize, skipped: usize, truncated: usize) -> Self {
        Self {
            success: true,
            received,
            skipped,
            truncated: (truncated > 0).then_some(truncated),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub report: HealthReport,
    pub fallback_depth: usize,
    pub failed_jobs: u64,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// API error type with coded responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<engine_core::Error> for ApiError {
    fn from(err: engine_core::Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &err {
            engine_core::Error::ValidationWithCode { message, .. }
            | engine_core::Error::Tenant { message, .. }
            | engine_core::Error::Storage { message, .. } => message.clone(),
            _ => err.to_string(),
        };
        let code = err.error_code().unwrap_or("INTERNAL");
        ApiError::with_code(status, code, message)
    }
}
