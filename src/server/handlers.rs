//! HTTP handlers and error responses.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check endpoint
//! - anything else not answered by the image pipeline - `404` JSON error

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{EngineError, FailureCause, PipelineError};

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_signature")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Conversion
// =============================================================================

/// Status and error type for a failure re-raised in debug mode.
fn classify_failure(cause: &FailureCause) -> (StatusCode, &'static str) {
    if cause.is_not_found() {
        return (StatusCode::NOT_FOUND, "not_found");
    }

    match cause {
        FailureCause::Engine(EngineError::InvalidParam { .. }) => {
            (StatusCode::BAD_REQUEST, "invalid_param")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error"),
    }
}

/// Convert PipelineError to HTTP response.
///
/// Unhandled failures answer `500 response_failure` without detail; debug
/// mode exposes the cause.
impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            PipelineError::Signature(err) => return err.into_response(),

            PipelineError::ResponseFailure(cause) => {
                error!(
                    error_type = "response_failure",
                    status = 500u16,
                    cause = %cause,
                    "Unhandled failure"
                );
                // The cause stays in the log; the client gets the generic message.
                let message = PipelineError::ResponseFailure(cause).to_string();
                (StatusCode::INTERNAL_SERVER_ERROR, "response_failure", message)
            }

            PipelineError::Failure(cause) => {
                let (status, error_type) = classify_failure(&cause);
                if status.is_server_error() {
                    error!(
                        error_type = error_type,
                        status = status.as_u16(),
                        "Server error: {}",
                        cause
                    );
                } else if status == StatusCode::NOT_FOUND {
                    debug!(
                        error_type = error_type,
                        status = status.as_u16(),
                        "Resource not found: {}",
                        cause
                    );
                } else {
                    warn!(
                        error_type = error_type,
                        status = status.as_u16(),
                        "Client error: {}",
                        cause
                    );
                }
                (status, error_type, cause.to_string())
            }
        };

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Next handler in the chain: requests the pipeline forwards land here.
pub async fn fallback_handler(uri: Uri) -> Response {
    debug!(path = %uri.path(), "No handler");

    let status = StatusCode::NOT_FOUND;
    let error_response =
        ErrorResponse::with_status("not_found", format!("No route for {}", uri.path()), status);
    (status, Json(error_response)).into_response()
}

// =============================================================================
// Tests
// =============================================================================
