//! Service error types with HTTP status code mapping.
//!
//! [`VigilError`] is the central error type. HTTP handlers return it
//! directly; each variant maps to a status code and a structured JSON
//! error body. Ingest-path callers log and absorb it instead — nothing
//! inside a single event's pipeline may bring the service down.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "message": "invalid request: limit must be between 1 and 200",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with a human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Event with the given id was not found.
    #[error("event not found: {0}")]
    EventNotFound(crate::domain::EventId),

    /// Database failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Redis bus failure (publish, subscribe, or connection).
    #[error("event bus error: {0}")]
    Bus(String),

    /// Job queue failure (scheduling, enqueue, or consume).
    #[error("job queue error: {0}")]
    Queue(String),

    /// Invalid or missing configuration at boot.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::EventNotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_)
            | Self::Bus(_)
            | Self::Queue(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for VigilError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for VigilError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // 5xx details stay in the logs; clients get a generic body.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            error: ErrorBody {
                message,
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
