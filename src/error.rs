//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay core and its
//! HTTP collaborators. Each variant maps to a specific HTTP status code and
//! structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::relay::ViewerId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2002,
///     "message": "relay is stopped",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Relay error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | Relay state     | 409 Conflict / 503 / 504     |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 5000–5999 | Upstream feed   | 502 Bad Gateway / 503        |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A viewer with the same ID is already attached.
    #[error("viewer already attached: {0}")]
    DuplicateViewer(ViewerId),

    /// The coordinator is stopping or stopped and accepts no more work.
    #[error("relay is stopped")]
    Stopped,

    /// A single write to a viewer or replay stream failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Waiting on the coordinator exceeded the configured deadline.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream feed rejected or failed an operation.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// No upstream connection is available.
    #[error("upstream feed not connected")]
    UpstreamUnavailable,

    /// Configuration is missing or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::DuplicateViewer(_) => 2001,
            Self::Stopped => 2002,
            Self::Timeout(_) => 2003,
            Self::Internal(_) => 3000,
            Self::WriteFailed(_) => 3001,
            Self::Config(_) => 3002,
            Self::Upstream(_) => 5001,
            Self::UpstreamUnavailable => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateViewer(_) => StatusCode::CONFLICT,
            Self::Stopped | Self::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::WriteFailed(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn stopped_maps_to_service_unavailable() {
        let err = RelayError::Stopped;
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), 2002);
    }

    #[test]
    fn duplicate_viewer_is_conflict() {
        let err = RelayError::DuplicateViewer(ViewerId::new());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().starts_with("viewer already attached"));
    }

    #[test]
    fn config_errors_are_server_side() {
        let err = RelayError::Config("MAILBOX_CAPACITY out of range".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), 3002);
    }

    #[test]
    fn into_response_carries_status() {
        let response = RelayError::Upstream("broker down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
