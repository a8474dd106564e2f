//! Client-facing error taxonomy.
//!
//! Every failure path surfaces as exactly one `RelayError` variant, which
//! serializes to the JSON body the browser UI branches on by status code.
//! `details` is diagnostic free text only; clients must branch on `status`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire shape of every failure response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub status: u16,
}

/// One variant per client-facing error kind. No variant is retried, and
/// none escapes as anything but the JSON error body.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Image ID required")]
    MissingIdentifier,

    #[error("Request creation failed")]
    RequestConstruction { reason: String },

    #[error("Connection failed")]
    ConnectionFailure { reason: String },

    #[error("Request timeout")]
    Timeout { deadline_secs: u64 },

    #[error("Image not found")]
    NotFound { photo_id: String },

    #[error("Access denied")]
    AccessDenied { photo_id: String },

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Tempest API error")]
    UpstreamInternalError,

    #[error("Service unavailable")]
    UpstreamUnavailable,

    #[error("Unexpected error")]
    UnexpectedStatus { status: u16 },
}

impl RelayError {
    /// Stable machine-readable kind, used in per-request log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingIdentifier => "missing_identifier",
            RelayError::RequestConstruction { .. } => "request_construction_failure",
            RelayError::ConnectionFailure { .. } => "connection_failure",
            RelayError::Timeout { .. } => "timeout",
            RelayError::NotFound { .. } => "not_found",
            RelayError::AccessDenied { .. } => "access_denied",
            RelayError::AuthenticationRequired => "authentication_required",
            RelayError::UpstreamInternalError => "upstream_internal_error",
            RelayError::UpstreamUnavailable => "upstream_unavailable",
            RelayError::UnexpectedStatus { .. } => "unexpected_upstream_status",
        }
    }

    /// HTTP status sent to the client for this variant.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingIdentifier => StatusCode::BAD_REQUEST,
            RelayError::RequestConstruction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::ConnectionFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            RelayError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            RelayError::UpstreamInternalError => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            // Unmapped upstream codes pass through verbatim
            RelayError::UnexpectedStatus { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }

    /// Diagnostic elaboration for the `details` field.
    pub fn details(&self) -> Option<String> {
        match self {
            RelayError::MissingIdentifier => {
                Some("Please provide a valid image identifier".to_string())
            }
            RelayError::RequestConstruction { reason } => {
                Some(format!("Unable to create API request: {reason}"))
            }
            RelayError::ConnectionFailure { reason } => {
                Some(format!("Unable to connect to the Tempest API: {reason}"))
            }
            RelayError::Timeout { deadline_secs } => Some(format!(
                "The image request took too long to process (>{deadline_secs}s). \
                 The image may be very large."
            )),
            RelayError::NotFound { photo_id } => Some(format!(
                "The image ID '{photo_id}' was not found in the Tempest system"
            )),
            RelayError::AccessDenied { photo_id } => Some(format!(
                "You don't have permission to access image '{photo_id}'"
            )),
            RelayError::AuthenticationRequired => {
                Some("The request requires valid authentication credentials".to_string())
            }
            RelayError::UpstreamInternalError => {
                Some("The upstream image service is currently experiencing issues".to_string())
            }
            RelayError::UpstreamUnavailable => Some(
                "The Tempest API is temporarily unavailable. Please try again later.".to_string(),
            ),
            RelayError::UnexpectedStatus { status } => {
                Some(format!("Tempest API returned status {status}"))
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
