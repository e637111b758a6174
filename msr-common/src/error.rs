//! Common error types for MSR services
//!
//! One closed taxonomy shared by every module. HTTP and WebSocket surfaces
//! serialize errors as `{kind, message, hint?, trace_id}`; the `internal`
//! kind is surfaced opaquely (message replaced) so invariant violations never
//! leak details to clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for MSR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across MSR services
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed payload or out-of-range value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Absent session, document, device, or path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or bad credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Per-subject daily limit exhausted
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Device lacks the required capability
    #[error("Incompatible: {0}")]
    Incompatible(String),

    /// Deadline elapsed on a dependency call
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Dependency refused or returned an error
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invariant violated (bug); logged loudly, surfaced opaquely
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wire-format kind string for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::QuotaExceeded(_) => "quota_exceeded",
            Error::Incompatible(_) => "incompatible",
            Error::Timeout(_) => "timeout",
            Error::UpstreamUnavailable(_) => "upstream_unavailable",
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                "internal"
            }
        }
    }

    /// Whether the error may be retried by a caller
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::UpstreamUnavailable(_))
    }

    /// Build the client-facing body for this error.
    ///
    /// Internal kinds are replaced with an opaque message; the generated
    /// `trace_id` correlates the response with server logs.
    pub fn to_body(&self) -> ErrorBody {
        let trace_id = uuid::Uuid::new_v4().to_string();
        let (message, hint) = match self.kind() {
            "internal" => {
                tracing::error!(trace_id = %trace_id, error = %self, "internal error");
                ("internal error".to_string(), None)
            }
            _ => (self.to_string(), self.hint()),
        };
        ErrorBody {
            kind: self.kind().to_string(),
            message,
            hint,
            trace_id,
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            Error::Unauthorized(_) => {
                Some("supply X-API-Key or a bearer token".to_string())
            }
            Error::QuotaExceeded(_) => Some("daily limit resets at midnight UTC".to_string()),
            _ => None,
        }
    }
}

/// Client-facing error body
///
/// Every HTTP error response and WebSocket error frame carries this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub trace_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(Error::InvalidArgument("x".into()).kind(), "invalid_argument");
        assert_eq!(Error::NotFound("x".into()).kind(), "not_found");
        assert_eq!(Error::Unauthorized("x".into()).kind(), "unauthorized");
        assert_eq!(Error::QuotaExceeded("x".into()).kind(), "quota_exceeded");
        assert_eq!(Error::Incompatible("x".into()).kind(), "incompatible");
        assert_eq!(Error::Timeout("x".into()).kind(), "timeout");
        assert_eq!(
            Error::UpstreamUnavailable("x".into()).kind(),
            "upstream_unavailable"
        );
        assert_eq!(Error::Internal("x".into()).kind(), "internal");
    }

    #[test]
    fn test_internal_body_is_opaque() {
        let body = Error::Internal("lock poisoned in session store".into()).to_body();
        assert_eq!(body.kind, "internal");
        assert_eq!(body.message, "internal error");
        assert!(!body.trace_id.is_empty());
    }

    #[test]
    fn test_client_error_body_keeps_message() {
        let body = Error::NotFound("session abc".into()).to_body();
        assert_eq!(body.kind, "not_found");
        assert!(body.message.contains("session abc"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout("t".into()).is_transient());
        assert!(Error::UpstreamUnavailable("u".into()).is_transient());
        assert!(!Error::Incompatible("i".into()).is_transient());
        assert!(!Error::Unauthorized("a".into()).is_transient());
    }
}
