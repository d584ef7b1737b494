//! Error types for the telemetry client.

use thiserror::Error;

/// Errors that can occur when talking to the telemetry backend.
///
/// Expected failure paths (auth, missing endpoint, timeouts) are variants,
/// never panics, so the sync engine can route each to its retry policy.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Endpoint does not exist on this backend (HTTP 404).
    /// Permanent for the session: callers stop polling it.
    #[error("Endpoint not supported by server: {0}")]
    Unsupported(String),

    /// Authentication required or rejected (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse a response body
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    Unreachable(String),
}

impl ClientError {
    /// Whether retrying later could succeed. 404 and auth failures are
    /// permanent for the session; transport and 5xx errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Unsupported(_) | Self::AuthFailed(_) | Self::InvalidUrl(_))
    }
}

/// Result type for telemetry client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
