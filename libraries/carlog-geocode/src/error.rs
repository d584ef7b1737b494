//! Error types for the geocoding subsystem.

use thiserror::Error;

/// Errors that can occur during geocoding.
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Geocoding service returned an error response
    #[error("Geocoding service error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Failed to parse a response body
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Invalid service URL
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// Storage error while draining the queue
    #[error("Storage error: {0}")]
    Storage(#[from] carlog_storage::StorageError),

    /// A drain run is already active
    #[error("Geocode drain already running")]
    AlreadyRunning,
}

/// Result type for geocoding operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;
