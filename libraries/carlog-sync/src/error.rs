use thiserror::Error;

/// Errors that can occur during sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] carlog_storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Telemetry API error: {0}")]
    Client(#[from] carlog_client::ClientError),

    #[error("Geocoding error: {0}")]
    Geocode(#[from] carlog_geocode::GeocodeError),

    #[error("Sync already in progress for this vehicle")]
    AlreadySyncing,

    #[error("Sync was cancelled")]
    Cancelled,

    #[error("Invalid sync state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
