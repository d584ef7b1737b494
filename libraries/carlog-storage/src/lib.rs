//! Carlog Storage
//!
//! `SQLite` persistence layer for the Carlog telemetry mirror.
//!
//! This crate stores everything the sync and geocoding pipeline needs to be
//! resumable across process death: summary rows, derived aggregates, the
//! geocode cache and queue, progress counters, and per-car sync cursors.
//!
//! # Architecture
//!
//! - **Vertical slicing**: each table owns its queries in its own module
//! - **Idempotent writes**: every write is an upsert or a scoped update, so
//!   re-running any pipeline stage is safe
//! - **Offline-first**: readers see whatever is currently persisted; no
//!   query blocks on sync completion
//!
//! # Example
//!
//! ```rust,no_run
//! use carlog_storage::{create_pool, run_migrations};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool("sqlite://carlog.db").await?;
//! run_migrations(&pool).await?;
//!
//! let pending = carlog_storage::geocode_queue::count_pending(&pool).await?;
//! # Ok(())
//! # }
//! ```

mod error;

// Vertical slices
pub mod aggregates;
pub mod charges;
pub mod drives;
pub mod geocode_cache;
pub mod geocode_progress;
pub mod geocode_queue;
pub mod sync_state;

pub use error::StorageError;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// This should be called once when the application starts to ensure
/// the database schema is up to date.
///
/// # Errors
///
/// Returns an error if migrations fail to run
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://carlog.db>`)
///
/// # Errors
///
/// Returns an error if the connection fails
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true) // Create database file if it doesn't exist
        .journal_mode(SqliteJournalMode::Wal) // Use WAL mode for better concurrency
        .busy_timeout(std::time::Duration::from_secs(30)); // Wait up to 30s for locks

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
