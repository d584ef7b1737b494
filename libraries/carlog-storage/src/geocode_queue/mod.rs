//! Geocode queue storage
//!
//! Manages the durable queue of grid cells waiting for reverse geocoding.
//!
//! A cell has at most one queue row: enqueue is insert-if-absent, so a cell
//! already queued (or already resolved into the cache) is never re-queued.
//! Items that fail [`MAX_ATTEMPTS`] times are parked: excluded from batches
//! but kept for visibility until explicitly reset or cleared.
//!
//! # Example
//!
//! ```rust,no_run
//! use carlog_storage::geocode_queue::{self, NewQueueItem};
//! use carlog_core::GridCell;
//!
//! # async fn example(pool: &sqlx::SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
//! // Enqueue a cell discovered during detail sync
//! let cell = GridCell::from_coords(45.001, 9.001);
//! geocode_queue::enqueue(pool, &NewQueueItem::new(cell, 1, 45.001, 9.001, 1700000000)).await?;
//!
//! // Drain one item
//! if let Some(item) = geocode_queue::next_batch(pool, 1).await?.into_iter().next() {
//!     // Resolve it...
//!     geocode_queue::remove(pool, item.cell()).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::StorageError;
use carlog_core::{CarId, GridCell};
use sqlx::SqlitePool;

type Result<T> = std::result::Result<T, StorageError>;

/// Attempt budget before an item is parked as failed.
pub const MAX_ATTEMPTS: i64 = 3;

/// A pending lookup request for one grid cell.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct GeocodeQueueItem {
    pub grid_lat: i32,
    pub grid_lon: i32,
    /// Vehicle that first enqueued the cell, for progress attribution.
    pub car_id: CarId,
    /// First-seen precise coordinate, used for the actual lookup.
    pub latitude: f64,
    pub longitude: f64,
    pub added_at: i64,
    pub attempts: i64,
    pub last_attempt_at: Option<i64>,
}

impl GeocodeQueueItem {
    /// The grid cell this item belongs to.
    #[must_use]
    pub fn cell(&self) -> GridCell {
        GridCell {
            lat: self.grid_lat,
            lon: self.grid_lon,
        }
    }
}

/// A queue insert request.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub cell: GridCell,
    pub car_id: CarId,
    pub latitude: f64,
    pub longitude: f64,
    pub added_at: i64,
}

impl NewQueueItem {
    /// Build an insert request for a cell and its representative coordinate.
    #[must_use]
    pub fn new(cell: GridCell, car_id: CarId, latitude: f64, longitude: f64, added_at: i64) -> Self {
        Self {
            cell,
            car_id,
            latitude,
            longitude,
            added_at,
        }
    }
}

/// Insert a cell if absent. Returns `true` when a new row was created,
/// `false` when the cell was already queued.
pub async fn enqueue(pool: &SqlitePool, item: &NewQueueItem) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO geocode_queue (grid_lat, grid_lon, car_id, latitude, longitude, added_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(grid_lat, grid_lon) DO NOTHING
        "#,
    )
    .bind(item.cell.lat)
    .bind(item.cell.lon)
    .bind(item.car_id)
    .bind(item.latitude)
    .bind(item.longitude)
    .bind(item.added_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Oldest pending items first (FIFO by enqueue time), excluding parked ones.
pub async fn next_batch(pool: &SqlitePool, limit: i64) -> Result<Vec<GeocodeQueueItem>> {
    let rows = sqlx::query_as::<_, GeocodeQueueItem>(
        r#"
        SELECT * FROM geocode_queue
        WHERE attempts < ?
        ORDER BY added_at ASC
        LIMIT ?
        "#,
    )
    .bind(MAX_ATTEMPTS)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Remove a resolved cell from the queue.
pub async fn remove(pool: &SqlitePool, cell: GridCell) -> Result<()> {
    sqlx::query("DELETE FROM geocode_queue WHERE grid_lat = ? AND grid_lon = ?")
        .bind(cell.lat)
        .bind(cell.lon)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a failed lookup: bump the attempt counter and timestamp.
pub async fn mark_attempt(pool: &SqlitePool, cell: GridCell, timestamp: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE geocode_queue
        SET attempts = attempts + 1, last_attempt_at = ?
        WHERE grid_lat = ? AND grid_lon = ?
        "#,
    )
    .bind(timestamp)
    .bind(cell.lat)
    .bind(cell.lon)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count of items still eligible for draining.
pub async fn count_pending(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM geocode_queue WHERE attempts < ?")
        .bind(MAX_ATTEMPTS)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Count of parked items (attempt budget exhausted).
pub async fn count_failed(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM geocode_queue WHERE attempts >= ?")
        .bind(MAX_ATTEMPTS)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Count of all queue rows, parked included.
pub async fn count_total(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM geocode_queue")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Remove every parked item permanently.
pub async fn clear_failed(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM geocode_queue WHERE attempts >= ?")
        .bind(MAX_ATTEMPTS)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Zero the attempt counters of parked items so they drain again.
pub async fn reset_failed(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE geocode_queue SET attempts = 0, last_attempt_at = NULL WHERE attempts >= ?",
    )
    .bind(MAX_ATTEMPTS)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Drop the queue rows a vehicle enqueued (for full resync). Cells queued by
/// other vehicles are untouched.
pub async fn clear_for_car(pool: &SqlitePool, car_id: CarId) -> Result<u64> {
    let result = sqlx::query("DELETE FROM geocode_queue WHERE car_id = ?")
        .bind(car_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
