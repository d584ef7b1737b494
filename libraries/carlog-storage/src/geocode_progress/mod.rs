//! Geocode progress storage
//!
//! Per-vehicle counters backing the "locations identified" percentage.
//! Kept separate from the queue because queue rows disappear when resolved,
//! while the percentage needs "total ever enqueued".
//!
//! Counter mutations are single atomic UPDATEs; both counters only grow
//! between explicit resets.

use crate::StorageError;
use carlog_core::{CarId, GeocodeProgress};
use sqlx::{Row, SqlitePool};

type Result<T> = std::result::Result<T, StorageError>;

/// Get a vehicle's progress counters.
pub async fn get(pool: &SqlitePool, car_id: CarId) -> Result<Option<GeocodeProgress>> {
    let row = sqlx::query(
        "SELECT car_id, total_locations, processed_locations, last_updated_at
         FROM geocode_progress WHERE car_id = ?",
    )
    .bind(car_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| GeocodeProgress {
        car_id: r.get("car_id"),
        total_locations: r.get("total_locations"),
        processed_locations: r.get("processed_locations"),
        last_updated_at: r.get("last_updated_at"),
    }))
}

/// Create the counter row for a vehicle if it does not exist yet.
pub async fn ensure(pool: &SqlitePool, car_id: CarId) -> Result<()> {
    sqlx::query(
        "INSERT INTO geocode_progress (car_id) VALUES (?)
         ON CONFLICT(car_id) DO NOTHING",
    )
    .bind(car_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Add newly-enqueued cells to the total.
pub async fn increment_total(
    pool: &SqlitePool,
    car_id: CarId,
    count: i64,
    timestamp: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE geocode_progress
        SET total_locations = total_locations + ?,
            last_updated_at = ?
        WHERE car_id = ?
        "#,
    )
    .bind(count)
    .bind(timestamp)
    .bind(car_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record one successful lookup.
pub async fn increment_processed(pool: &SqlitePool, car_id: CarId, timestamp: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE geocode_progress
        SET processed_locations = processed_locations + 1,
            last_updated_at = ?
        WHERE car_id = ?
        "#,
    )
    .bind(timestamp)
    .bind(car_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Zero both counters (for full resync).
pub async fn reset(pool: &SqlitePool, car_id: CarId) -> Result<()> {
    sqlx::query(
        "UPDATE geocode_progress SET total_locations = 0, processed_locations = 0 WHERE car_id = ?",
    )
    .bind(car_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Drop the counter row entirely.
pub async fn delete(pool: &SqlitePool, car_id: CarId) -> Result<()> {
    sqlx::query("DELETE FROM geocode_progress WHERE car_id = ?")
        .bind(car_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Reconcile every vehicle's counters with the actual cache size, marking
/// geocoding complete. Only meaningful when the pending queue is empty;
/// callers must invoke this from the (singleton) drain task.
pub async fn sync_with_cache(pool: &SqlitePool, cached_count: i64, timestamp: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE geocode_progress
        SET total_locations = ?,
            processed_locations = ?,
            last_updated_at = ?
        "#,
    )
    .bind(cached_count)
    .bind(cached_count)
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(())
}
