//! Sync cursor storage
//!
//! Per-vehicle high-water marks into the backend's paginated resources.
//! The cursor advances after each successfully persisted page, never after
//! individual records: a crash mid-page re-fetches that page, and the
//! idempotent summary upserts make the replay harmless.

use crate::StorageError;
use carlog_core::{CarId, ChargeId, DriveId};
use sqlx::SqlitePool;

type Result<T> = std::result::Result<T, StorageError>;

/// A vehicle's sync cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct SyncCursor {
    pub car_id: CarId,
    /// Highest drive id whose page has been fully persisted.
    pub last_drive_id: DriveId,
    /// Highest charge id whose page has been fully persisted.
    pub last_charge_id: ChargeId,
    /// Aggregate derivation version last applied during detail sync.
    pub aggregate_schema_version: i32,
    pub updated_at: i64,
}

/// Get a vehicle's cursor, creating the zeroed row on first sync.
pub async fn get_or_create(pool: &SqlitePool, car_id: CarId) -> Result<SyncCursor> {
    sqlx::query("INSERT INTO sync_state (car_id) VALUES (?) ON CONFLICT(car_id) DO NOTHING")
        .bind(car_id)
        .execute(pool)
        .await?;

    let cursor = sqlx::query_as::<_, SyncCursor>("SELECT * FROM sync_state WHERE car_id = ?")
        .bind(car_id)
        .fetch_one(pool)
        .await?;

    Ok(cursor)
}

/// Get a vehicle's cursor if one exists.
pub async fn get(pool: &SqlitePool, car_id: CarId) -> Result<Option<SyncCursor>> {
    let cursor = sqlx::query_as::<_, SyncCursor>("SELECT * FROM sync_state WHERE car_id = ?")
        .bind(car_id)
        .fetch_optional(pool)
        .await?;

    Ok(cursor)
}

/// Advance the drive high-water mark after a fully persisted page.
pub async fn set_last_drive_id(
    pool: &SqlitePool,
    car_id: CarId,
    last_drive_id: DriveId,
    timestamp: i64,
) -> Result<()> {
    sqlx::query("UPDATE sync_state SET last_drive_id = ?, updated_at = ? WHERE car_id = ?")
        .bind(last_drive_id)
        .bind(timestamp)
        .bind(car_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Advance the charge high-water mark after a fully persisted page.
pub async fn set_last_charge_id(
    pool: &SqlitePool,
    car_id: CarId,
    last_charge_id: ChargeId,
    timestamp: i64,
) -> Result<()> {
    sqlx::query("UPDATE sync_state SET last_charge_id = ?, updated_at = ? WHERE car_id = ?")
        .bind(last_charge_id)
        .bind(timestamp)
        .bind(car_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record the aggregate derivation version applied by the last detail sync.
pub async fn set_schema_version(
    pool: &SqlitePool,
    car_id: CarId,
    version: i32,
    timestamp: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE sync_state SET aggregate_schema_version = ?, updated_at = ? WHERE car_id = ?",
    )
    .bind(version)
    .bind(timestamp)
    .bind(car_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Drop a vehicle's cursor (full reset only).
pub async fn delete(pool: &SqlitePool, car_id: CarId) -> Result<()> {
    sqlx::query("DELETE FROM sync_state WHERE car_id = ?")
        .bind(car_id)
        .execute(pool)
        .await?;

    Ok(())
}
