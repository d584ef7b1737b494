//! Geocode cache storage
//!
//! Grid-based cache of resolved place names. One row serves every aggregate
//! whose coordinate rounds onto the cell, which keeps external geocoding
//! calls sub-linear in the number of trips. The cache is shared across
//! vehicles and survives per-vehicle resets.

use crate::StorageError;
use carlog_core::GridCell;
use sqlx::SqlitePool;

type Result<T> = std::result::Result<T, StorageError>;

/// A resolved grid cell.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct GeocodeCacheEntry {
    pub grid_lat: i32,
    pub grid_lon: i32,
    /// ISO 3166-1 alpha-2, upper case (e.g. "IT").
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
    pub cached_at: i64,
}

impl GeocodeCacheEntry {
    /// The grid cell this entry resolves.
    #[must_use]
    pub fn cell(&self) -> GridCell {
        GridCell {
            lat: self.grid_lat,
            lon: self.grid_lon,
        }
    }
}

/// Look up a cell.
pub async fn get(pool: &SqlitePool, cell: GridCell) -> Result<Option<GeocodeCacheEntry>> {
    let row = sqlx::query_as::<_, GeocodeCacheEntry>(
        "SELECT * FROM geocode_cache WHERE grid_lat = ? AND grid_lon = ?",
    )
    .bind(cell.lat)
    .bind(cell.lon)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Insert or overwrite a cell's resolution.
pub async fn upsert(pool: &SqlitePool, entry: &GeocodeCacheEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO geocode_cache (
            grid_lat, grid_lon, country_code, country_name, region_name, city, cached_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(grid_lat, grid_lon) DO UPDATE SET
            country_code = excluded.country_code,
            country_name = excluded.country_name,
            region_name = excluded.region_name,
            city = excluded.city,
            cached_at = excluded.cached_at
        "#,
    )
    .bind(entry.grid_lat)
    .bind(entry.grid_lon)
    .bind(&entry.country_code)
    .bind(&entry.country_name)
    .bind(&entry.region_name)
    .bind(&entry.city)
    .bind(entry.cached_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of resolved cells.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM geocode_cache")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Distinct countries seen across the cache.
pub async fn count_unique_countries(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT country_code) FROM geocode_cache WHERE country_code IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Distinct cities seen across the cache.
pub async fn count_unique_cities(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT city) FROM geocode_cache WHERE city IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
