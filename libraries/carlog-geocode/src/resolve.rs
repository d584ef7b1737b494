//! Enqueue-side deduplication for the sync engine.

use crate::error::Result;
use carlog_core::{CarId, GridCell};
use carlog_storage::aggregates::PlaceFields;
use carlog_storage::{geocode_cache, geocode_progress, geocode_queue};
use sqlx::SqlitePool;

/// Outcome of resolving a coordinate at aggregate-persist time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The cell is already cached; fields can be filled in immediately.
    /// This also covers cells resolved on behalf of another vehicle.
    Cached(PlaceFields),
    /// The cell was newly queued; the vehicle's `total_locations` grew by one.
    Enqueued,
    /// The cell already has a pending queue row; nothing changed.
    AlreadyQueued,
}

/// Resolve a coordinate against the cache, enqueueing its grid cell when
/// unresolved.
///
/// Enqueue is insert-if-absent on the cell, so concurrent callers and
/// repeated syncs never create duplicate queue rows, and a cell that is
/// cached or queued is never re-queued. Only a genuinely new queue row
/// increments the vehicle's total counter.
pub async fn resolve_or_enqueue(
    pool: &SqlitePool,
    car_id: CarId,
    latitude: f64,
    longitude: f64,
    now: i64,
) -> Result<Resolution> {
    let cell = GridCell::from_coords(latitude, longitude);

    if let Some(entry) = geocode_cache::get(pool, cell).await? {
        return Ok(Resolution::Cached(PlaceFields {
            country_code: entry.country_code,
            country_name: entry.country_name,
            region_name: entry.region_name,
            city: entry.city,
        }));
    }

    let item = geocode_queue::NewQueueItem::new(cell, car_id, latitude, longitude, now);
    if geocode_queue::enqueue(pool, &item).await? {
        geocode_progress::ensure(pool, car_id).await?;
        geocode_progress::increment_total(pool, car_id, 1, now).await?;
        Ok(Resolution::Enqueued)
    } else {
        Ok(Resolution::AlreadyQueued)
    }
}
