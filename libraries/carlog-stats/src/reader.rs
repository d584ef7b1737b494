//! On-demand stats assembly.

use carlog_core::{CarId, GeocodeProgress, TimeBucket, YearFilter, AGGREGATE_SCHEMA_VERSION};
use carlog_storage::charges::ChargeSummary;
use carlog_storage::drives::DriveSummary;
use carlog_storage::{aggregates, charges, drives, geocode_cache, geocode_progress, StorageError};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

/// Errors from stats queries.
#[derive(Error, Debug)]
pub enum StatsError {
    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

type Result<T> = std::result::Result<T, StatsError>;

/// Driving totals and extremes, honoring the year filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveStats {
    pub count: i64,
    pub total_distance_km: f64,
    pub total_duration_min: i64,
    pub max_speed: Option<i64>,
    pub longest_drive: Option<DriveSummary>,
    /// Distance-weighted Wh/km over all recorded drives (lifetime).
    pub avg_efficiency_wh_km: Option<f64>,
    /// Meters climbed across all processed drives (lifetime).
    pub total_elevation_gain: i64,
}

/// Charging totals, extremes, and the AC/DC split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeStats {
    pub count: i64,
    pub total_energy_added_kwh: f64,
    pub total_cost: f64,
    /// Lifetime average over charges with a recorded cost.
    pub avg_cost_per_kwh: f64,
    pub avg_duration_min: Option<f64>,
    pub biggest_charge: Option<ChargeSummary>,
    pub most_expensive_charge: Option<ChargeSummary>,
    /// Lifetime counts from processed aggregates.
    pub ac_count: i64,
    pub dc_count: i64,
    pub max_dc_power_kw: Option<i64>,
}

/// Where the vehicle has been, from the shared geocode cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationStats {
    pub countries: i64,
    pub cities: i64,
}

/// A bucketed series of per-period sums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub bucket: TimeBucket,
    /// `(bucket key, sum)` pairs in ascending key order.
    pub points: Vec<(String, f64)>,
}

/// Everything a stats screen needs for one vehicle, in one read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarStats {
    pub drives: DriveStats,
    pub charges: ChargeStats,
    pub locations: LocationStats,
    pub available_years: Vec<i64>,
    /// Fraction of records with a current aggregate, in `[0, 1]`.
    pub deep_sync_progress: f32,
    pub geocode_progress: Option<GeocodeProgress>,
}

/// Read-side stats over the persisted store.
///
/// Holds only a pool handle; construct freely wherever stats are needed.
pub struct StatsReader {
    pool: SqlitePool,
}

impl StatsReader {
    /// Create a reader over a store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Assemble the full stats view for one vehicle.
    pub async fn car_stats(&self, car_id: CarId, filter: YearFilter) -> Result<CarStats> {
        Ok(CarStats {
            drives: self.drive_stats(car_id, filter).await?,
            charges: self.charge_stats(car_id, filter).await?,
            locations: self.location_stats().await?,
            available_years: self.available_years(car_id).await?,
            deep_sync_progress: self.deep_sync_progress(car_id).await?,
            geocode_progress: self.geocode_progress(car_id).await?,
        })
    }

    /// Whether anything has been synced for this vehicle yet.
    pub async fn has_data(&self, car_id: CarId) -> Result<bool> {
        let drives = drives::count(&self.pool, car_id, None).await?;
        let charges = charges::count(&self.pool, car_id, None).await?;
        Ok(drives > 0 || charges > 0)
    }

    /// Calendar years with any recorded activity, newest first.
    pub async fn available_years(&self, car_id: CarId) -> Result<Vec<i64>> {
        let mut years = drives::years(&self.pool, car_id).await?;
        for year in charges::years(&self.pool, car_id).await? {
            if !years.contains(&year) {
                years.push(year);
            }
        }
        years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(years)
    }

    /// Driving stats, restricted by the year filter where the underlying
    /// data is range-indexed.
    pub async fn drive_stats(&self, car_id: CarId, filter: YearFilter) -> Result<DriveStats> {
        let range_owned = filter.date_range();
        let range = range_owned.as_ref().map(|(s, e)| (s.as_str(), e.as_str()));

        Ok(DriveStats {
            count: drives::count(&self.pool, car_id, range).await?,
            total_distance_km: drives::sum_distance(&self.pool, car_id, range).await?,
            total_duration_min: drives::sum_duration_min(&self.pool, car_id, range).await?,
            max_speed: drives::max_speed(&self.pool, car_id, range).await?,
            longest_drive: drives::longest_drive(&self.pool, car_id, range).await?,
            avg_efficiency_wh_km: drives::avg_efficiency(&self.pool, car_id).await?,
            total_elevation_gain: aggregates::sum_elevation_gain(&self.pool, car_id).await?,
        })
    }

    /// Charging stats, restricted by the year filter where the underlying
    /// data is range-indexed.
    pub async fn charge_stats(&self, car_id: CarId, filter: YearFilter) -> Result<ChargeStats> {
        let range_owned = filter.date_range();
        let range = range_owned.as_ref().map(|(s, e)| (s.as_str(), e.as_str()));

        let (ac_count, dc_count) = aggregates::ac_dc_counts(&self.pool, car_id).await?;

        Ok(ChargeStats {
            count: charges::count(&self.pool, car_id, range).await?,
            total_energy_added_kwh: charges::sum_energy_added(&self.pool, car_id, range).await?,
            total_cost: charges::sum_cost(&self.pool, car_id, range).await?,
            avg_cost_per_kwh: charges::avg_cost_per_kwh(&self.pool, car_id).await?,
            avg_duration_min: charges::avg_duration_min(&self.pool, car_id).await?,
            biggest_charge: charges::biggest_charge(&self.pool, car_id, range).await?,
            most_expensive_charge: charges::most_expensive_charge(&self.pool, car_id, range)
                .await?,
            ac_count,
            dc_count,
            max_dc_power_kw: aggregates::max_dc_power(&self.pool, car_id).await?,
        })
    }

    /// Distinct countries and cities across the resolved geocode cache.
    pub async fn location_stats(&self) -> Result<LocationStats> {
        Ok(LocationStats {
            countries: geocode_cache::count_unique_countries(&self.pool).await?,
            cities: geocode_cache::count_unique_cities(&self.pool).await?,
        })
    }

    /// Fraction of summaries whose aggregate is current, in `[0, 1]`.
    /// This is the "deep sync" progress shown alongside quick stats.
    pub async fn deep_sync_progress(&self, car_id: CarId) -> Result<f32> {
        let total = drives::count(&self.pool, car_id, None).await?
            + charges::count(&self.pool, car_id, None).await?;
        if total == 0 {
            return Ok(0.0);
        }

        let unprocessed =
            drives::count_unprocessed(&self.pool, car_id, AGGREGATE_SCHEMA_VERSION).await?
                + charges::count_unprocessed(&self.pool, car_id, AGGREGATE_SCHEMA_VERSION).await?;

        Ok((total - unprocessed) as f32 / total as f32)
    }

    /// Per-vehicle geocoding progress counters, if any work was ever queued.
    pub async fn geocode_progress(&self, car_id: CarId) -> Result<Option<GeocodeProgress>> {
        Ok(geocode_progress::get(&self.pool, car_id).await?)
    }

    /// Driven distance per time bucket. Bucket size follows the filtered
    /// span: short spans bucket daily, long histories monthly.
    pub async fn distance_series(&self, car_id: CarId, filter: YearFilter) -> Result<TimeSeries> {
        let bucket = self.bucket_for(car_id, filter).await?;
        let range_owned = filter.date_range();
        let range = range_owned.as_ref().map(|(s, e)| (s.as_str(), e.as_str()));

        let points =
            drives::bucketed_distance(&self.pool, car_id, bucket.strftime_pattern(), range).await?;
        Ok(TimeSeries { bucket, points })
    }

    /// Charged energy per time bucket.
    pub async fn energy_series(&self, car_id: CarId, filter: YearFilter) -> Result<TimeSeries> {
        let bucket = self.bucket_for(car_id, filter).await?;
        let range_owned = filter.date_range();
        let range = range_owned.as_ref().map(|(s, e)| (s.as_str(), e.as_str()));

        let points =
            charges::bucketed_energy(&self.pool, car_id, bucket.strftime_pattern(), range).await?;
        Ok(TimeSeries { bucket, points })
    }

    async fn bucket_for(&self, car_id: CarId, filter: YearFilter) -> Result<TimeBucket> {
        let days = match filter {
            YearFilter::Year(_) => 365,
            YearFilter::AllTime => match drives::date_span(&self.pool, car_id).await? {
                Some((min, max)) => span_days(&min, &max),
                None => 0,
            },
        };
        Ok(TimeBucket::for_span_days(days))
    }
}

/// Days between two ISO date strings; 0 when either fails to parse.
fn span_days(min: &str, max: &str) -> i64 {
    let parse = |s: &str| {
        chrono::NaiveDate::parse_from_str(s.get(..10).unwrap_or(""), "%Y-%m-%d").ok()
    };
    match (parse(min), parse(max)) {
        (Some(a), Some(b)) => (b - a).num_days(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_days_parses_iso_timestamps() {
        assert_eq!(
            span_days("2023-01-01T08:00:00Z", "2023-01-31T22:15:00Z"),
            30
        );
        assert_eq!(span_days("garbage", "2023-01-31"), 0);
    }
}
