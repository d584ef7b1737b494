//! Drive summary storage
//!
//! One row per backend drive record, projected from the list endpoint.
//! Upserts are last-write-wins: re-fetching a page overwrites with the
//! latest values, which makes summary paging safe to replay after a crash.

use crate::StorageError;
use carlog_core::{CarId, DriveId};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

type Result<T> = std::result::Result<T, StorageError>;

/// A drive summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DriveSummary {
    pub drive_id: DriveId,
    pub car_id: CarId,
    pub start_date: String,
    pub end_date: String,
    pub duration_min: i64,
    pub start_address: String,
    pub end_address: String,
    pub distance_km: f64,
    pub speed_max: i64,
    pub speed_avg: i64,
    pub power_max: i64,
    pub power_min: i64,
    pub start_battery_level: i64,
    pub end_battery_level: i64,
    pub outside_temp_avg: Option<f64>,
    pub inside_temp_avg: Option<f64>,
    pub energy_consumed_kwh: Option<f64>,
    pub efficiency_wh_km: Option<f64>,
}

/// Insert or fully overwrite a drive summary.
pub async fn upsert(pool: &SqlitePool, drive: &DriveSummary) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO drive_summaries (
            drive_id, car_id, start_date, end_date, duration_min,
            start_address, end_address, distance_km, speed_max, speed_avg,
            power_max, power_min, start_battery_level, end_battery_level,
            outside_temp_avg, inside_temp_avg, energy_consumed_kwh, efficiency_wh_km
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(drive_id) DO UPDATE SET
            car_id = excluded.car_id,
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            duration_min = excluded.duration_min,
            start_address = excluded.start_address,
            end_address = excluded.end_address,
            distance_km = excluded.distance_km,
            speed_max = excluded.speed_max,
            speed_avg = excluded.speed_avg,
            power_max = excluded.power_max,
            power_min = excluded.power_min,
            start_battery_level = excluded.start_battery_level,
            end_battery_level = excluded.end_battery_level,
            outside_temp_avg = excluded.outside_temp_avg,
            inside_temp_avg = excluded.inside_temp_avg,
            energy_consumed_kwh = excluded.energy_consumed_kwh,
            efficiency_wh_km = excluded.efficiency_wh_km
        "#,
    )
    .bind(drive.drive_id)
    .bind(drive.car_id)
    .bind(&drive.start_date)
    .bind(&drive.end_date)
    .bind(drive.duration_min)
    .bind(&drive.start_address)
    .bind(&drive.end_address)
    .bind(drive.distance_km)
    .bind(drive.speed_max)
    .bind(drive.speed_avg)
    .bind(drive.power_max)
    .bind(drive.power_min)
    .bind(drive.start_battery_level)
    .bind(drive.end_battery_level)
    .bind(drive.outside_temp_avg)
    .bind(drive.inside_temp_avg)
    .bind(drive.energy_consumed_kwh)
    .bind(drive.efficiency_wh_km)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert a whole page of summaries.
pub async fn upsert_all(pool: &SqlitePool, drives: &[DriveSummary]) -> Result<usize> {
    for drive in drives {
        upsert(pool, drive).await?;
    }
    Ok(drives.len())
}

/// Get a drive summary by id.
pub async fn get(pool: &SqlitePool, drive_id: DriveId) -> Result<Option<DriveSummary>> {
    let row = sqlx::query_as::<_, DriveSummary>("SELECT * FROM drive_summaries WHERE drive_id = ?")
        .bind(drive_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Highest drive id seen for a car (the summary-paging cursor target).
pub async fn max_drive_id(pool: &SqlitePool, car_id: CarId) -> Result<Option<DriveId>> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(drive_id) FROM drive_summaries WHERE car_id = ?")
            .bind(car_id)
            .fetch_one(pool)
            .await?;

    Ok(max)
}

/// Delete all drive summaries for a car. Aggregates cascade.
pub async fn delete_all_for_car(pool: &SqlitePool, car_id: CarId) -> Result<u64> {
    let result = sqlx::query("DELETE FROM drive_summaries WHERE car_id = ?")
        .bind(car_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Drive ids whose aggregate is missing or stamped with an older schema
/// version than `current_version`, oldest id first.
pub async fn unprocessed_ids(
    pool: &SqlitePool,
    car_id: CarId,
    current_version: i32,
) -> Result<Vec<DriveId>> {
    let ids = sqlx::query_scalar(
        r#"
        SELECT d.drive_id FROM drive_summaries d
        LEFT JOIN drive_aggregates a ON d.drive_id = a.drive_id
        WHERE d.car_id = ?
        AND (a.drive_id IS NULL OR a.schema_version < ?)
        ORDER BY d.drive_id
        "#,
    )
    .bind(car_id)
    .bind(current_version)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Count of drives still needing detail processing.
pub async fn count_unprocessed(
    pool: &SqlitePool,
    car_id: CarId,
    current_version: i32,
) -> Result<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM drive_summaries d
        LEFT JOIN drive_aggregates a ON d.drive_id = a.drive_id
        WHERE d.car_id = ?
        AND (a.drive_id IS NULL OR a.schema_version < ?)
        "#,
    )
    .bind(car_id)
    .bind(current_version)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Count of drives for a car, optionally restricted to a `[start, end)`
/// date range.
pub async fn count(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<i64> {
    let count = match range {
        Some((start, end)) => {
            sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM drive_summaries
                WHERE car_id = ? AND start_date >= ? AND start_date < ?
                "#,
            )
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM drive_summaries WHERE car_id = ?")
                .bind(car_id)
                .fetch_one(pool)
                .await?
        }
    };

    Ok(count)
}

/// Total distance driven, in km.
pub async fn sum_distance(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<f64> {
    let sum = match range {
        Some((start, end)) => {
            sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(distance_km), 0.0) FROM drive_summaries
                WHERE car_id = ? AND start_date >= ? AND start_date < ?
                "#,
            )
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT COALESCE(SUM(distance_km), 0.0) FROM drive_summaries WHERE car_id = ?",
            )
            .bind(car_id)
            .fetch_one(pool)
            .await?
        }
    };

    Ok(sum)
}

/// Total time spent driving, in minutes.
pub async fn sum_duration_min(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<i64> {
    let sum = match range {
        Some((start, end)) => {
            sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(duration_min), 0) FROM drive_summaries
                WHERE car_id = ? AND start_date >= ? AND start_date < ?
                "#,
            )
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar(
                "SELECT COALESCE(SUM(duration_min), 0) FROM drive_summaries WHERE car_id = ?",
            )
            .bind(car_id)
            .fetch_one(pool)
            .await?
        }
    };

    Ok(sum)
}

/// Top recorded speed across all drives, in km/h.
pub async fn max_speed(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<Option<i64>> {
    let max = match range {
        Some((start, end)) => {
            sqlx::query_scalar(
                r#"
                SELECT MAX(speed_max) FROM drive_summaries
                WHERE car_id = ? AND start_date >= ? AND start_date < ?
                "#,
            )
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT MAX(speed_max) FROM drive_summaries WHERE car_id = ?")
                .bind(car_id)
                .fetch_one(pool)
                .await?
        }
    };

    Ok(max)
}

/// The single longest drive by distance.
pub async fn longest_drive(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<Option<DriveSummary>> {
    let row = match range {
        Some((start, end)) => {
            sqlx::query_as::<_, DriveSummary>(
                r#"
                SELECT * FROM drive_summaries
                WHERE car_id = ? AND start_date >= ? AND start_date < ?
                ORDER BY distance_km DESC LIMIT 1
                "#,
            )
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DriveSummary>(
                "SELECT * FROM drive_summaries WHERE car_id = ? ORDER BY distance_km DESC LIMIT 1",
            )
            .bind(car_id)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row)
}

/// Distance-weighted average efficiency in Wh/km over drives that report it.
pub async fn avg_efficiency(pool: &SqlitePool, car_id: CarId) -> Result<Option<f64>> {
    let avg = sqlx::query_scalar(
        r#"
        SELECT SUM(energy_consumed_kwh) * 1000.0 / NULLIF(SUM(distance_km), 0)
        FROM drive_summaries
        WHERE car_id = ? AND energy_consumed_kwh IS NOT NULL AND distance_km > 0
        "#,
    )
    .bind(car_id)
    .fetch_one(pool)
    .await?;

    Ok(avg)
}

/// Distinct calendar years with at least one drive, newest first.
pub async fn years(pool: &SqlitePool, car_id: CarId) -> Result<Vec<i64>> {
    let years = sqlx::query_scalar(
        r#"
        SELECT DISTINCT CAST(strftime('%Y', start_date) AS INTEGER) AS year
        FROM drive_summaries
        WHERE car_id = ?
        ORDER BY year DESC
        "#,
    )
    .bind(car_id)
    .fetch_all(pool)
    .await?;

    Ok(years)
}

/// Per-bucket driven distance, keyed by a `strftime` pattern.
pub async fn bucketed_distance(
    pool: &SqlitePool,
    car_id: CarId,
    strftime_pattern: &str,
    range: Option<(&str, &str)>,
) -> Result<Vec<(String, f64)>> {
    let rows: Vec<(String, f64)> = match range {
        Some((start, end)) => {
            sqlx::query_as(
                r#"
                SELECT strftime(?, start_date) AS bucket, SUM(distance_km)
                FROM drive_summaries
                WHERE car_id = ? AND start_date >= ? AND start_date < ?
                GROUP BY bucket ORDER BY bucket
                "#,
            )
            .bind(strftime_pattern)
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                SELECT strftime(?, start_date) AS bucket, SUM(distance_km)
                FROM drive_summaries
                WHERE car_id = ?
                GROUP BY bucket ORDER BY bucket
                "#,
            )
            .bind(strftime_pattern)
            .bind(car_id)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows)
}

/// First and last drive start dates for a car, used to size stats buckets.
pub async fn date_span(pool: &SqlitePool, car_id: CarId) -> Result<Option<(String, String)>> {
    let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT MIN(start_date), MAX(start_date) FROM drive_summaries WHERE car_id = ?",
    )
    .bind(car_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|(min, max)| min.zip(max)))
}
