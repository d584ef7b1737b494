//! Charge summary storage
//!
//! One row per backend charge record, projected from the list endpoint.
//! Also carries the quick-stats queries the read side composes: totals,
//! extremes, and cost breakdowns.

use crate::StorageError;
use carlog_core::{CarId, ChargeId};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

type Result<T> = std::result::Result<T, StorageError>;

/// A charge summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChargeSummary {
    pub charge_id: ChargeId,
    pub car_id: CarId,
    pub start_date: String,
    pub end_date: String,
    pub duration_min: i64,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub energy_added_kwh: f64,
    pub energy_used_kwh: Option<f64>,
    pub cost: Option<f64>,
    pub start_battery_level: i64,
    pub end_battery_level: i64,
    pub outside_temp_avg: Option<f64>,
    pub odometer_km: f64,
}

/// Insert or fully overwrite a charge summary.
pub async fn upsert(pool: &SqlitePool, charge: &ChargeSummary) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO charge_summaries (
            charge_id, car_id, start_date, end_date, duration_min,
            address, latitude, longitude, energy_added_kwh, energy_used_kwh,
            cost, start_battery_level, end_battery_level, outside_temp_avg, odometer_km
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(charge_id) DO UPDATE SET
            car_id = excluded.car_id,
            start_date = excluded.start_date,
            end_date = excluded.end_date,
            duration_min = excluded.duration_min,
            address = excluded.address,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            energy_added_kwh = excluded.energy_added_kwh,
            energy_used_kwh = excluded.energy_used_kwh,
            cost = excluded.cost,
            start_battery_level = excluded.start_battery_level,
            end_battery_level = excluded.end_battery_level,
            outside_temp_avg = excluded.outside_temp_avg,
            odometer_km = excluded.odometer_km
        "#,
    )
    .bind(charge.charge_id)
    .bind(charge.car_id)
    .bind(&charge.start_date)
    .bind(&charge.end_date)
    .bind(charge.duration_min)
    .bind(&charge.address)
    .bind(charge.latitude)
    .bind(charge.longitude)
    .bind(charge.energy_added_kwh)
    .bind(charge.energy_used_kwh)
    .bind(charge.cost)
    .bind(charge.start_battery_level)
    .bind(charge.end_battery_level)
    .bind(charge.outside_temp_avg)
    .bind(charge.odometer_km)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert a whole page of summaries.
pub async fn upsert_all(pool: &SqlitePool, charges: &[ChargeSummary]) -> Result<usize> {
    for charge in charges {
        upsert(pool, charge).await?;
    }
    Ok(charges.len())
}

/// Get a charge summary by id.
pub async fn get(pool: &SqlitePool, charge_id: ChargeId) -> Result<Option<ChargeSummary>> {
    let row =
        sqlx::query_as::<_, ChargeSummary>("SELECT * FROM charge_summaries WHERE charge_id = ?")
            .bind(charge_id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// Highest charge id seen for a car (the summary-paging cursor target).
pub async fn max_charge_id(pool: &SqlitePool, car_id: CarId) -> Result<Option<ChargeId>> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(charge_id) FROM charge_summaries WHERE car_id = ?")
            .bind(car_id)
            .fetch_one(pool)
            .await?;

    Ok(max)
}

/// Delete all charge summaries for a car. Aggregates cascade.
pub async fn delete_all_for_car(pool: &SqlitePool, car_id: CarId) -> Result<u64> {
    let result = sqlx::query("DELETE FROM charge_summaries WHERE car_id = ?")
        .bind(car_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Charge ids whose aggregate is missing or stamped with an older schema
/// version than `current_version`, oldest id first.
pub async fn unprocessed_ids(
    pool: &SqlitePool,
    car_id: CarId,
    current_version: i32,
) -> Result<Vec<ChargeId>> {
    let ids = sqlx::query_scalar(
        r#"
        SELECT c.charge_id FROM charge_summaries c
        LEFT JOIN charge_aggregates a ON c.charge_id = a.charge_id
        WHERE c.car_id = ?
        AND (a.charge_id IS NULL OR a.schema_version < ?)
        ORDER BY c.charge_id
        "#,
    )
    .bind(car_id)
    .bind(current_version)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Count of charges still needing detail processing.
pub async fn count_unprocessed(
    pool: &SqlitePool,
    car_id: CarId,
    current_version: i32,
) -> Result<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM charge_summaries c
        LEFT JOIN charge_aggregates a ON c.charge_id = a.charge_id
        WHERE c.car_id = ?
        AND (a.charge_id IS NULL OR a.schema_version < ?)
        "#,
    )
    .bind(car_id)
    .bind(current_version)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Count of charges for a car, optionally restricted to a date range.
pub async fn count(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<i64> {
    let count = match range {
        Some((start, end)) => {
            sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM charge_summaries
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
            sqlx::query_scalar("SELECT COUNT(*) FROM charge_summaries WHERE car_id = ?")
                .bind(car_id)
                .fetch_one(pool)
                .await?
        }
    };

    Ok(count)
}

/// Total energy added across charges, in kWh.
pub async fn sum_energy_added(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<f64> {
    let sum = match range {
        Some((start, end)) => {
            sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(energy_added_kwh), 0.0) FROM charge_summaries
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
                "SELECT COALESCE(SUM(energy_added_kwh), 0.0) FROM charge_summaries WHERE car_id = ?",
            )
            .bind(car_id)
            .fetch_one(pool)
            .await?
        }
    };

    Ok(sum)
}

/// Total charging cost, in the backend's currency.
pub async fn sum_cost(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<f64> {
    let sum = match range {
        Some((start, end)) => {
            sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(cost), 0.0) FROM charge_summaries
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
                "SELECT COALESCE(SUM(cost), 0.0) FROM charge_summaries WHERE car_id = ?",
            )
            .bind(car_id)
            .fetch_one(pool)
            .await?
        }
    };

    Ok(sum)
}

/// Average cost per kWh over charges with a recorded cost.
pub async fn avg_cost_per_kwh(pool: &SqlitePool, car_id: CarId) -> Result<f64> {
    let avg = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(cost) / NULLIF(SUM(energy_added_kwh), 0), 0.0)
        FROM charge_summaries WHERE car_id = ? AND cost IS NOT NULL
        "#,
    )
    .bind(car_id)
    .fetch_one(pool)
    .await?;

    Ok(avg)
}

/// Biggest single charge by energy added.
pub async fn biggest_charge(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<Option<ChargeSummary>> {
    let row = match range {
        Some((start, end)) => {
            sqlx::query_as::<_, ChargeSummary>(
                r#"
                SELECT * FROM charge_summaries
                WHERE car_id = ? AND start_date >= ? AND start_date < ?
                ORDER BY energy_added_kwh DESC LIMIT 1
                "#,
            )
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ChargeSummary>(
                r#"
                SELECT * FROM charge_summaries
                WHERE car_id = ?
                ORDER BY energy_added_kwh DESC LIMIT 1
                "#,
            )
            .bind(car_id)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row)
}

/// Most expensive single charge.
pub async fn most_expensive_charge(
    pool: &SqlitePool,
    car_id: CarId,
    range: Option<(&str, &str)>,
) -> Result<Option<ChargeSummary>> {
    let row = match range {
        Some((start, end)) => {
            sqlx::query_as::<_, ChargeSummary>(
                r#"
                SELECT * FROM charge_summaries
                WHERE car_id = ? AND cost IS NOT NULL
                AND start_date >= ? AND start_date < ?
                ORDER BY cost DESC LIMIT 1
                "#,
            )
            .bind(car_id)
            .bind(start)
            .bind(end)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ChargeSummary>(
                r#"
                SELECT * FROM charge_summaries
                WHERE car_id = ? AND cost IS NOT NULL
                ORDER BY cost DESC LIMIT 1
                "#,
            )
            .bind(car_id)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row)
}

/// Worst price paid per kWh in a single charge.
pub async fn most_expensive_per_kwh(
    pool: &SqlitePool,
    car_id: CarId,
) -> Result<Option<ChargeSummary>> {
    let row = sqlx::query_as::<_, ChargeSummary>(
        r#"
        SELECT * FROM charge_summaries
        WHERE car_id = ? AND cost IS NOT NULL AND energy_added_kwh > 0
        ORDER BY (cost / energy_added_kwh) DESC LIMIT 1
        "#,
    )
    .bind(car_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Average charge duration in minutes.
pub async fn avg_duration_min(pool: &SqlitePool, car_id: CarId) -> Result<Option<f64>> {
    let avg = sqlx::query_scalar("SELECT AVG(duration_min) FROM charge_summaries WHERE car_id = ?")
        .bind(car_id)
        .fetch_one(pool)
        .await?;

    Ok(avg)
}

/// Distinct calendar years with at least one charge, newest first.
pub async fn years(pool: &SqlitePool, car_id: CarId) -> Result<Vec<i64>> {
    let years = sqlx::query_scalar(
        r#"
        SELECT DISTINCT CAST(strftime('%Y', start_date) AS INTEGER) AS year
        FROM charge_summaries
        WHERE car_id = ?
        ORDER BY year DESC
        "#,
    )
    .bind(car_id)
    .fetch_all(pool)
    .await?;

    Ok(years)
}

/// Per-bucket charged energy, keyed by a `strftime` pattern.
pub async fn bucketed_energy(
    pool: &SqlitePool,
    car_id: CarId,
    strftime_pattern: &str,
    range: Option<(&str, &str)>,
) -> Result<Vec<(String, f64)>> {
    let rows: Vec<(String, f64)> = match range {
        Some((start, end)) => {
            sqlx::query_as(
                r#"
                SELECT strftime(?, start_date) AS bucket, SUM(energy_added_kwh)
                FROM charge_summaries
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
                SELECT strftime(?, start_date) AS bucket, SUM(energy_added_kwh)
                FROM charge_summaries
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
