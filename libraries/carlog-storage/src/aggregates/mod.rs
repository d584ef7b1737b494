//! Detail aggregate storage
//!
//! One row per record, 1:1 with its summary via a cascading foreign key.
//! Aggregates carry the extremes and classifications derived from a detail
//! payload, a `schema_version` stamp for selective reprocessing, and the
//! grid cell used for asynchronous location back-fill.

use crate::StorageError;
use carlog_core::{CarId, ChargeId, DriveId, GridCell};
use sqlx::SqlitePool;

type Result<T> = std::result::Result<T, StorageError>;

/// Resolved place fields written into aggregates by the geocode back-fill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceFields {
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
}

/// Derived extremes for one drive.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DriveAggregate {
    pub drive_id: DriveId,
    pub car_id: CarId,
    pub schema_version: i32,
    pub computed_at: i64,
    pub speed_max: i64,
    pub speed_min: i64,
    pub power_max: i64,
    pub power_min: i64,
    pub elevation_max: i64,
    pub elevation_min: i64,
    pub elevation_gain: i64,
    pub elevation_loss: i64,
    pub start_elevation: Option<i64>,
    pub end_elevation: Option<i64>,
    pub position_count: i64,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub grid_lat: Option<i32>,
    pub grid_lon: Option<i32>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
}

/// Derived extremes and charger classification for one charge.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ChargeAggregate {
    pub charge_id: ChargeId,
    pub car_id: CarId,
    pub schema_version: i32,
    pub computed_at: i64,
    pub is_fast_charger: bool,
    pub max_charger_power: Option<i64>,
    pub max_charger_voltage: Option<i64>,
    pub max_charger_current: Option<i64>,
    pub charger_phases: Option<i64>,
    pub outside_temp_max: Option<f64>,
    pub outside_temp_min: Option<f64>,
    pub point_count: i64,
    pub grid_lat: i32,
    pub grid_lon: i32,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
}

/// Insert or fully overwrite a drive aggregate.
pub async fn upsert_drive(pool: &SqlitePool, agg: &DriveAggregate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO drive_aggregates (
            drive_id, car_id, schema_version, computed_at,
            speed_max, speed_min, power_max, power_min,
            elevation_max, elevation_min, elevation_gain, elevation_loss,
            start_elevation, end_elevation, position_count,
            start_latitude, start_longitude, grid_lat, grid_lon,
            country_code, country_name, region_name, city
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(drive_id) DO UPDATE SET
            car_id = excluded.car_id,
            schema_version = excluded.schema_version,
            computed_at = excluded.computed_at,
            speed_max = excluded.speed_max,
            speed_min = excluded.speed_min,
            power_max = excluded.power_max,
            power_min = excluded.power_min,
            elevation_max = excluded.elevation_max,
            elevation_min = excluded.elevation_min,
            elevation_gain = excluded.elevation_gain,
            elevation_loss = excluded.elevation_loss,
            start_elevation = excluded.start_elevation,
            end_elevation = excluded.end_elevation,
            position_count = excluded.position_count,
            start_latitude = excluded.start_latitude,
            start_longitude = excluded.start_longitude,
            grid_lat = excluded.grid_lat,
            grid_lon = excluded.grid_lon,
            country_code = excluded.country_code,
            country_name = excluded.country_name,
            region_name = excluded.region_name,
            city = excluded.city
        "#,
    )
    .bind(agg.drive_id)
    .bind(agg.car_id)
    .bind(agg.schema_version)
    .bind(agg.computed_at)
    .bind(agg.speed_max)
    .bind(agg.speed_min)
    .bind(agg.power_max)
    .bind(agg.power_min)
    .bind(agg.elevation_max)
    .bind(agg.elevation_min)
    .bind(agg.elevation_gain)
    .bind(agg.elevation_loss)
    .bind(agg.start_elevation)
    .bind(agg.end_elevation)
    .bind(agg.position_count)
    .bind(agg.start_latitude)
    .bind(agg.start_longitude)
    .bind(agg.grid_lat)
    .bind(agg.grid_lon)
    .bind(&agg.country_code)
    .bind(&agg.country_name)
    .bind(&agg.region_name)
    .bind(&agg.city)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or fully overwrite a charge aggregate.
pub async fn upsert_charge(pool: &SqlitePool, agg: &ChargeAggregate) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO charge_aggregates (
            charge_id, car_id, schema_version, computed_at,
            is_fast_charger, max_charger_power, max_charger_voltage,
            max_charger_current, charger_phases,
            outside_temp_max, outside_temp_min, point_count,
            grid_lat, grid_lon,
            country_code, country_name, region_name, city
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(charge_id) DO UPDATE SET
            car_id = excluded.car_id,
            schema_version = excluded.schema_version,
            computed_at = excluded.computed_at,
            is_fast_charger = excluded.is_fast_charger,
            max_charger_power = excluded.max_charger_power,
            max_charger_voltage = excluded.max_charger_voltage,
            max_charger_current = excluded.max_charger_current,
            charger_phases = excluded.charger_phases,
            outside_temp_max = excluded.outside_temp_max,
            outside_temp_min = excluded.outside_temp_min,
            point_count = excluded.point_count,
            grid_lat = excluded.grid_lat,
            grid_lon = excluded.grid_lon,
            country_code = excluded.country_code,
            country_name = excluded.country_name,
            region_name = excluded.region_name,
            city = excluded.city
        "#,
    )
    .bind(agg.charge_id)
    .bind(agg.car_id)
    .bind(agg.schema_version)
    .bind(agg.computed_at)
    .bind(agg.is_fast_charger)
    .bind(agg.max_charger_power)
    .bind(agg.max_charger_voltage)
    .bind(agg.max_charger_current)
    .bind(agg.charger_phases)
    .bind(agg.outside_temp_max)
    .bind(agg.outside_temp_min)
    .bind(agg.point_count)
    .bind(agg.grid_lat)
    .bind(agg.grid_lon)
    .bind(&agg.country_code)
    .bind(&agg.country_name)
    .bind(&agg.region_name)
    .bind(&agg.city)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a drive aggregate by id.
pub async fn get_drive(pool: &SqlitePool, drive_id: DriveId) -> Result<Option<DriveAggregate>> {
    let row =
        sqlx::query_as::<_, DriveAggregate>("SELECT * FROM drive_aggregates WHERE drive_id = ?")
            .bind(drive_id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// Get a charge aggregate by id.
pub async fn get_charge(pool: &SqlitePool, charge_id: ChargeId) -> Result<Option<ChargeAggregate>> {
    let row =
        sqlx::query_as::<_, ChargeAggregate>("SELECT * FROM charge_aggregates WHERE charge_id = ?")
            .bind(charge_id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// Back-fill place fields into every drive aggregate in a grid cell.
///
/// Scope is the cell alone, never a vehicle: a cell resolved on behalf of
/// one car must enrich every car's records.
pub async fn update_drive_locations_in_grid(
    pool: &SqlitePool,
    cell: GridCell,
    place: &PlaceFields,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE drive_aggregates
        SET country_code = ?, country_name = ?, region_name = ?, city = ?
        WHERE grid_lat = ? AND grid_lon = ?
        "#,
    )
    .bind(&place.country_code)
    .bind(&place.country_name)
    .bind(&place.region_name)
    .bind(&place.city)
    .bind(cell.lat)
    .bind(cell.lon)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Back-fill place fields into every charge aggregate in a grid cell.
pub async fn update_charge_locations_in_grid(
    pool: &SqlitePool,
    cell: GridCell,
    place: &PlaceFields,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE charge_aggregates
        SET country_code = ?, country_name = ?, region_name = ?, city = ?
        WHERE grid_lat = ? AND grid_lon = ?
        "#,
    )
    .bind(&place.country_code)
    .bind(&place.country_name)
    .bind(&place.region_name)
    .bind(&place.city)
    .bind(cell.lat)
    .bind(cell.lon)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// AC and DC charge counts for a car, in that order.
pub async fn ac_dc_counts(pool: &SqlitePool, car_id: CarId) -> Result<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN is_fast_charger = 0 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN is_fast_charger = 1 THEN 1 ELSE 0 END), 0)
        FROM charge_aggregates WHERE car_id = ?
        "#,
    )
    .bind(car_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Peak charging power ever recorded at a DC charger, in kW.
pub async fn max_dc_power(pool: &SqlitePool, car_id: CarId) -> Result<Option<i64>> {
    let max: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT MAX(max_charger_power) FROM charge_aggregates
        WHERE car_id = ? AND is_fast_charger = 1
        "#,
    )
    .bind(car_id)
    .fetch_one(pool)
    .await?;

    Ok(max)
}

/// Total elevation gained over all processed drives, in meters.
pub async fn sum_elevation_gain(pool: &SqlitePool, car_id: CarId) -> Result<i64> {
    let sum = sqlx::query_scalar(
        "SELECT COALESCE(SUM(elevation_gain), 0) FROM drive_aggregates WHERE car_id = ?",
    )
    .bind(car_id)
    .fetch_one(pool)
    .await?;

    Ok(sum)
}
