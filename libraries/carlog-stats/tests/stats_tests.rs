//! Integration tests for the read-side stats
//!
//! Stats are pure queries over whatever is persisted: they must work on
//! partially-synced data and sharpen as more rows arrive.

use carlog_core::{TimeBucket, YearFilter};
use carlog_stats::StatsReader;
use carlog_storage::aggregates::{self, ChargeAggregate};
use carlog_storage::charges::{self, ChargeSummary};
use carlog_storage::drives::{self, DriveSummary};
use carlog_storage::geocode_cache::{self, GeocodeCacheEntry};
use sqlx::SqlitePool;
use tempfile::TempDir;

struct TestDb {
    pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestDb {
    async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}", temp_dir.path().join("test.db").display());
        let pool = carlog_storage::create_pool(&db_url)
            .await
            .expect("Failed to create pool");
        carlog_storage::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        Self {
            pool,
            _temp_dir: temp_dir,
        }
    }
}

fn drive(drive_id: i64, start_date: &str, distance_km: f64, speed_max: i64) -> DriveSummary {
    DriveSummary {
        drive_id,
        car_id: 1,
        start_date: start_date.to_string(),
        end_date: start_date.to_string(),
        duration_min: 30,
        start_address: String::new(),
        end_address: String::new(),
        distance_km,
        speed_max,
        speed_avg: 40,
        power_max: 150,
        power_min: -50,
        start_battery_level: 80,
        end_battery_level: 70,
        outside_temp_avg: None,
        inside_temp_avg: None,
        energy_consumed_kwh: Some(distance_km * 0.15),
        efficiency_wh_km: Some(150.0),
    }
}

fn charge(charge_id: i64, start_date: &str, energy: f64, cost: Option<f64>) -> ChargeSummary {
    ChargeSummary {
        charge_id,
        car_id: 1,
        start_date: start_date.to_string(),
        end_date: start_date.to_string(),
        duration_min: 45,
        address: String::new(),
        latitude: 45.0,
        longitude: 9.0,
        energy_added_kwh: energy,
        energy_used_kwh: None,
        cost,
        start_battery_level: 20,
        end_battery_level: 80,
        outside_temp_avg: None,
        odometer_km: 10_000.0,
    }
}

fn charge_aggregate(charge_id: i64, is_fast: bool, power: i64) -> ChargeAggregate {
    ChargeAggregate {
        charge_id,
        car_id: 1,
        schema_version: carlog_core::AGGREGATE_SCHEMA_VERSION,
        computed_at: 0,
        is_fast_charger: is_fast,
        max_charger_power: Some(power),
        max_charger_voltage: None,
        max_charger_current: None,
        charger_phases: if is_fast { None } else { Some(3) },
        outside_temp_max: None,
        outside_temp_min: None,
        point_count: 10,
        grid_lat: 4500,
        grid_lon: 900,
        country_code: None,
        country_name: None,
        region_name: None,
        city: None,
    }
}

#[tokio::test]
async fn empty_store_yields_empty_stats_not_errors() {
    let db = TestDb::new().await;
    let reader = StatsReader::new(db.pool.clone());

    assert!(!reader.has_data(1).await.unwrap());
    assert!(reader.available_years(1).await.unwrap().is_empty());

    let stats = reader.drive_stats(1, YearFilter::AllTime).await.unwrap();
    assert_eq!(stats.count, 0);
    assert_eq!(stats.total_distance_km, 0.0);
    assert!(stats.longest_drive.is_none());

    assert_eq!(reader.deep_sync_progress(1).await.unwrap(), 0.0);
    assert!(reader.geocode_progress(1).await.unwrap().is_none());
}

#[tokio::test]
async fn totals_and_extremes_follow_the_year_filter() {
    let db = TestDb::new().await;
    let pool = &db.pool;

    drives::upsert(pool, &drive(1, "2022-07-01T08:00:00Z", 120.0, 130)).await.unwrap();
    drives::upsert(pool, &drive(2, "2023-03-01T08:00:00Z", 40.0, 95)).await.unwrap();
    drives::upsert(pool, &drive(3, "2023-09-01T08:00:00Z", 10.0, 60)).await.unwrap();

    let reader = StatsReader::new(pool.clone());

    let all = reader.drive_stats(1, YearFilter::AllTime).await.unwrap();
    assert_eq!(all.count, 3);
    assert_eq!(all.total_distance_km, 170.0);
    assert_eq!(all.max_speed, Some(130));
    assert_eq!(all.longest_drive.as_ref().unwrap().drive_id, 1);

    let y2023 = reader.drive_stats(1, YearFilter::Year(2023)).await.unwrap();
    assert_eq!(y2023.count, 2);
    assert_eq!(y2023.total_distance_km, 50.0);
    assert_eq!(y2023.max_speed, Some(95));
    assert_eq!(y2023.longest_drive.as_ref().unwrap().drive_id, 2);

    let years = reader.available_years(1).await.unwrap();
    assert_eq!(years, vec![2023, 2022]);
}

#[tokio::test]
async fn charge_stats_include_the_ac_dc_split() {
    let db = TestDb::new().await;
    let pool = &db.pool;

    charges::upsert(pool, &charge(1, "2023-01-10T10:00:00Z", 30.0, Some(12.0))).await.unwrap();
    charges::upsert(pool, &charge(2, "2023-02-10T10:00:00Z", 50.0, Some(25.0))).await.unwrap();
    charges::upsert(pool, &charge(3, "2023-03-10T10:00:00Z", 20.0, None)).await.unwrap();

    aggregates::upsert_charge(pool, &charge_aggregate(1, false, 11)).await.unwrap();
    aggregates::upsert_charge(pool, &charge_aggregate(2, true, 250)).await.unwrap();
    aggregates::upsert_charge(pool, &charge_aggregate(3, true, 150)).await.unwrap();

    let reader = StatsReader::new(pool.clone());
    let stats = reader.charge_stats(1, YearFilter::AllTime).await.unwrap();

    assert_eq!(stats.count, 3);
    assert_eq!(stats.total_energy_added_kwh, 100.0);
    assert_eq!(stats.total_cost, 37.0);
    assert_eq!(stats.biggest_charge.as_ref().unwrap().charge_id, 2);
    assert_eq!(stats.most_expensive_charge.as_ref().unwrap().charge_id, 2);
    assert_eq!(stats.ac_count, 1);
    assert_eq!(stats.dc_count, 2);
    assert_eq!(stats.max_dc_power_kw, Some(250));
    // cost per kWh only counts charges that have a cost
    assert!((stats.avg_cost_per_kwh - 37.0 / 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn deep_sync_progress_reflects_aggregate_coverage() {
    let db = TestDb::new().await;
    let pool = &db.pool;

    charges::upsert(pool, &charge(1, "2023-01-10T10:00:00Z", 30.0, None)).await.unwrap();
    charges::upsert(pool, &charge(2, "2023-02-10T10:00:00Z", 30.0, None)).await.unwrap();

    let reader = StatsReader::new(pool.clone());
    assert_eq!(reader.deep_sync_progress(1).await.unwrap(), 0.0);

    // half the records processed so far
    aggregates::upsert_charge(pool, &charge_aggregate(1, false, 11)).await.unwrap();
    assert_eq!(reader.deep_sync_progress(1).await.unwrap(), 0.5);

    aggregates::upsert_charge(pool, &charge_aggregate(2, true, 150)).await.unwrap();
    assert_eq!(reader.deep_sync_progress(1).await.unwrap(), 1.0);
}

#[tokio::test]
async fn location_stats_come_from_the_shared_cache() {
    let db = TestDb::new().await;
    let pool = &db.pool;

    for (i, (country, city)) in [("IT", "Rome"), ("IT", "Milan"), ("FR", "Paris")]
        .iter()
        .enumerate()
    {
        geocode_cache::upsert(
            pool,
            &GeocodeCacheEntry {
                grid_lat: i as i32,
                grid_lon: i as i32,
                country_code: Some((*country).to_string()),
                country_name: None,
                region_name: None,
                city: Some((*city).to_string()),
                cached_at: 0,
            },
        )
        .await
        .unwrap();
    }

    let reader = StatsReader::new(pool.clone());
    let locations = reader.location_stats().await.unwrap();
    assert_eq!(locations.countries, 2);
    assert_eq!(locations.cities, 3);
}

#[tokio::test]
async fn series_bucket_follows_the_filtered_span() {
    let db = TestDb::new().await;
    let pool = &db.pool;

    // two drives a week apart: short span, daily buckets
    drives::upsert(pool, &drive(1, "2023-05-01T08:00:00Z", 10.0, 80)).await.unwrap();
    drives::upsert(pool, &drive(2, "2023-05-08T08:00:00Z", 20.0, 80)).await.unwrap();

    let reader = StatsReader::new(pool.clone());
    let series = reader.distance_series(1, YearFilter::AllTime).await.unwrap();
    assert_eq!(series.bucket, TimeBucket::Daily);
    assert_eq!(
        series.points,
        vec![
            ("2023-05-01".to_string(), 10.0),
            ("2023-05-08".to_string(), 20.0)
        ]
    );

    // a year filter always spans long enough for monthly buckets
    let series = reader.distance_series(1, YearFilter::Year(2023)).await.unwrap();
    assert_eq!(series.bucket, TimeBucket::Monthly);
    assert_eq!(series.points, vec![("2023-05".to_string(), 30.0)]);
}

#[tokio::test]
async fn car_stats_assembles_every_section_in_one_read() {
    let db = TestDb::new().await;
    let pool = &db.pool;

    drives::upsert(pool, &drive(1, "2023-05-01T08:00:00Z", 10.0, 80)).await.unwrap();
    charges::upsert(pool, &charge(1, "2023-01-10T10:00:00Z", 30.0, Some(12.0))).await.unwrap();
    aggregates::upsert_charge(pool, &charge_aggregate(1, true, 250)).await.unwrap();

    let reader = StatsReader::new(pool.clone());
    let stats = reader.car_stats(1, YearFilter::AllTime).await.unwrap();

    assert_eq!(stats.drives.count, 1);
    assert_eq!(stats.charges.count, 1);
    assert_eq!(stats.charges.dc_count, 1);
    assert_eq!(stats.available_years, vec![2023]);
    // one of two records has a current aggregate
    assert_eq!(stats.deep_sync_progress, 0.5);
    assert!(stats.geocode_progress.is_none());
}

#[tokio::test]
async fn stats_sharpen_as_sync_progresses() {
    let db = TestDb::new().await;
    let pool = &db.pool;
    let reader = StatsReader::new(pool.clone());

    drives::upsert(pool, &drive(1, "2023-05-01T08:00:00Z", 10.0, 80)).await.unwrap();
    assert_eq!(
        reader.drive_stats(1, YearFilter::AllTime).await.unwrap().count,
        1
    );

    // more rows land mid-sync; a re-query sees them immediately
    drives::upsert(pool, &drive(2, "2023-05-02T08:00:00Z", 15.0, 90)).await.unwrap();
    let stats = reader.drive_stats(1, YearFilter::AllTime).await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_distance_km, 25.0);
}
