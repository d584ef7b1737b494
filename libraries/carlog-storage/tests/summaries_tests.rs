//! Integration tests for the summary slices
//!
//! Covers the invariants the sync engine leans on:
//! - upserts are idempotent and last-write-wins (no duplicate rows)
//! - the "unprocessed" query drives schema-version reprocessing
//! - deleting summaries cascades to aggregates


use carlog_storage::{aggregates, charges, drives};
use test_helpers::*;

#[tokio::test]
async fn upsert_same_id_twice_keeps_latest_values() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    let mut drive = make_drive(1, 1, "2023-05-01T08:00:00Z");
    drives::upsert(pool, &drive).await.expect("first upsert");

    drive.distance_km = 99.9;
    drive.end_address = "Airport".to_string();
    drives::upsert(pool, &drive).await.expect("second upsert");

    assert_eq!(drives::count(pool, 1, None).await.unwrap(), 1);
    let stored = drives::get(pool, 1).await.unwrap().expect("row exists");
    assert_eq!(stored.distance_km, 99.9);
    assert_eq!(stored.end_address, "Airport");
}

#[tokio::test]
async fn replaying_a_page_creates_no_duplicates() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    let page: Vec<_> = (1..=5)
        .map(|i| make_drive(i, 1, "2023-05-01T08:00:00Z"))
        .collect();

    drives::upsert_all(pool, &page).await.expect("first pass");
    // a crash before cursor advancement re-fetches the same page
    drives::upsert_all(pool, &page).await.expect("replay");

    assert_eq!(drives::count(pool, 1, None).await.unwrap(), 5);
    assert_eq!(drives::max_drive_id(pool, 1).await.unwrap(), Some(5));
}

#[tokio::test]
async fn unprocessed_query_selects_missing_and_stale_aggregates() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    for i in 1..=3 {
        drives::upsert(pool, &make_drive(i, 1, "2023-05-01T08:00:00Z"))
            .await
            .unwrap();
    }

    // drive 1: current aggregate; drive 2: stale aggregate; drive 3: none
    aggregates::upsert_drive(pool, &make_drive_aggregate(1, 1, 5, None))
        .await
        .unwrap();
    aggregates::upsert_drive(pool, &make_drive_aggregate(2, 1, 4, None))
        .await
        .unwrap();

    let ids = drives::unprocessed_ids(pool, 1, 5).await.unwrap();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(drives::count_unprocessed(pool, 1, 5).await.unwrap(), 2);

    // equal or newer versions are not reprocessed
    let ids = drives::unprocessed_ids(pool, 1, 4).await.unwrap();
    assert_eq!(ids, vec![3]);
}

#[tokio::test]
async fn deleting_summaries_cascades_to_aggregates() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    charges::upsert(pool, &make_charge(10, 1, "2023-06-01T10:00:00Z"))
        .await
        .unwrap();
    aggregates::upsert_charge(pool, &make_charge_aggregate(10, 1, 5, (4546, 919)))
        .await
        .unwrap();

    assert!(aggregates::get_charge(pool, 10).await.unwrap().is_some());

    charges::delete_all_for_car(pool, 1).await.unwrap();

    assert_eq!(charges::count(pool, 1, None).await.unwrap(), 0);
    assert!(aggregates::get_charge(pool, 10).await.unwrap().is_none());
}

#[tokio::test]
async fn date_range_queries_are_half_open() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    charges::upsert(pool, &make_charge(1, 1, "2022-12-31T23:00:00Z"))
        .await
        .unwrap();
    charges::upsert(pool, &make_charge(2, 1, "2023-03-10T12:00:00Z"))
        .await
        .unwrap();
    charges::upsert(pool, &make_charge(3, 1, "2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    let range = Some(("2023-01-01", "2024-01-01"));
    assert_eq!(charges::count(pool, 1, range).await.unwrap(), 1);
    assert_eq!(
        charges::sum_energy_added(pool, 1, range).await.unwrap(),
        32.5
    );

    let years = charges::years(pool, 1).await.unwrap();
    assert_eq!(years, vec![2024, 2023, 2022]);
}

#[tokio::test]
async fn summaries_are_scoped_per_car() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    drives::upsert(pool, &make_drive(1, 1, "2023-05-01T08:00:00Z"))
        .await
        .unwrap();
    drives::upsert(pool, &make_drive(2, 2, "2023-05-01T09:00:00Z"))
        .await
        .unwrap();

    drives::delete_all_for_car(pool, 1).await.unwrap();

    assert_eq!(drives::count(pool, 1, None).await.unwrap(), 0);
    assert_eq!(drives::count(pool, 2, None).await.unwrap(), 1);
}
