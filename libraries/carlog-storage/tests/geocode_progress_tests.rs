//! Integration tests for the geocode progress counters


use carlog_storage::{geocode_progress, sync_state};
use test_helpers::TestDb;

#[tokio::test]
async fn counters_only_grow_between_resets() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    geocode_progress::ensure(pool, 1).await.unwrap();
    geocode_progress::ensure(pool, 1).await.unwrap(); // idempotent

    geocode_progress::increment_total(pool, 1, 3, 100).await.unwrap();
    geocode_progress::increment_total(pool, 1, 2, 200).await.unwrap();
    geocode_progress::increment_processed(pool, 1, 300).await.unwrap();

    let progress = geocode_progress::get(pool, 1).await.unwrap().unwrap();
    assert_eq!(progress.total_locations, 5);
    assert_eq!(progress.processed_locations, 1);
    assert_eq!(progress.last_updated_at, 300);
    assert!(progress.fraction() > 0.19 && progress.fraction() < 0.21);

    geocode_progress::reset(pool, 1).await.unwrap();
    let progress = geocode_progress::get(pool, 1).await.unwrap().unwrap();
    assert_eq!(progress.total_locations, 0);
    assert_eq!(progress.processed_locations, 0);
    assert_eq!(progress.fraction(), 0.0);
}

#[tokio::test]
async fn sync_with_cache_marks_every_car_complete() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    geocode_progress::ensure(pool, 1).await.unwrap();
    geocode_progress::ensure(pool, 2).await.unwrap();
    geocode_progress::increment_total(pool, 1, 10, 100).await.unwrap();
    geocode_progress::increment_total(pool, 2, 4, 100).await.unwrap();

    geocode_progress::sync_with_cache(pool, 7, 500).await.unwrap();

    for car_id in [1, 2] {
        let progress = geocode_progress::get(pool, car_id).await.unwrap().unwrap();
        assert_eq!(progress.total_locations, 7);
        assert_eq!(progress.processed_locations, 7);
        assert_eq!(progress.fraction(), 1.0);
    }
}

#[tokio::test]
async fn delete_removes_the_row() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    geocode_progress::ensure(pool, 1).await.unwrap();
    geocode_progress::delete(pool, 1).await.unwrap();

    assert!(geocode_progress::get(pool, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn cursor_is_created_lazily_and_advances_per_page() {
    let test_db = TestDb::new().await;
    let pool = test_db.pool();

    assert!(sync_state::get(pool, 1).await.unwrap().is_none());

    let cursor = sync_state::get_or_create(pool, 1).await.unwrap();
    assert_eq!(cursor.last_drive_id, 0);
    assert_eq!(cursor.last_charge_id, 0);
    assert_eq!(cursor.aggregate_schema_version, 0);

    sync_state::set_last_drive_id(pool, 1, 50, 1_000).await.unwrap();
    sync_state::set_last_charge_id(pool, 1, 20, 1_001).await.unwrap();
    sync_state::set_schema_version(pool, 1, 5, 1_002).await.unwrap();

    let cursor = sync_state::get(pool, 1).await.unwrap().unwrap();
    assert_eq!(cursor.last_drive_id, 50);
    assert_eq!(cursor.last_charge_id, 20);
    assert_eq!(cursor.aggregate_schema_version, 5);

    sync_state::delete(pool, 1).await.unwrap();
    assert!(sync_state::get(pool, 1).await.unwrap().is_none());
}
