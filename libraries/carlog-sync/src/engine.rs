//! The staged sync pipeline for one vehicle.

use crate::aggregate;
use crate::error::Result;
use carlog_client::{ClientError, TelemetryClient};
use carlog_core::{
    CarId, SyncLogCollector, SyncPhase, SyncProgress, SyncSummary, AGGREGATE_SCHEMA_VERSION,
};
use carlog_geocode::{resolve_or_enqueue, Resolution};
use carlog_storage::{aggregates, charges, drives, sync_state};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

const TAG: &str = "SyncEngine";

/// Records fetched per list-endpoint page.
pub(crate) const PAGE_SIZE: usize = 50;

/// Backend resources that can turn out to be unsupported (HTTP 404).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Resource {
    Drives,
    Charges,
    DriveDetails,
    ChargeDetails,
}

/// Session-scoped memory of endpoints that returned 404.
///
/// A 404 is permanent for the session: the engine stops polling that
/// resource instead of retrying it every run. Not persisted - a process
/// restart probes the endpoint once more.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    unsupported: Mutex<HashSet<(CarId, Resource)>>,
}

impl SessionState {
    fn is_unsupported(&self, car_id: CarId, resource: Resource) -> bool {
        self.unsupported
            .lock()
            .map(|set| set.contains(&(car_id, resource)))
            .unwrap_or(false)
    }

    fn mark_unsupported(&self, car_id: CarId, resource: Resource) {
        if let Ok(mut set) = self.unsupported.lock() {
            set.insert((car_id, resource));
        }
    }
}

/// Pushes progress snapshots to the run's subscriber and the manager's
/// status map.
pub(crate) struct ProgressSink {
    car_id: CarId,
    tx: mpsc::Sender<SyncProgress>,
    statuses: Arc<RwLock<HashMap<CarId, SyncProgress>>>,
}

impl ProgressSink {
    pub(crate) fn new(
        car_id: CarId,
        tx: mpsc::Sender<SyncProgress>,
        statuses: Arc<RwLock<HashMap<CarId, SyncProgress>>>,
    ) -> Self {
        Self {
            car_id,
            tx,
            statuses,
        }
    }

    pub(crate) async fn emit(
        &self,
        phase: SyncPhase,
        current_item: usize,
        total_items: usize,
        message: Option<String>,
    ) {
        let progress = SyncProgress {
            car_id: self.car_id,
            phase,
            current_item,
            total_items,
            message,
        };
        self.statuses
            .write()
            .await
            .insert(self.car_id, progress.clone());
        // Never block the pipeline on a slow or absent observer
        let _ = self.tx.try_send(progress);
    }

    pub(crate) async fn current_phase(&self) -> Option<SyncPhase> {
        self.statuses
            .read()
            .await
            .get(&self.car_id)
            .map(|p| p.phase)
    }
}

/// Run the full staged pipeline for one vehicle.
pub(crate) async fn run_sync(
    pool: SqlitePool,
    client: Arc<TelemetryClient>,
    logs: Arc<SyncLogCollector>,
    session: Arc<SessionState>,
    car_id: CarId,
    sink: &ProgressSink,
) -> Result<SyncSummary> {
    let started = std::time::Instant::now();
    logs.log(TAG, &format!("Starting sync for car {car_id}"));

    // Phase 1: summaries behind the durable cursor
    sink.emit(SyncPhase::SyncingSummaries, 0, 0, None).await;
    let (drives_upserted, charges_upserted) =
        match sync_summaries(&pool, &client, &logs, &session, car_id, sink).await {
            Ok(counts) => counts,
            Err(e) => {
                let msg = format!("Summary sync failed: {e}");
                logs.log_error(TAG, &msg, None);
                sink.emit(SyncPhase::Error, 0, 0, Some(msg)).await;
                return Err(e);
            }
        };

    // Phase 2: drive details
    let drive_outcome =
        match sync_drive_details(&pool, &client, &logs, &session, car_id, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let msg = format!("Drive detail sync failed: {e}");
                logs.log_error(TAG, &msg, None);
                sink.emit(SyncPhase::Error, 0, 0, Some(msg)).await;
                return Err(e);
            }
        };

    // Phase 3: charge details
    let charge_outcome =
        match sync_charge_details(&pool, &client, &logs, &session, car_id, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let msg = format!("Charge detail sync failed: {e}");
                logs.log_error(TAG, &msg, None);
                sink.emit(SyncPhase::Error, 0, 0, Some(msg)).await;
                return Err(e);
            }
        };

    sync_state::set_schema_version(&pool, car_id, AGGREGATE_SCHEMA_VERSION, now()).await?;
    sink.emit(SyncPhase::Complete, 0, 0, None).await;

    let summary = SyncSummary {
        car_id,
        duration_seconds: started.elapsed().as_secs(),
        drives_upserted,
        charges_upserted,
        drive_aggregates_computed: drive_outcome.computed,
        charge_aggregates_computed: charge_outcome.computed,
        locations_enqueued: drive_outcome.enqueued + charge_outcome.enqueued,
        errors_encountered: drive_outcome.errors + charge_outcome.errors,
    };

    info!(
        car_id,
        drives = summary.drives_upserted,
        charges = summary.charges_upserted,
        aggregates = summary.drive_aggregates_computed + summary.charge_aggregates_computed,
        enqueued = summary.locations_enqueued,
        errors = summary.errors_encountered,
        seconds = summary.duration_seconds,
        "sync complete"
    );
    logs.log(
        TAG,
        &format!(
            "Sync complete: {} drives, {} charges, {} locations enqueued, {} errors in {}s",
            summary.drives_upserted,
            summary.charges_upserted,
            summary.locations_enqueued,
            summary.errors_encountered,
            summary.duration_seconds
        ),
    );

    Ok(summary)
}

/// Page both list endpoints, upserting rows and advancing the cursor after
/// each fully persisted page - never after individual records, so a crash
/// mid-page replays that page instead of skipping records.
async fn sync_summaries(
    pool: &SqlitePool,
    client: &TelemetryClient,
    logs: &SyncLogCollector,
    session: &SessionState,
    car_id: CarId,
    sink: &ProgressSink,
) -> Result<(usize, usize)> {
    let cursor = sync_state::get_or_create(pool, car_id).await?;

    let mut drives_upserted = 0usize;
    if session.is_unsupported(car_id, Resource::Drives) {
        debug!(car_id, "skipping drives list (unsupported this session)");
    } else {
        let mut since = (cursor.last_drive_id > 0).then_some(cursor.last_drive_id);
        loop {
            let page = match client.list_drives(car_id, since, PAGE_SIZE).await {
                Ok(page) => page,
                Err(ClientError::Unsupported(_)) => {
                    session.mark_unsupported(car_id, Resource::Drives);
                    logs.log(TAG, "Drives endpoint not supported, skipping");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            let rows: Vec<drives::DriveSummary> =
                page.into_iter().map(|r| map_drive_summary(car_id, r)).collect();
            drives::upsert_all(pool, &rows).await?;

            if let Some(max_id) = rows.iter().map(|r| r.drive_id).max() {
                sync_state::set_last_drive_id(pool, car_id, max_id, now()).await?;
                // a page that does not advance the cursor would loop forever
                if since == Some(max_id) {
                    break;
                }
                since = Some(max_id);
            }

            drives_upserted += page_len;
            sink.emit(SyncPhase::SyncingSummaries, drives_upserted, 0, None)
                .await;

            if page_len < PAGE_SIZE {
                break;
            }
        }
    }

    let mut charges_upserted = 0usize;
    if session.is_unsupported(car_id, Resource::Charges) {
        debug!(car_id, "skipping charges list (unsupported this session)");
    } else {
        let mut since = (cursor.last_charge_id > 0).then_some(cursor.last_charge_id);
        loop {
            let page = match client.list_charges(car_id, since, PAGE_SIZE).await {
                Ok(page) => page,
                Err(ClientError::Unsupported(_)) => {
                    session.mark_unsupported(car_id, Resource::Charges);
                    logs.log(TAG, "Charges endpoint not supported, skipping");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            let rows: Vec<charges::ChargeSummary> = page
                .into_iter()
                .map(|r| map_charge_summary(car_id, r))
                .collect();
            charges::upsert_all(pool, &rows).await?;

            if let Some(max_id) = rows.iter().map(|r| r.charge_id).max() {
                sync_state::set_last_charge_id(pool, car_id, max_id, now()).await?;
                // a page that does not advance the cursor would loop forever
                if since == Some(max_id) {
                    break;
                }
                since = Some(max_id);
            }

            charges_upserted += page_len;
            sink.emit(
                SyncPhase::SyncingSummaries,
                drives_upserted + charges_upserted,
                0,
                None,
            )
            .await;

            if page_len < PAGE_SIZE {
                break;
            }
        }
    }

    Ok((drives_upserted, charges_upserted))
}

/// Per-stage counters for a detail pass.
#[derive(Debug, Default)]
struct DetailOutcome {
    computed: usize,
    enqueued: usize,
    errors: usize,
}

/// Bring drive aggregates up to date with the summaries. Records whose
/// aggregate is missing or stamped with an older schema version are
/// reprocessed; a failure on one record is logged and skipped so a single
/// malformed drive cannot block the stage.
async fn sync_drive_details(
    pool: &SqlitePool,
    client: &TelemetryClient,
    logs: &SyncLogCollector,
    session: &SessionState,
    car_id: CarId,
    sink: &ProgressSink,
) -> Result<DetailOutcome> {
    let ids = drives::unprocessed_ids(pool, car_id, AGGREGATE_SCHEMA_VERSION).await?;
    sink.emit(SyncPhase::SyncingDriveDetails, 0, ids.len(), None)
        .await;

    let mut outcome = DetailOutcome::default();
    if ids.is_empty() || session.is_unsupported(car_id, Resource::DriveDetails) {
        return Ok(outcome);
    }

    let total = ids.len();
    for (i, drive_id) in ids.into_iter().enumerate() {
        match client.drive_detail(car_id, drive_id).await {
            Ok(detail) => {
                let mut agg = aggregate::drive_aggregate_from_detail(car_id, drive_id, &detail, now());

                if let (Some(lat), Some(lon)) = (agg.start_latitude, agg.start_longitude) {
                    match resolve_or_enqueue(pool, car_id, lat, lon, now()).await? {
                        Resolution::Cached(place) => {
                            agg.country_code = place.country_code;
                            agg.country_name = place.country_name;
                            agg.region_name = place.region_name;
                            agg.city = place.city;
                        }
                        Resolution::Enqueued => outcome.enqueued += 1,
                        Resolution::AlreadyQueued => {}
                    }
                }

                aggregates::upsert_drive(pool, &agg).await?;
                outcome.computed += 1;
            }
            Err(ClientError::Unsupported(_)) => {
                session.mark_unsupported(car_id, Resource::DriveDetails);
                logs.log(TAG, "Drive detail endpoint not supported, skipping stage");
                break;
            }
            Err(e) => {
                // Record stays unprocessed; the next run retries it
                outcome.errors += 1;
                logs.log_error(TAG, &format!("Drive {drive_id} detail failed"), Some(&e));
            }
        }

        sink.emit(SyncPhase::SyncingDriveDetails, i + 1, total, None)
            .await;
    }

    Ok(outcome)
}

/// Bring charge aggregates up to date with the summaries.
async fn sync_charge_details(
    pool: &SqlitePool,
    client: &TelemetryClient,
    logs: &SyncLogCollector,
    session: &SessionState,
    car_id: CarId,
    sink: &ProgressSink,
) -> Result<DetailOutcome> {
    let ids = charges::unprocessed_ids(pool, car_id, AGGREGATE_SCHEMA_VERSION).await?;
    sink.emit(SyncPhase::SyncingChargeDetails, 0, ids.len(), None)
        .await;

    let mut outcome = DetailOutcome::default();
    if ids.is_empty() || session.is_unsupported(car_id, Resource::ChargeDetails) {
        return Ok(outcome);
    }

    let total = ids.len();
    for (i, charge_id) in ids.into_iter().enumerate() {
        let Some(summary) = charges::get(pool, charge_id).await? else {
            continue;
        };

        match client.charge_detail(car_id, charge_id).await {
            Ok(detail) => {
                let mut agg = aggregate::charge_aggregate_from_detail(
                    car_id,
                    charge_id,
                    summary.latitude,
                    summary.longitude,
                    &detail,
                    now(),
                );

                match resolve_or_enqueue(pool, car_id, summary.latitude, summary.longitude, now())
                    .await?
                {
                    Resolution::Cached(place) => {
                        agg.country_code = place.country_code;
                        agg.country_name = place.country_name;
                        agg.region_name = place.region_name;
                        agg.city = place.city;
                    }
                    Resolution::Enqueued => outcome.enqueued += 1,
                    Resolution::AlreadyQueued => {}
                }

                aggregates::upsert_charge(pool, &agg).await?;
                outcome.computed += 1;
            }
            Err(ClientError::Unsupported(_)) => {
                session.mark_unsupported(car_id, Resource::ChargeDetails);
                logs.log(TAG, "Charge detail endpoint not supported, skipping stage");
                break;
            }
            Err(e) => {
                outcome.errors += 1;
                logs.log_error(TAG, &format!("Charge {charge_id} detail failed"), Some(&e));
            }
        }

        sink.emit(SyncPhase::SyncingChargeDetails, i + 1, total, None)
            .await;
    }

    Ok(outcome)
}

fn map_drive_summary(
    car_id: CarId,
    record: carlog_client::DriveSummaryRecord,
) -> drives::DriveSummary {
    let distance_km = record.distance.unwrap_or(0.0);
    let efficiency_wh_km =
        carlog_core::compute::efficiency_wh_per_km(record.energy_consumed, distance_km);

    drives::DriveSummary {
        drive_id: record.id,
        car_id,
        start_date: record.start_date,
        end_date: record.end_date,
        duration_min: record.duration_min.unwrap_or(0),
        start_address: record.start_address.unwrap_or_default(),
        end_address: record.end_address.unwrap_or_default(),
        distance_km,
        speed_max: record.speed_max.unwrap_or(0),
        speed_avg: record.speed_avg.unwrap_or(0),
        power_max: record.power_max.unwrap_or(0),
        power_min: record.power_min.unwrap_or(0),
        start_battery_level: record.start_battery_level.unwrap_or(0),
        end_battery_level: record.end_battery_level.unwrap_or(0),
        outside_temp_avg: record.outside_temp_avg,
        inside_temp_avg: record.inside_temp_avg,
        energy_consumed_kwh: record.energy_consumed,
        efficiency_wh_km,
    }
}

fn map_charge_summary(
    car_id: CarId,
    record: carlog_client::ChargeSummaryRecord,
) -> charges::ChargeSummary {
    charges::ChargeSummary {
        charge_id: record.id,
        car_id,
        start_date: record.start_date,
        end_date: record.end_date,
        duration_min: record.duration_min.unwrap_or(0),
        address: record.address.unwrap_or_default(),
        latitude: record.latitude,
        longitude: record.longitude,
        energy_added_kwh: record.charge_energy_added.unwrap_or(0.0),
        energy_used_kwh: record.charge_energy_used,
        cost: record.cost,
        start_battery_level: record.start_battery_level.unwrap_or(0),
        end_battery_level: record.end_battery_level.unwrap_or(0),
        outside_temp_avg: record.outside_temp_avg,
        odometer_km: record.odometer.unwrap_or(0.0),
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
