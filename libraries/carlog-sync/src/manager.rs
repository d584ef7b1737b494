//! Per-vehicle sync orchestration.

use crate::engine::{self, ProgressSink, SessionState};
use crate::error::{Result, SyncError};
use carlog_client::TelemetryClient;
use carlog_core::{CarId, SyncLogCollector, SyncPhase, SyncProgress, SyncSummary};
use carlog_storage::{charges, drives, geocode_progress, geocode_queue, sync_state};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use tracing::info;

const TAG: &str = "SyncManager";

/// Orchestrates sync runs across vehicles.
///
/// At most one run is active per vehicle: a second trigger while one is in
/// flight is rejected with [`SyncError::AlreadySyncing`] rather than queued.
/// Runs are detached tasks - they survive observers dropping their progress
/// receiver, so navigating away from a screen never cancels a sync.
pub struct SyncManager {
    pool: SqlitePool,
    client: Arc<TelemetryClient>,
    logs: Arc<SyncLogCollector>,
    session: Arc<SessionState>,
    in_flight: Arc<Mutex<HashSet<CarId>>>,
    statuses: Arc<RwLock<HashMap<CarId, SyncProgress>>>,
}

impl SyncManager {
    /// Create a manager over a store and a telemetry client.
    pub fn new(pool: SqlitePool, client: Arc<TelemetryClient>) -> Self {
        Self::with_logs(pool, client, Arc::new(SyncLogCollector::new()))
    }

    /// Create a manager sharing an existing log collector.
    pub fn with_logs(
        pool: SqlitePool,
        client: Arc<TelemetryClient>,
        logs: Arc<SyncLogCollector>,
    ) -> Self {
        Self {
            pool,
            client,
            logs,
            session: Arc::new(SessionState::default()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The shared log collector.
    pub fn logs(&self) -> Arc<SyncLogCollector> {
        Arc::clone(&self.logs)
    }

    /// Whether a sync run is currently active for a vehicle.
    pub fn is_syncing(&self, car_id: CarId) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(&car_id))
            .unwrap_or(false)
    }

    /// Start a sync run for a vehicle.
    ///
    /// Returns the run's progress stream and join handle. Fails with
    /// [`SyncError::AlreadySyncing`] when a run is already in flight for
    /// this vehicle.
    pub async fn start_sync(
        &self,
        car_id: CarId,
    ) -> Result<(
        mpsc::Receiver<SyncProgress>,
        tokio::task::JoinHandle<Result<SyncSummary>>,
    )> {
        // Run-if-not-already-running guard
        let guard = {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| SyncError::InvalidState("in-flight registry poisoned".into()))?;
            if !in_flight.insert(car_id) {
                return Err(SyncError::AlreadySyncing);
            }
            FlightGuard {
                car_id,
                registry: Arc::clone(&self.in_flight),
            }
        };

        info!(car_id, "starting sync");

        let (tx, rx) = mpsc::channel(100);
        let sink = ProgressSink::new(car_id, tx, Arc::clone(&self.statuses));
        let pool = self.pool.clone();
        let client = Arc::clone(&self.client);
        let logs = Arc::clone(&self.logs);
        let session = Arc::clone(&self.session);

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = engine::run_sync(pool, client, logs.clone(), session, car_id, &sink).await;

            if let Err(e) = &result {
                // Storage-level failures bubble up without a phase marker;
                // make sure observers still see the terminal error state.
                if sink.current_phase().await != Some(SyncPhase::Error) {
                    let msg = format!("Sync failed: {e}");
                    logs.log_error(TAG, &msg, None);
                    sink.emit(SyncPhase::Error, 0, 0, Some(msg)).await;
                }
            }

            result
        });

        Ok((rx, handle))
    }

    /// Latest progress snapshot for a vehicle; `Idle` before the first run.
    pub async fn get_status(&self, car_id: CarId) -> SyncProgress {
        self.statuses
            .read()
            .await
            .get(&car_id)
            .cloned()
            .unwrap_or_else(|| SyncProgress::idle(car_id))
    }

    /// Delete everything persisted for a vehicle and start over.
    ///
    /// Drops summaries (aggregates cascade), the sync cursor, the geocoding
    /// progress row, and the vehicle's pending queue rows, then re-triggers
    /// the pipeline from idle. The shared geocode cache is left intact so
    /// already-resolved cells stay reusable.
    pub async fn full_reset(
        &self,
        car_id: CarId,
    ) -> Result<(
        mpsc::Receiver<SyncProgress>,
        tokio::task::JoinHandle<Result<SyncSummary>>,
    )> {
        if self.is_syncing(car_id) {
            return Err(SyncError::AlreadySyncing);
        }

        info!(car_id, "full reset");
        self.logs.log(TAG, &format!("Full reset for car {car_id}"));

        drives::delete_all_for_car(&self.pool, car_id).await?;
        charges::delete_all_for_car(&self.pool, car_id).await?;
        sync_state::delete(&self.pool, car_id).await?;
        geocode_queue::clear_for_car(&self.pool, car_id).await?;
        geocode_progress::delete(&self.pool, car_id).await?;

        self.statuses.write().await.remove(&car_id);

        self.start_sync(car_id).await
    }
}

/// Removes the vehicle from the in-flight registry when its run ends,
/// whether it completed, failed, or was aborted.
struct FlightGuard {
    car_id: CarId,
    registry: Arc<Mutex<HashSet<CarId>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.registry.lock() {
            set.remove(&self.car_id);
        }
    }
}
