//! Background drain worker for the geocode queue.

use crate::client::GeocodeClient;
use crate::error::{GeocodeError, Result};
use carlog_core::SyncLogCollector;
use carlog_storage::aggregates::{self, PlaceFields};
use carlog_storage::geocode_cache::{self, GeocodeCacheEntry};
use carlog_storage::{geocode_progress, geocode_queue};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const TAG: &str = "GeocodeWorker";

/// Hard floor between consecutive external lookups. The service allows one
/// request per second; the extra 100 ms is slack for clock skew.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(1100);

/// Items processed per drain run before yielding back to the scheduler.
pub const MAX_PER_RUN: usize = 100;

/// Consecutive failures that end a run early (the service is likely down).
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// What the scheduler should do after a drain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No pending items remain.
    Done,
    /// Pending items remain; re-invoke later (with backoff).
    Retry,
}

/// Drains the geocode queue at the external service's allowed rate.
///
/// A process-wide singleton: only one drain run may be active at a time,
/// across all vehicles. Each run is bounded by [`MAX_PER_RUN`] and
/// [`MAX_CONSECUTIVE_FAILURES`]; unfinished work is signalled through
/// [`DrainOutcome::Retry`] so the external scheduler re-invokes with backoff.
///
/// Cancellation between items is safe: every item's database writes complete
/// before the inter-request delay, and an aborted in-flight lookup leaves
/// its row queued with the prior attempt count.
pub struct GeocodeWorker {
    pool: SqlitePool,
    client: GeocodeClient,
    logs: Arc<SyncLogCollector>,
    rate_limit: Duration,
    max_per_run: usize,
    max_consecutive_failures: u32,
    running: AtomicBool,
}

impl GeocodeWorker {
    /// Create a worker with the default limits.
    pub fn new(pool: SqlitePool, client: GeocodeClient, logs: Arc<SyncLogCollector>) -> Self {
        Self {
            pool,
            client,
            logs,
            rate_limit: DEFAULT_RATE_LIMIT,
            max_per_run: MAX_PER_RUN,
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES,
            running: AtomicBool::new(false),
        }
    }

    /// Override the delay floor between lookups.
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Override the per-run item cap.
    #[must_use]
    pub fn with_max_per_run(mut self, max_per_run: usize) -> Self {
        self.max_per_run = max_per_run;
        self
    }

    /// Whether a drain run is currently active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Execute one bounded drain run.
    ///
    /// Returns [`GeocodeError::AlreadyRunning`] if a run is already active.
    pub async fn run_once(&self) -> Result<DrainOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GeocodeError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        self.logs.log(TAG, "Starting geocode drain");

        let mut processed = 0usize;
        let mut consecutive_failures = 0u32;
        let mut queue_exhausted = false;

        while processed < self.max_per_run && consecutive_failures < self.max_consecutive_failures {
            let batch = geocode_queue::next_batch(&self.pool, 1).await?;
            let Some(item) = batch.into_iter().next() else {
                queue_exhausted = true;
                self.logs.log(TAG, "Queue empty, geocoding complete");
                break;
            };

            match self.client.reverse(item.latitude, item.longitude).await {
                Ok(place) if !place.is_empty() => {
                    self.apply_resolution(&item, &place).await?;
                    processed += 1;
                    consecutive_failures = 0;

                    if processed % 10 == 0 {
                        let remaining = geocode_queue::count_pending(&self.pool).await?;
                        self.logs.log(
                            TAG,
                            &format!("Identifying locations... ({remaining} remaining)"),
                        );
                    }
                }
                Ok(_) => {
                    // Service answered but knows nothing about the coordinate
                    self.record_failure(&item, &mut consecutive_failures, "empty result")
                        .await?;
                }
                Err(e @ (GeocodeError::Request(_) | GeocodeError::Server { .. } | GeocodeError::Parse(_))) => {
                    self.record_failure(&item, &mut consecutive_failures, &e.to_string())
                        .await?;
                }
                Err(e) => return Err(e),
            }

            // Rate limit: hard floor between consecutive external calls
            tokio::time::sleep(self.rate_limit).await;
        }

        info!(processed, "geocode drain run finished");
        self.logs
            .log(TAG, &format!("Processed {processed} locations this run"));

        let remaining = geocode_queue::count_pending(&self.pool).await?;
        if remaining > 0 {
            self.logs
                .log(TAG, &format!("{remaining} locations remaining, scheduling retry"));
            return Ok(DrainOutcome::Retry);
        }

        // Queue fully drained: reconcile the progress counters with the
        // cache so stale totals cannot keep the percentage below 100.
        if queue_exhausted {
            let cached = geocode_cache::count(&self.pool).await?;
            geocode_progress::sync_with_cache(&self.pool, cached, now()).await?;
        }

        self.logs.log(TAG, "All locations geocoded");
        Ok(DrainOutcome::Done)
    }

    /// Cache the resolution, back-fill matching aggregates, and retire the
    /// queue item. The cache write completes first so the back-fill always
    /// reads freshly persisted values.
    async fn apply_resolution(
        &self,
        item: &geocode_queue::GeocodeQueueItem,
        place: &crate::client::Place,
    ) -> Result<()> {
        let cell = item.cell();

        geocode_cache::upsert(
            &self.pool,
            &GeocodeCacheEntry {
                grid_lat: cell.lat,
                grid_lon: cell.lon,
                country_code: place.country_code.clone(),
                country_name: place.country_name.clone(),
                region_name: place.region_name.clone(),
                city: place.city.clone(),
                cached_at: now(),
            },
        )
        .await?;

        // Back-fill every aggregate in the cell, regardless of which
        // vehicle originally enqueued it
        let fields = PlaceFields {
            country_code: place.country_code.clone(),
            country_name: place.country_name.clone(),
            region_name: place.region_name.clone(),
            city: place.city.clone(),
        };
        let drives = aggregates::update_drive_locations_in_grid(&self.pool, cell, &fields).await?;
        let charges = aggregates::update_charge_locations_in_grid(&self.pool, cell, &fields).await?;
        debug!(%cell, drives, charges, "back-filled aggregates");

        geocode_queue::remove(&self.pool, cell).await?;

        geocode_progress::ensure(&self.pool, item.car_id).await?;
        geocode_progress::increment_processed(&self.pool, item.car_id, now()).await?;

        Ok(())
    }

    async fn record_failure(
        &self,
        item: &geocode_queue::GeocodeQueueItem,
        consecutive_failures: &mut u32,
        reason: &str,
    ) -> Result<()> {
        geocode_queue::mark_attempt(&self.pool, item.cell(), now()).await?;
        *consecutive_failures += 1;
        warn!(cell = %item.cell(), reason, "geocode lookup failed");
        self.logs.log(
            TAG,
            &format!(
                "Geocoding failed for grid {}, error count: {consecutive_failures}",
                item.cell()
            ),
        );
        Ok(())
    }
}

/// Resets the running flag when a run finishes or its task is aborted.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
