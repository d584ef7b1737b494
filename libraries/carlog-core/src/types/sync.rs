//! Sync and geocoding progress types observed by the UI.

use crate::types::CarId;
use serde::{Deserialize, Serialize};

/// Stage of the per-vehicle sync state machine.
///
/// A run moves `Idle → SyncingSummaries → SyncingDriveDetails →
/// SyncingChargeDetails → Complete`; `Error` is reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No sync running for this vehicle.
    Idle,
    /// Paging through the remote drive/charge list endpoints.
    SyncingSummaries,
    /// Fetching drive details and computing aggregates.
    SyncingDriveDetails,
    /// Fetching charge details and computing aggregates.
    SyncingChargeDetails,
    /// Run finished successfully.
    Complete,
    /// Run aborted; see the progress message.
    Error,
}

impl SyncPhase {
    /// Convert to string for logs and persistence.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SyncingSummaries => "syncing_summaries",
            Self::SyncingDriveDetails => "syncing_drive_details",
            Self::SyncingChargeDetails => "syncing_charge_details",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress snapshot for a vehicle's sync run.
///
/// Emitted after each unit of work (page or detail record) so observers
/// never need to poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Vehicle this snapshot belongs to.
    pub car_id: CarId,
    /// Current stage of the state machine.
    pub phase: SyncPhase,
    /// Units of work finished in the current stage.
    pub current_item: usize,
    /// Units of work expected in the current stage (0 when unknown).
    pub total_items: usize,
    /// Human-readable detail, set on errors and stage transitions.
    pub message: Option<String>,
}

impl SyncProgress {
    /// An idle snapshot for a vehicle with no run in flight.
    #[must_use]
    pub fn idle(car_id: CarId) -> Self {
        Self {
            car_id,
            phase: SyncPhase::Idle,
            current_item: 0,
            total_items: 0,
            message: None,
        }
    }

    /// Completion fraction in `[0, 1]`; `0` when the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total_items > 0 {
            self.current_item as f32 / self.total_items as f32
        } else {
            0.0
        }
    }

    /// Whether the run reached the terminal success stage.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SyncPhase::Complete
    }
}

/// Summary of a finished sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Vehicle that was synced.
    pub car_id: CarId,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: u64,
    /// Drive summary rows upserted.
    pub drives_upserted: usize,
    /// Charge summary rows upserted.
    pub charges_upserted: usize,
    /// Drive aggregates computed this run.
    pub drive_aggregates_computed: usize,
    /// Charge aggregates computed this run.
    pub charge_aggregates_computed: usize,
    /// Distinct grid cells newly enqueued for geocoding.
    pub locations_enqueued: usize,
    /// Record-level failures that were logged and skipped.
    pub errors_encountered: usize,
}

/// Per-vehicle geocoding progress counters.
///
/// `total_locations` counts distinct grid cells ever enqueued for the
/// vehicle; `processed_locations` counts successful lookups. Both only grow
/// between explicit resets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeocodeProgress {
    /// Vehicle the counters belong to.
    pub car_id: CarId,
    /// Distinct cells ever enqueued.
    pub total_locations: i64,
    /// Cells successfully geocoded.
    pub processed_locations: i64,
    /// Unix seconds of the last counter mutation.
    pub last_updated_at: i64,
}

impl GeocodeProgress {
    /// Resolved fraction in `[0, 1]`, clamped so concurrent counter writes
    /// can never surface as more than 100%.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total_locations > 0 {
            (self.processed_locations.min(self.total_locations) as f32)
                / self.total_locations as f32
        } else {
            0.0
        }
    }
}
