//! Domain types shared across the workspace.

mod filter;
mod grid;
mod ids;
mod sync;

pub use filter::{TimeBucket, YearFilter};
pub use grid::GridCell;
pub use ids::{CarId, ChargeId, DriveId};
pub use sync::{GeocodeProgress, SyncPhase, SyncProgress, SyncSummary};
