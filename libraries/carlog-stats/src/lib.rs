//! Carlog Stats
//!
//! Read-side statistics over the persisted summaries and aggregates.
//!
//! Everything here is a pure query: stats reflect whatever is currently in
//! the store and never block on sync completion. Callers re-query as sync
//! progress changes instead of caching results; partially-synced data simply
//! yields smaller numbers.

mod reader;

pub use reader::{
    CarStats, ChargeStats, DriveStats, LocationStats, StatsError, StatsReader, TimeSeries,
};

pub use carlog_core::{TimeBucket, YearFilter};
