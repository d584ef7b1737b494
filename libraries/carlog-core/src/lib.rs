//! Carlog Core
//!
//! Shared domain types for the Carlog telemetry mirror.
//!
//! This crate defines the vocabulary used across the sync, geocoding, and
//! stats crates:
//!
//! - **Identifiers**: `CarId`, `DriveId`, `ChargeId`
//! - **Grid cells**: the integer 0.01° coordinate key used to deduplicate
//!   reverse-geocoding lookups
//! - **Sync state**: `SyncPhase`, `SyncProgress`, `SyncSummary`
//! - **Read-side filters**: `YearFilter`, `TimeBucket`
//! - **Aggregate helpers**: pure functions over detail time series
//!
//! # Example
//!
//! ```rust
//! use carlog_core::types::GridCell;
//!
//! let a = GridCell::from_coords(45.001, 9.001);
//! let b = GridCell::from_coords(45.004, 9.003);
//! assert_eq!(a, b); // both round onto the (4500, 900) cell
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compute;
pub mod logbuf;
pub mod types;

pub use logbuf::SyncLogCollector;
pub use types::{
    CarId, ChargeId, DriveId, GeocodeProgress, GridCell, SyncPhase, SyncProgress, SyncSummary,
    TimeBucket, YearFilter,
};

/// Current version of the aggregate derivation logic.
///
/// Persisted aggregates stamped with an older version are selected for
/// reprocessing on the next sync run. Bump this whenever the derivation in
/// `compute` (or the sync engine's aggregate mapping) changes meaning.
pub const AGGREGATE_SCHEMA_VERSION: i32 = 5;
