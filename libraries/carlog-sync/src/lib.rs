//! Carlog Sync
//!
//! Per-vehicle staged synchronization of telemetry history into the local
//! store.
//!
//! A sync run pages the remote drive and charge lists behind a durable
//! cursor, upserts summary rows, then brings per-record aggregates up to
//! date with the summaries - fetching detail payloads, computing extremes
//! and classifications, and handing unresolved coordinates to the geocoding
//! queue. Runs are sequential per vehicle and survive observers coming and
//! going; progress is pushed to subscribers, never polled.

mod aggregate;
mod engine;
mod error;
mod manager;

// Public exports
pub use error::{Result, SyncError};
pub use manager::SyncManager;

pub use carlog_core::{SyncPhase, SyncProgress, SyncSummary};
