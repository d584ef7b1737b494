//! Carlog Geocoding
//!
//! Reverse-geocoding subsystem: a rate-limited lookup client and the
//! background worker that drains the durable geocode queue.
//!
//! The external service allows roughly one request per second, so lookups
//! are deduplicated onto a 0.01° grid (one cache row per cell) and drained
//! by a single worker that enforces a hard delay floor between calls.
//!
//! # Example
//!
//! ```ignore
//! use carlog_geocode::{GeocodeClient, GeocodeWorker, DrainOutcome};
//!
//! let client = GeocodeClient::new("https://nominatim.openstreetmap.org")?;
//! let worker = GeocodeWorker::new(pool, client, logs);
//!
//! // One bounded drain run; the scheduler re-invokes on Retry
//! match worker.run_once().await? {
//!     DrainOutcome::Done => {}
//!     DrainOutcome::Retry => { /* schedule another run with backoff */ }
//! }
//! ```

mod client;
mod error;
mod resolve;
mod worker;

pub use client::{GeocodeClient, Place};
pub use error::{GeocodeError, Result};
pub use resolve::{resolve_or_enqueue, Resolution};
pub use worker::{DrainOutcome, GeocodeWorker};
