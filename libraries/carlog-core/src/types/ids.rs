//! Identifier aliases for telemetry entities.
//!
//! The backend assigns monotonically increasing integer ids to drives and
//! charges; vehicles are numbered small integers. Plain `i64` aliases keep
//! the SQLite layer free of conversions.

/// Vehicle identifier as assigned by the telemetry backend.
pub type CarId = i64;

/// Drive record identifier (monotonic per backend database).
pub type DriveId = i64;

/// Charge record identifier (monotonic per backend database).
pub type ChargeId = i64;
