//! Carlog Telemetry Client
//!
//! HTTP client for the vehicle-telemetry backend API.
//!
//! # Features
//!
//! - **History paging**: drive/charge list endpoints with a since-id cursor
//! - **Detail fetch**: full position / charge-point series per record
//! - **Status**: display units and live vehicle state
//!
//! # Example
//!
//! ```ignore
//! use carlog_client::{ServerConfig, TelemetryClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("https://teslamate.example.com");
//!     let client = TelemetryClient::new(config)?;
//!
//!     // First page of drive history for car 1
//!     let drives = client.list_drives(1, None, 50).await?;
//!     println!("Fetched {} drives", drives.len());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

// Re-export main types
pub use client::TelemetryClient;
pub use error::{ClientError, Result};
pub use types::{
    ChargeDetail, ChargePoint, ChargeSummaryRecord, DriveDetail, DriveSummaryRecord, Position,
    ServerConfig, VehicleStatus,
};
