//! Wire types for the telemetry backend API.
//!
//! List endpoints return flat summary records; detail endpoints embed the
//! full time series. Most numeric fields are optional on the wire - older
//! backend versions omit what they never recorded - and the sync engine
//! picks defaults when projecting into storage rows.

use serde::{Deserialize, Serialize};

/// Connection settings for a telemetry backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `https://teslamate.example.com`
    pub url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
}

impl ServerConfig {
    /// Create a config with no token.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_token: None,
        }
    }

    /// Attach an API token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }
}

/// Envelope wrapping every backend response body.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// One record from the drive list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveSummaryRecord {
    pub id: i64,
    pub start_date: String,
    pub end_date: String,
    pub duration_min: Option<i64>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    /// Distance in km.
    pub distance: Option<f64>,
    pub speed_max: Option<i64>,
    pub speed_avg: Option<i64>,
    pub power_max: Option<i64>,
    pub power_min: Option<i64>,
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
    pub outside_temp_avg: Option<f64>,
    pub inside_temp_avg: Option<f64>,
    /// Energy consumed in kWh.
    pub energy_consumed: Option<f64>,
}

/// One record from the charge list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSummaryRecord {
    pub id: i64,
    pub start_date: String,
    pub end_date: String,
    pub duration_min: Option<i64>,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub charge_energy_added: Option<f64>,
    pub charge_energy_used: Option<f64>,
    pub cost: Option<f64>,
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
    pub outside_temp_avg: Option<f64>,
    pub odometer: Option<f64>,
}

/// Full drive detail with the embedded position series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveDetail {
    pub id: i64,
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// One sampled point along a drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<i64>,
    pub power: Option<i64>,
    /// Elevation in meters.
    pub elevation: Option<i64>,
    pub battery_level: Option<i64>,
    pub outside_temp: Option<f64>,
}

/// Full charge detail with the embedded charge-point series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeDetail {
    pub id: i64,
    #[serde(default)]
    pub charge_points: Vec<ChargePoint>,
}

/// One sampled point during a charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePoint {
    pub charger_power: Option<i64>,
    pub charger_voltage: Option<i64>,
    pub charger_current: Option<i64>,
    /// 1-3 for AC; 0 or absent means the onboard charger is bypassed (DC).
    pub charger_phases: Option<i64>,
    pub outside_temp: Option<f64>,
    pub battery_level: Option<i64>,
}

/// Display units and live state for a vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStatus {
    pub display_name: Option<String>,
    /// `km` or `mi`.
    pub unit_of_length: Option<String>,
    /// `C` or `F`.
    pub unit_of_temperature: Option<String>,
    /// e.g. `online`, `asleep`, `driving`, `charging`.
    pub state: Option<String>,
    pub battery_level: Option<i64>,
    pub odometer: Option<f64>,
}
