//! Main telemetry backend client.

use crate::error::{ClientError, Result};
use crate::types::{
    ChargeDetail, ChargeSummaryRecord, DriveDetail, DriveSummaryRecord, Envelope, ServerConfig,
    VehicleStatus,
};
use carlog_core::CarId;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Client for the telemetry backend's read API.
///
/// Pure I/O boundary: no business logic, no retries. Every expected failure
/// maps onto a [`ClientError`] variant so callers can pick a retry policy.
///
/// # Example
///
/// ```ignore
/// use carlog_client::{ServerConfig, TelemetryClient};
///
/// let config = ServerConfig::new("https://teslamate.example.com");
/// let client = TelemetryClient::new(config)?;
///
/// // Page through drives newer than id 1200
/// let page = client.list_drives(1, Some(1200), 50).await?;
/// ```
pub struct TelemetryClient {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

impl TelemetryClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        // Validate URL
        if config.url.is_empty() {
            return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
        }

        // Parse and normalize URL
        let url = config.url.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        // Create HTTP client with reasonable defaults
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Carlog/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            http,
            base_url: url,
            api_token: config.api_token,
        })
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A page of drive history for a car, oldest first, strictly after
    /// `since_id` when given. A page shorter than `limit` is the last one.
    pub async fn list_drives(
        &self,
        car_id: CarId,
        since_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<DriveSummaryRecord>> {
        let url = self.list_url("drives", car_id, since_id, limit);
        self.get_json(&url).await
    }

    /// A page of charge history for a car, oldest first, strictly after
    /// `since_id` when given.
    pub async fn list_charges(
        &self,
        car_id: CarId,
        since_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<ChargeSummaryRecord>> {
        let url = self.list_url("charges", car_id, since_id, limit);
        self.get_json(&url).await
    }

    /// Full detail for one drive, including its position series.
    pub async fn drive_detail(&self, car_id: CarId, drive_id: i64) -> Result<DriveDetail> {
        let url = format!(
            "{}/api/v1/cars/{}/drives/{}",
            self.base_url, car_id, drive_id
        );
        self.get_json(&url).await
    }

    /// Full detail for one charge, including its charge-point series.
    pub async fn charge_detail(&self, car_id: CarId, charge_id: i64) -> Result<ChargeDetail> {
        let url = format!(
            "{}/api/v1/cars/{}/charges/{}",
            self.base_url, car_id, charge_id
        );
        self.get_json(&url).await
    }

    /// Display units and live state for a vehicle.
    pub async fn vehicle_status(&self, car_id: CarId) -> Result<VehicleStatus> {
        let url = format!("{}/api/v1/cars/{}/status", self.base_url, car_id);
        self.get_json(&url).await
    }

    fn list_url(&self, resource: &str, car_id: CarId, since_id: Option<i64>, limit: usize) -> String {
        let mut url = format!(
            "{}/api/v1/cars/{}/{}?limit={}",
            self.base_url, car_id, resource, limit
        );
        if let Some(since) = since_id {
            url = format!("{url}&since_id={since}");
        }
        url
    }

    /// Issue a GET and unwrap the `{ "data": ... }` envelope, mapping every
    /// failure onto the error taxonomy.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "GET");

        let mut request = self.http.get(url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ClientError::Unreachable(e.to_string())
            } else {
                ClientError::Request(e)
            }
        })?;

        let status = response.status();

        if status.is_success() {
            let envelope: Envelope<T> = response
                .json()
                .await
                .map_err(|e| ClientError::Parse(format!("Failed to parse response: {}", e)))?;

            Ok(envelope.data)
        } else if status.as_u16() == 404 {
            Err(ClientError::Unsupported(url.to_string()))
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::AuthFailed(message))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation() {
        assert!(TelemetryClient::new(ServerConfig::new("https://example.com")).is_ok());
        assert!(TelemetryClient::new(ServerConfig::new("http://localhost:4000")).is_ok());

        assert!(TelemetryClient::new(ServerConfig::new("")).is_err());
        assert!(TelemetryClient::new(ServerConfig::new("not-a-url")).is_err());
        assert!(TelemetryClient::new(ServerConfig::new("ftp://example.com")).is_err());
    }

    #[test]
    fn url_normalization_strips_trailing_slash() {
        let client =
            TelemetryClient::new(ServerConfig::new("https://example.com/")).expect("valid url");
        assert_eq!(client.base_url(), "https://example.com");
    }

    #[test]
    fn list_url_includes_cursor_only_when_set() {
        let client =
            TelemetryClient::new(ServerConfig::new("https://example.com")).expect("valid url");
        assert_eq!(
            client.list_url("drives", 1, None, 50),
            "https://example.com/api/v1/cars/1/drives?limit=50"
        );
        assert_eq!(
            client.list_url("charges", 2, Some(120), 50),
            "https://example.com/api/v1/cars/2/charges?limit=50&since_id=120"
        );
    }
}
