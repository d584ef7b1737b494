//! Reverse-geocoding HTTP client.

use crate::error::{GeocodeError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A resolved place-name breakdown for one coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Place {
    /// ISO 3166-1 alpha-2, upper case (e.g. "IT").
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    /// State or region; falls back to the county when the state is absent.
    pub region_name: Option<String>,
    /// City, town, village, or municipality - whichever the service knows.
    pub city: Option<String>,
}

impl Place {
    /// Whether the service resolved anything usable at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.country_code.is_none()
            && self.country_name.is_none()
            && self.region_name.is_none()
            && self.city.is_none()
    }
}

/// Wire shape of the service's reverse endpoint.
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

/// Client for a Nominatim-compatible reverse-geocoding service.
///
/// The client itself does not rate-limit; the drain worker owns the delay
/// floor between calls.
pub struct GeocodeClient {
    http: Client,
    base_url: String,
}

impl GeocodeClient {
    /// Create a client for the given service base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let url = base_url.into().trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(GeocodeError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        // The service requires an identifying User-Agent
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Carlog/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GeocodeError::Request)?;

        Ok(Self {
            http,
            base_url: url,
        })
    }

    /// Resolve a coordinate to a place-name breakdown.
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Place> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1",
            self.base_url, latitude, longitude
        );
        debug!(lat = latitude, lon = longitude, "reverse geocode");

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeocodeError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Parse(format!("Failed to parse reverse response: {}", e)))?;

        Ok(body.address.map(Place::from).unwrap_or_default())
    }
}

impl From<Address> for Place {
    fn from(address: Address) -> Self {
        Self {
            country_code: address.country_code.map(|c| c.to_uppercase()),
            country_name: address.country,
            region_name: address.state.or(address.county),
            city: address
                .city
                .or(address.town)
                .or(address.village)
                .or(address.municipality),
        }
    }
}
