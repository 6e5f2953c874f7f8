//! Forward and reverse geocoding.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use salah_core::{GeocodingConfig, NetworkError, ReqwestErrorExt};
use serde::Deserialize;

use crate::types::Coordinates;

/// Geocoding failures; callers degrade instead of surfacing these
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("No place matched: {0}")]
    NoMatch(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Geocoding timed out")]
    Timeout,
}

impl From<reqwest::Error> for GeocodeError {
    fn from(e: reqwest::Error) -> Self {
        GeocodeError::Network(e.into_network_error())
    }
}

/// Place-name lookups in both directions
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Human-readable place name for a coordinate pair
    async fn reverse(&self, coordinates: Coordinates) -> Result<String, GeocodeError>;

    /// Coordinates of the best match for a free-text place name
    async fn forward(&self, query: &str) -> Result<Coordinates, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<NominatimAddress>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    #[serde(rename = "state_district")]
    state_district: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// Prefer city > town > village > municipality, then wider areas
    fn locality(self) -> Option<String> {
        self.city
            .or(self.town)
            .or(self.village)
            .or(self.municipality)
            .or(self.state_district)
            .or(self.county)
            .or(self.state)
            .or(self.country)
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Nominatim HTTP client
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GeocodeError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Geocoder {} returned status {}", path, status);
            return Err(GeocodeError::Network(NetworkError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            }));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GeocodeError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coordinates: Coordinates) -> Result<String, GeocodeError> {
        let body: ReverseResponse = self
            .get_json(
                "reverse",
                &[
                    ("lat", coordinates.latitude.to_string()),
                    ("lon", coordinates.longitude.to_string()),
                    ("format", "json".to_string()),
                    ("addressdetails", "1".to_string()),
                    ("layer", "address".to_string()),
                    ("zoom", "10".to_string()),
                ],
            )
            .await?;

        if let Some(err) = body.error {
            return Err(GeocodeError::NoMatch(err));
        }

        let name = body
            .address
            .and_then(NominatimAddress::locality)
            .ok_or_else(|| GeocodeError::NoMatch(coordinates.to_string()))?;

        tracing::info!("Reverse geocoded {} to: {}", coordinates, name);
        Ok(name)
    }

    async fn forward(&self, query: &str) -> Result<Coordinates, GeocodeError> {
        let hits: Vec<SearchHit> = self
            .get_json(
                "search",
                &[
                    ("q", query.to_string()),
                    ("format", "json".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch(query.to_string()))?;

        let latitude: f64 = hit
            .lat
            .parse()
            .map_err(|e| GeocodeError::Parse(format!("latitude {:?}: {}", hit.lat, e)))?;
        let longitude: f64 = hit
            .lon
            .parse()
            .map_err(|e| GeocodeError::Parse(format!("longitude {:?}: {}", hit.lon, e)))?;

        let coordinates = Coordinates::new(latitude, longitude);
        tracing::info!(
            "Geocoded {:?} to {} ({})",
            query,
            coordinates,
            hit.display_name.as_deref().unwrap_or("no display name")
        );
        Ok(coordinates)
    }
}
