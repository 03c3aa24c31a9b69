use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// A single geocoding match
#[derive(Debug, Clone, PartialEq)]
pub struct GeoMatch {
    pub latitude: f64,
    pub longitude: f64,
    /// Formatted address, most specific part first
    pub address: String,
}

/// Failure of a single lookup attempt
#[derive(Debug, Error)]
pub enum LookupError {
    /// Worth retrying: network trouble, timeouts, throttling, server errors
    #[error("geocoding service unavailable: {0}")]
    Transient(String),
    /// The service answered but the request or its payload was unusable
    #[error("geocoding request rejected: {0}")]
    Rejected(String),
}

impl LookupError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LookupError::Transient(_))
    }
}

/// Forward geocoding: place name to coordinates and address
pub trait Geocoder {
    /// Look up `query`, asking for the address in `language`.
    /// `Ok(None)` means the service had no match.
    fn geocode(&self, query: &str, language: &str) -> Result<Option<GeoMatch>, LookupError>;
}

/// Nominatim search API response item
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// Geocoder backed by the OpenStreetMap Nominatim search API
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        // Use blocking reqwest since the whole run is one serial pass
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build geocoding HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, query: &str, language: &str) -> Result<Option<GeoMatch>, LookupError> {
        let url = format!("{}/search", self.endpoint);

        log::debug!("Geocoding '{}' via Nominatim", query);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("accept-language", language),
            ])
            .send()
            .map_err(|e| LookupError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::Transient(format!("Nominatim returned status: {}", status)));
        }
        if !status.is_success() {
            return Err(LookupError::Rejected(format!("Nominatim returned status: {}", status)));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .map_err(|e| LookupError::Rejected(format!("Failed to parse geocoding response: {}", e)))?;

        places.into_iter().next().map(parse_place).transpose()
    }
}

fn parse_place(place: NominatimPlace) -> Result<GeoMatch, LookupError> {
    let parse = |field: &str, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| LookupError::Rejected(format!("invalid {} '{}' in response", field, value)))
    };

    Ok(GeoMatch {
        latitude: parse("lat", &place.lat)?,
        longitude: parse("lon", &place.lon)?,
        address: place.display_name,
    })
}
