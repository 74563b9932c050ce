use std::time::Duration;

use async_trait::async_trait;
use derive_more::Display;
use serde::Deserialize;

use super::Coordinates;
use crate::settings::AppConfig;

#[derive(Debug, Display)]
pub enum LocationError {
    #[display("Geocoding request failed: {_0}")]
    Request(String),

    #[display("Geocoding service returned status {_0}")]
    Status(u16),

    #[display("Invalid geocoding response: {_0}")]
    InvalidResponse(String),
}

/// Turns coordinates into a human-readable place name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// `Ok(None)` when the service knows no place at these coordinates.
    async fn resolve(&self, coordinates: Coordinates) -> Result<Option<String>, LocationError>;
}

/// Reverse geocoding against an OpenStreetMap Nominatim compatible service.
#[derive(Clone, Debug)]
pub struct NominatimResolver {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

impl NominatimResolver {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, LocationError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| LocationError::Request(e.to_string()))?;

        Ok(NominatimResolver {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, LocationError> {
        Self::new(
            &config.geocoding_url,
            &config.geocoding_user_agent,
            Duration::from_secs(config.geocoding_timeout_secs),
        )
    }
}

#[async_trait]
impl LocationResolver for NominatimResolver {
    async fn resolve(&self, coordinates: Coordinates) -> Result<Option<String>, LocationError> {
        let response = self.client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Status(response.status().as_u16()));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        Ok(place_name(body))
    }
}

/// Most specific locality available, falling back to the first part of the
/// display name.
fn place_name(response: NominatimResponse) -> Option<String> {
    if let Some(error) = response.error {
        tracing::debug!(error = %error, "Geocoding service found no place");
        return None;
    }

    let address = response.address;
    [address.city, address.town, address.village, address.county, address.state]
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .or_else(|| {
            response
                .display_name
                .as_deref()
                .and_then(|name| name.split(',').next())
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> NominatimResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn prefers_city_over_display_name() {
        let response = parse(serde_json::json!({
            "display_name": "Brighton, Brighton and Hove, England, United Kingdom",
            "address": { "city": "Brighton and Hove", "state": "England" }
        }));

        assert_eq!(place_name(response).as_deref(), Some("Brighton and Hove"));
    }

    #[test]
    fn falls_back_through_smaller_localities() {
        let response = parse(serde_json::json!({
            "display_name": "Somewhere",
            "address": { "village": "Portmeirion", "county": "Gwynedd" }
        }));

        assert_eq!(place_name(response).as_deref(), Some("Portmeirion"));
    }

    #[test]
    fn uses_first_display_name_segment_without_address() {
        let response = parse(serde_json::json!({
            "display_name": "Yosemite National Park, Mariposa County, California"
        }));

        assert_eq!(place_name(response).as_deref(), Some("Yosemite National Park"));
    }

    #[test]
    fn error_payload_means_no_place() {
        let response = parse(serde_json::json!({ "error": "Unable to geocode" }));

        assert!(place_name(response).is_none());
    }
}
