//! Location providers: the geocoder seam and its Nominatim implementation.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{Address, GeocodeError, Location};
use crate::config::Config;

/// Free-text place search.
pub trait Geocoder: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<Location>, GeocodeError>;
}

// ─── Nominatim provider ─────────────────────────────────────────

#[derive(Deserialize, Debug, Clone)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
    #[serde(default)]
    pub address: Option<Address>,
}

/// OpenStreetMap Nominatim search (`/search?format=json&addressdetails=1`).
pub struct Nominatim {
    base_url: String,
    language: String,
    limit: usize,
    user_agent: String,
    timeout: Duration,
}

impl Nominatim {
    pub fn new(base_url: impl Into<String>, language: impl Into<String>, limit: usize) -> Self {
        Self {
            base_url: base_url.into(),
            language: language.into(),
            limit,
            user_agent: format!("natal_input/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.http_timeout,
            ..Self::new(config.geocoder_url.clone(), config.language.clone(), config.result_limit)
        }
    }
}

impl Geocoder for Nominatim {
    fn search(&self, query: &str) -> Result<Vec<Location>, GeocodeError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        debug!("nominatim search for '{}'", query);

        let response = ureq::get(&url)
            .set("User-Agent", &self.user_agent)
            .timeout(self.timeout)
            .query("q", query)
            .query("format", "json")
            .query("addressdetails", "1")
            .query("limit", &self.limit.to_string())
            .query("accept-language", &self.language)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => GeocodeError::Status(code),
                other => GeocodeError::Network(other.to_string()),
            })?;

        let results: Vec<NominatimResult> = response
            .into_json()
            .map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;

        Ok(results.into_iter().filter_map(to_location).collect())
    }
}

/// Display name: "<settlement>, <country>", else the provider's full string.
pub fn format_location_name(result: &NominatimResult) -> String {
    let settlement = result.address.as_ref().and_then(|a| a.settlement().map(|s| (a, s)));
    match settlement {
        Some((addr, place)) => format!("{}, {}", place, addr.country.as_deref().unwrap_or("")),
        None => result.display_name.clone(),
    }
}

fn to_location(result: NominatimResult) -> Option<Location> {
    let (latitude, longitude) = match (result.lat.trim().parse::<f64>(), result.lon.trim().parse::<f64>()) {
        (Ok(lat), Ok(lon)) => (lat, lon),
        _ => {
            warn!(
                "skipping '{}': unparseable coordinates ({}, {})",
                result.display_name, result.lat, result.lon
            );
            return None;
        }
    };

    Some(Location {
        name: format_location_name(&result),
        latitude,
        longitude,
        display_name: result.display_name,
        address: result.address.unwrap_or_default(),
        timezone: None,
    })
}

/// Format coordinates as "55.7558°N, 37.6173°E".
pub fn format_coords(lat: f64, lon: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", lat.abs(), ns, lon.abs(), ew)
}
