//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::timezone::Timezone;

/// Raw address components as returned by the geocoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub town: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl Address {
    /// Most specific settlement name: city, then town, village, county.
    pub fn settlement(&self) -> Option<&str> {
        [&self.city, &self.town, &self.village, &self.county]
            .into_iter()
            .find_map(|part| part.as_deref().filter(|s| !s.is_empty()))
    }
}

/// A place candidate, optionally carrying its resolved timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Synthesized display name (e.g. "Moscow, Russia").
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Full display string from the provider.
    pub display_name: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Timezone>,
}

impl Location {
    /// Build a location from bare coordinates (no provider data).
    pub fn from_coords(name: Option<&str>, latitude: f64, longitude: f64) -> Self {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:.4}, {:.4}", latitude, longitude));
        Self {
            display_name: name.clone(),
            name,
            latitude,
            longitude,
            address: Address::default(),
            timezone: None,
        }
    }

    /// Attach a timezone, consuming the candidate.
    pub fn with_timezone(self, timezone: Timezone) -> Self {
        Self {
            timezone: Some(timezone),
            ..self
        }
    }

    /// A location is fully resolved once its timezone is known.
    pub fn is_resolved(&self) -> bool {
        self.timezone.is_some()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.4}, {:.4})", self.name, self.latitude, self.longitude)
    }
}

/// Result of a location search. Lookup failures never surface as errors:
/// they produce an empty candidate list and a user-visible notice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub candidates: Vec<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub from_cache: bool,
}

impl SearchOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(notice: impl Into<String>) -> Self {
        Self {
            candidates: Vec::new(),
            notice: Some(notice.into()),
            from_cache: false,
        }
    }
}

/// Geocoding errors.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("network error: {0}")]
    Network(String),
    #[error("geocoder returned HTTP {0}")]
    Status(u16),
    #[error("invalid geocoder response: {0}")]
    InvalidResponse(String),
}
