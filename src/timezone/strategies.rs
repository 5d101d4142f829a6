//! Timezone lookup strategies: timezonedb, timezoneapi.io, and the
//! longitude approximation.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::types::{Timezone, TimezoneError, TimezoneSource};

/// One way of turning coordinates into a timezone.
pub trait TimezoneStrategy: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    fn lookup(&self, lat: f64, lon: f64) -> Result<Timezone, TimezoneError>;
}

/// HTTP settings shared by the network strategies.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

fn check_coords(lat: f64, lon: f64) -> Result<(), TimezoneError> {
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    if valid {
        Ok(())
    } else {
        Err(TimezoneError::InvalidCoordinates { lat, lon })
    }
}

fn call_json<T: serde::de::DeserializeOwned>(request: ureq::Request) -> Result<T, TimezoneError> {
    match request.call() {
        Ok(response) => response
            .into_json()
            .map_err(|e| TimezoneError::InvalidResponse(e.to_string())),
        Err(ureq::Error::Status(code, _)) => Err(TimezoneError::Status(code)),
        Err(e) => Err(TimezoneError::Network(e.to_string())),
    }
}

// ─── timezonedb (primary) ────────────────────────────────────────

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TimezoneDbResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    zone_name: Option<String>,
    #[serde(default)]
    gmt_offset: Option<i32>,
}

/// `api.timezonedb.com` position lookup. Needs an API key.
pub struct TimezoneDb {
    base_url: String,
    api_key: Option<String>,
    http: HttpSettings,
}

impl TimezoneDb {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, http: HttpSettings) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            http,
        }
    }
}

fn parse_timezonedb(resp: TimezoneDbResponse) -> Result<Timezone, TimezoneError> {
    if resp.status != "OK" {
        let reason = if resp.message.is_empty() { resp.status } else { resp.message };
        return Err(TimezoneError::Rejected(reason));
    }
    let name = resp
        .zone_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| TimezoneError::InvalidResponse("no zoneName field".into()))?;
    let offset_seconds = resp
        .gmt_offset
        .ok_or_else(|| TimezoneError::InvalidResponse("no gmtOffset field".into()))?;
    Ok(Timezone {
        name,
        offset_seconds,
        source: TimezoneSource::TimezoneDb,
    })
}

impl TimezoneStrategy for TimezoneDb {
    fn name(&self) -> &'static str {
        "timezonedb"
    }

    fn lookup(&self, lat: f64, lon: f64) -> Result<Timezone, TimezoneError> {
        check_coords(lat, lon)?;
        let key = self.api_key.as_deref().ok_or(TimezoneError::MissingKey)?;
        let url = format!("{}/v2.1/get-time-zone", self.base_url.trim_end_matches('/'));
        debug!("timezonedb lookup for ({}, {})", lat, lon);

        let request = ureq::get(&url)
            .set("User-Agent", &self.http.user_agent)
            .timeout(self.http.timeout)
            .query("key", key)
            .query("format", "json")
            .query("by", "position")
            .query("lat", &lat.to_string())
            .query("lng", &lon.to_string());

        parse_timezonedb(call_json(request)?)
    }
}

// ─── timezoneapi.io (secondary) ──────────────────────────────────

#[derive(Deserialize, Debug)]
struct ApiIoResponse {
    #[serde(default)]
    data: Option<ApiIoData>,
}

#[derive(Deserialize, Debug)]
struct ApiIoData {
    #[serde(default)]
    timezone: Option<ApiIoZone>,
    #[serde(default)]
    datetime: Option<ApiIoDatetime>,
}

#[derive(Deserialize, Debug)]
struct ApiIoZone {
    id: String,
}

#[derive(Deserialize, Debug)]
struct ApiIoDatetime {
    /// The service sends this as a number or as a numeric string.
    offset_seconds: serde_json::Value,
}

/// `timezoneapi.io` lookup, used when the primary service fails.
pub struct TimezoneApiIo {
    base_url: String,
    http: HttpSettings,
}

impl TimezoneApiIo {
    pub fn new(base_url: impl Into<String>, http: HttpSettings) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

fn offset_from_value(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_timezoneapi(resp: ApiIoResponse) -> Result<Timezone, TimezoneError> {
    let data = resp
        .data
        .ok_or_else(|| TimezoneError::InvalidResponse("no data field".into()))?;
    let zone = data
        .timezone
        .ok_or_else(|| TimezoneError::InvalidResponse("no data.timezone field".into()))?;
    let offset_seconds = data
        .datetime
        .as_ref()
        .and_then(|dt| offset_from_value(&dt.offset_seconds))
        .ok_or_else(|| TimezoneError::InvalidResponse("no usable offset_seconds".into()))?;
    Ok(Timezone {
        name: zone.id,
        offset_seconds,
        source: TimezoneSource::TimezoneApiIo,
    })
}

impl TimezoneStrategy for TimezoneApiIo {
    fn name(&self) -> &'static str {
        "timezoneapi.io"
    }

    fn lookup(&self, lat: f64, lon: f64) -> Result<Timezone, TimezoneError> {
        check_coords(lat, lon)?;
        let url = format!("{}/api/timezone/", self.base_url.trim_end_matches('/'));
        debug!("timezoneapi.io lookup for ({}, {})", lat, lon);

        let request = ureq::get(&url)
            .set("User-Agent", &self.http.user_agent)
            .timeout(self.http.timeout)
            .query("latitude", &lat.to_string())
            .query("longitude", &lon.to_string());

        parse_timezoneapi(call_json(request)?)
    }
}

// ─── Longitude approximation (last resort) ───────────────────────

/// Offline estimate from longitude. Never fails.
pub struct LongitudeApproximation;

impl TimezoneStrategy for LongitudeApproximation {
    fn name(&self) -> &'static str {
        "approximation"
    }

    fn lookup(&self, lat: f64, lon: f64) -> Result<Timezone, TimezoneError> {
        check_coords(lat, lon)?;
        Ok(Timezone::approximate(lon))
    }
}
