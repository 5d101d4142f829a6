//! Timezone value types and lookup errors.

use chrono::{Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::correction::format_offset;

/// Seconds per hour of longitude-derived offset.
const SECONDS_PER_HOUR: i32 = 3600;

/// Where a timezone value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimezoneSource {
    TimezoneDb,
    TimezoneApiIo,
    Approximation,
    Manual,
    Default,
}

impl fmt::Display for TimezoneSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimezoneDb => write!(f, "timezonedb"),
            Self::TimezoneApiIo => write!(f, "timezoneapi.io"),
            Self::Approximation => write!(f, "longitude approximation"),
            Self::Manual => write!(f, "manual"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A zone name with its UTC offset in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timezone {
    pub name: String,
    pub offset_seconds: i32,
    pub source: TimezoneSource,
}

impl Timezone {
    /// UTC with zero offset, used when nothing better is available.
    pub fn utc() -> Self {
        Self {
            name: "UTC".into(),
            offset_seconds: 0,
            source: TimezoneSource::Default,
        }
    }

    /// Whole-hour offset derived from longitude: 15 degrees per hour.
    /// Halves round toward positive infinity (-7.5° is UTC+0).
    pub fn approximate(longitude: f64) -> Self {
        // Clamped to the ±180° range; NaN casts to 0.
        let hours = (longitude / 15.0 + 0.5).floor().clamp(-12.0, 12.0) as i32;
        let sign = if hours >= 0 { "+" } else { "" };
        Self {
            name: format!("UTC{}{}", sign, hours),
            offset_seconds: hours * SECONDS_PER_HOUR,
            source: TimezoneSource::Approximation,
        }
    }

    /// Build from an IANA zone name, using the zone's offset right now.
    pub fn manual(iana: &str) -> Result<Self, TimezoneError> {
        let tz: Tz = iana
            .parse()
            .map_err(|_| TimezoneError::UnknownZone(iana.to_string()))?;
        Ok(Self {
            name: tz.name().to_string(),
            offset_seconds: current_offset(&tz),
            source: TimezoneSource::Manual,
        })
    }

    /// Longitude approximations and the UTC default are not real lookups.
    pub fn is_approximate(&self) -> bool {
        matches!(self.source, TimezoneSource::Approximation | TimezoneSource::Default)
    }

    /// Signed `±HH:MM` form of the offset.
    pub fn utc_offset(&self) -> String {
        format_offset(self.offset_seconds)
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (UTC{})", self.name, self.utc_offset())?;
        if self.is_approximate() {
            write!(f, " approximate")?;
        }
        Ok(())
    }
}

/// Offset of an IANA zone at the current instant, in seconds east of UTC.
pub fn current_offset(tz: &Tz) -> i32 {
    tz.offset_from_utc_datetime(&Utc::now().naive_utc())
        .fix()
        .local_minus_utc()
}

/// Timezone lookup errors, one per failure mode of a strategy.
#[derive(Debug, Error)]
pub enum TimezoneError {
    #[error("no API key configured")]
    MissingKey,
    #[error("invalid coordinates ({lat}, {lon})")]
    InvalidCoordinates { lat: f64, lon: f64 },
    #[error("network error: {0}")]
    Network(String),
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("service rejected the request: {0}")]
    Rejected(String),
    #[error("invalid service response: {0}")]
    InvalidResponse(String),
    #[error("unknown timezone '{0}'")]
    UnknownZone(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_east() {
        let tz = Timezone::approximate(47.0);
        assert_eq!(tz.offset_seconds, 3 * 3600);
        assert_eq!(tz.utc_offset(), "+03:00");
        assert_eq!(tz.name, "UTC+3");
        assert!(tz.is_approximate());
    }

    #[test]
    fn test_approximate_west_and_zero() {
        let tz = Timezone::approximate(-74.0);
        assert_eq!(tz.offset_seconds, -5 * 3600);
        assert_eq!(tz.name, "UTC-5");

        let tz = Timezone::approximate(7.0);
        assert_eq!(tz.offset_seconds, 0);
        assert_eq!(tz.name, "UTC+0");

        assert_eq!(Timezone::approximate(-7.5).offset_seconds, 0);
        assert_eq!(Timezone::approximate(7.5).offset_seconds, 3600);
    }

    #[test]
    fn test_approximate_clamps_huge_longitude() {
        assert_eq!(Timezone::approximate(1e9).offset_seconds, 12 * 3600);
        assert_eq!(Timezone::approximate(f64::NEG_INFINITY).offset_seconds, -12 * 3600);
        assert_eq!(Timezone::approximate(f64::NAN).offset_seconds, 0);
    }

    #[test]
    fn test_utc_default() {
        let tz = Timezone::utc();
        assert_eq!(tz.name, "UTC");
        assert_eq!(tz.offset_seconds, 0);
        assert!(tz.is_approximate());
    }

    #[test]
    fn test_manual_fixed_zone() {
        // Asia/Kolkata has no DST, so the current offset is stable.
        let tz = Timezone::manual("Asia/Kolkata").unwrap();
        assert_eq!(tz.offset_seconds, 19800);
        assert_eq!(tz.source, TimezoneSource::Manual);
        assert!(!tz.is_approximate());
    }

    #[test]
    fn test_manual_unknown_zone() {
        let err = Timezone::manual("Mars/Olympus").unwrap_err();
        assert!(matches!(err, TimezoneError::UnknownZone(_)));
    }

    #[test]
    fn test_display_labels_approximation() {
        assert_eq!(Timezone::approximate(47.0).to_string(), "UTC+3 (UTC+03:00) approximate");
        let tz = Timezone {
            name: "Europe/Moscow".into(),
            offset_seconds: 10800,
            source: TimezoneSource::TimezoneDb,
        };
        assert_eq!(tz.to_string(), "Europe/Moscow (UTC+03:00)");
    }
}
