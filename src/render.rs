//! Birth report: the corrected result and its text and JSON renderings.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::correction::{correct, format_offset, Correction, CorrectionError};
use crate::location::Location;
use crate::timezone::Timezone;

/// A completed submission.
#[derive(Debug, Clone, PartialEq)]
pub struct BirthReport {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: Location,
    pub timezone: Timezone,
    pub correction: Correction,
}

impl BirthReport {
    /// Build a report. A location without a timezone is treated as UTC.
    pub fn new(
        date: NaiveDate,
        time: NaiveTime,
        location: Location,
        user_offset: i32,
    ) -> Result<Self, CorrectionError> {
        let timezone = location.timezone.clone().unwrap_or_else(Timezone::utc);
        let correction = correct(date, time, timezone.offset_seconds, user_offset)?;
        Ok(Self {
            date,
            time,
            location,
            timezone,
            correction,
        })
    }

    /// Plain-text block for copying.
    pub fn to_text(&self) -> String {
        let approx = if self.timezone.is_approximate() { " approximate" } else { "" };
        format!(
            "Date: {}\n\
             Local time: {}\n\
             Entered time: {}\n\
             Place: {}\n\
             Latitude: {:.4}\n\
             Longitude: {:.4}\n\
             Timezone: {} (UTC{}){}\n\
             UTC time: {}",
            self.date.format("%d.%m.%Y"),
            self.correction.local_time_hhmm(),
            self.time.format("%H:%M"),
            self.location.name,
            self.location.latitude,
            self.location.longitude,
            self.timezone.name,
            self.timezone.utc_offset(),
            approx,
            self.correction.utc_iso(),
        )
    }

    pub fn to_json(&self) -> ReportJson {
        ReportJson {
            birth_date: self.date.format("%Y-%m-%d").to_string(),
            birth_time: self.time.format("%H:%M").to_string(),
            local_time: self.correction.local_time_hhmm(),
            location: LocationJson {
                name: self.location.name.clone(),
                latitude: self.location.latitude,
                longitude: self.location.longitude,
                timezone: self.timezone.name.clone(),
                utc_offset: self.timezone.utc_offset(),
                approximate: self.timezone.is_approximate(),
            },
            utc_date_time: self.correction.utc_iso(),
            timezone_correction: CorrectionJson {
                user_offset: format_offset(self.correction.user_offset),
                birth_location_offset: format_offset(self.correction.location_offset),
                difference: format_offset(self.correction.timezone_diff),
            },
        }
    }

    pub fn to_json_pretty(&self) -> String {
        // A struct of strings and finite floats always serializes.
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJson {
    pub birth_date: String,
    pub birth_time: String,
    pub local_time: String,
    pub location: LocationJson,
    pub utc_date_time: String,
    pub timezone_correction: CorrectionJson,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationJson {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub utc_offset: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub approximate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionJson {
    pub user_offset: String,
    pub birth_location_offset: String,
    pub difference: String,
}
