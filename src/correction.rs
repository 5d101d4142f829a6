//! Local-time correction: wall-clock birth time → UTC instant.
//!
//! The birth time is entered as a bare wall-clock value. It is first read
//! as if it were in the observing user's zone, then shifted by the
//! difference between the birth location's offset and the user's offset.
//! The net effect is `utc = wall_clock - location_offset`.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

use crate::timezone::{current_offset, TimezoneError};

/// Largest UTC offset accepted from callers, in seconds (±18 hours).
pub const MAX_OFFSET_SECONDS: i32 = 18 * 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrectionError {
    #[error("date/time out of range after applying offset of {0} seconds")]
    OutOfRange(i32),
}

/// The outcome of correcting one birth date/time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub utc: DateTime<Utc>,
    /// Birth time as read at the location's offset.
    pub local_time: NaiveTime,
    pub user_offset: i32,
    pub location_offset: i32,
    /// `location_offset - user_offset`, in seconds.
    pub timezone_diff: i32,
}

impl Correction {
    pub fn utc_iso(&self) -> String {
        format_utc(&self.utc)
    }

    pub fn local_time_hhmm(&self) -> String {
        self.local_time.format("%H:%M").to_string()
    }
}

fn shift(at: NaiveDateTime, seconds: i32) -> Result<NaiveDateTime, CorrectionError> {
    at.checked_add_signed(Duration::seconds(i64::from(seconds)))
        .ok_or(CorrectionError::OutOfRange(seconds))
}

fn negate(seconds: i32) -> Result<i32, CorrectionError> {
    seconds
        .checked_neg()
        .ok_or(CorrectionError::OutOfRange(seconds))
}

/// Correct a wall-clock birth date/time given the birth location's offset
/// and the user's own offset (both seconds east of UTC).
pub fn correct(
    date: NaiveDate,
    time: NaiveTime,
    location_offset: i32,
    user_offset: i32,
) -> Result<Correction, CorrectionError> {
    let wall_clock = date.and_time(time);
    // The wall clock read in the user's zone, as a UTC instant.
    let as_user_local = shift(wall_clock, negate(user_offset)?)?;
    let timezone_diff = location_offset
        .checked_sub(user_offset)
        .ok_or(CorrectionError::OutOfRange(user_offset))?;
    let utc = shift(as_user_local, negate(timezone_diff)?)?.and_utc();
    let local_time = shift(as_user_local, location_offset)?.time();

    Ok(Correction {
        utc,
        local_time,
        user_offset,
        location_offset,
        timezone_diff,
    })
}

/// Signed, zero-padded `±HH:MM`. The sign is always present.
pub fn format_offset(seconds: i32) -> String {
    let abs = seconds.unsigned_abs();
    let hours = abs / 3600;
    let minutes = (abs % 3600) / 60;
    let sign = if seconds >= 0 { '+' } else { '-' };
    format!("{}{:02}:{:02}", sign, hours, minutes)
}

/// ISO-8601 with milliseconds and a `Z` suffix.
pub fn format_utc(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The observing user's offset right now: from an IANA zone if given,
/// otherwise from the system's local zone.
pub fn user_offset(zone: Option<&str>) -> Result<i32, TimezoneError> {
    match zone {
        Some(name) => {
            let tz: Tz = name
                .parse()
                .map_err(|_| TimezoneError::UnknownZone(name.to_string()))?;
            Ok(current_offset(&tz))
        }
        None => Ok(Local::now().offset().local_minus_utc()),
    }
}
