//! Form session: the explicit state behind the birth-data form.
//!
//! Every user action is a method that updates the session and returns
//! what the caller should do next. The session does no I/O; searches and
//! timezone lookups run elsewhere and report back through
//! [`FormSession::complete_search`] and [`FormSession::attach_timezone`].

use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::correction::CorrectionError;
use crate::location::{Location, SearchOutcome};
use crate::render::BirthReport;
use crate::timezone::Timezone;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Which required fields are missing or invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub date_missing: bool,
    pub time_missing: bool,
    pub location_missing: bool,
    pub date_in_future: bool,
}

impl Validation {
    /// Generation is enabled only when nothing is missing.
    pub fn can_submit(&self) -> bool {
        !(self.date_missing || self.time_missing || self.location_missing || self.date_in_future)
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut problems = Vec::new();
        if self.date_missing {
            problems.push("birth date is required");
        }
        if self.date_in_future {
            problems.push("birth date cannot be in the future");
        }
        if self.time_missing {
            problems.push("birth time is required");
        }
        if self.location_missing {
            problems.push("birth place must be selected");
        }
        if problems.is_empty() {
            write!(f, "ok")
        } else {
            write!(f, "{}", problems.join("; "))
        }
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("no candidate #{0} in the current results")]
    NoSuchCandidate(usize),
    #[error("form incomplete: {0}")]
    Incomplete(Validation),
    #[error(transparent)]
    Correction(#[from] CorrectionError),
}

/// What to do after the location text changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationInput {
    /// The field was emptied; selection and results were cleared.
    Cleared,
    /// Run this search; its completion must carry `generation`.
    Search { generation: u64, query: String },
}

/// Handle for a selection awaiting its timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSelection {
    pub generation: u64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Selection {
    None,
    Pending { generation: u64, location: Location },
    Resolved(Location),
}

#[derive(Debug)]
pub struct FormSession {
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    location_text: String,
    search_generation: u64,
    pending_search: Option<u64>,
    candidates: Vec<Location>,
    notice: Option<String>,
    selection_generation: u64,
    selection: Selection,
}

impl Default for FormSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FormSession {
    pub fn new() -> Self {
        Self {
            date: None,
            time: None,
            location_text: String::new(),
            search_generation: 0,
            pending_search: None,
            candidates: Vec::new(),
            notice: None,
            selection_generation: 0,
            selection: Selection::None,
        }
    }

    // ─── Date and time ───────────────────────────────────────────

    /// Set the birth date from `YYYY-MM-DD`. Empty input clears it; an
    /// unparseable value also leaves the field empty.
    pub fn set_date(&mut self, raw: &str) -> Result<(), FormError> {
        let raw = raw.trim();
        self.date = None;
        if raw.is_empty() {
            return Ok(());
        }
        let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| FormError::InvalidDate(raw.to_string()))?;
        self.date = Some(date);
        Ok(())
    }

    /// Set the birth time from `HH:MM` (seconds are accepted and dropped).
    pub fn set_time(&mut self, raw: &str) -> Result<(), FormError> {
        let raw = raw.trim();
        self.time = None;
        if raw.is_empty() {
            return Ok(());
        }
        let time = NaiveTime::parse_from_str(raw, TIME_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| FormError::InvalidTime(raw.to_string()))?;
        self.time = Some(time.with_second(0).unwrap_or(time));
        Ok(())
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    // ─── Location search ─────────────────────────────────────────

    /// The location text changed. Each non-empty value starts a new search
    /// generation, superseding any search still in flight.
    pub fn input_location(&mut self, raw: &str) -> LocationInput {
        self.location_text = raw.to_string();
        let query = raw.trim();

        if query.is_empty() {
            self.pending_search = None;
            self.candidates.clear();
            self.notice = None;
            self.selection = Selection::None;
            return LocationInput::Cleared;
        }

        self.search_generation += 1;
        self.pending_search = Some(self.search_generation);
        LocationInput::Search {
            generation: self.search_generation,
            query: query.to_string(),
        }
    }

    /// Apply search results. Returns false when `generation` is not the
    /// latest search; such results are dropped.
    pub fn complete_search(&mut self, generation: u64, outcome: SearchOutcome) -> bool {
        if self.pending_search != Some(generation) {
            debug!(
                "discarding stale search results (generation {}, latest {})",
                generation, self.search_generation
            );
            return false;
        }
        self.pending_search = None;
        self.candidates = outcome.candidates;
        self.notice = outcome.notice;
        true
    }

    pub fn candidates(&self) -> &[Location] {
        &self.candidates
    }

    /// Notice from the last applied search, if it failed.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_searching(&self) -> bool {
        self.pending_search.is_some()
    }

    pub fn location_text(&self) -> &str {
        &self.location_text
    }

    // ─── Selection ───────────────────────────────────────────────

    /// Pick candidate `index` (0-based). The location counts as selected
    /// only after [`FormSession::attach_timezone`] completes it.
    pub fn select(&mut self, index: usize) -> Result<PendingSelection, FormError> {
        let location = self
            .candidates
            .get(index)
            .cloned()
            .ok_or(FormError::NoSuchCandidate(index + 1))?;
        Ok(self.begin_selection(location))
    }

    /// Select a location supplied directly (e.g. from coordinates). One
    /// that already carries a timezone is selected immediately.
    pub fn select_location(&mut self, location: Location) -> Option<PendingSelection> {
        if location.is_resolved() {
            self.selection_generation += 1;
            self.location_text = location.name.clone();
            self.selection = Selection::Resolved(location);
            None
        } else {
            Some(self.begin_selection(location))
        }
    }

    fn begin_selection(&mut self, location: Location) -> PendingSelection {
        self.selection_generation += 1;
        self.location_text = location.name.clone();
        let ticket = PendingSelection {
            generation: self.selection_generation,
            latitude: location.latitude,
            longitude: location.longitude,
        };
        self.selection = Selection::Pending {
            generation: self.selection_generation,
            location,
        };
        ticket
    }

    /// Complete a pending selection. Returns false if the selection was
    /// replaced or cleared while the lookup ran.
    pub fn attach_timezone(&mut self, generation: u64, timezone: Timezone) -> bool {
        match std::mem::replace(&mut self.selection, Selection::None) {
            Selection::Pending { generation: g, location } if g == generation => {
                self.selection = Selection::Resolved(location.with_timezone(timezone));
                true
            }
            other => {
                debug!("discarding timezone for superseded selection {}", generation);
                self.selection = other;
                false
            }
        }
    }

    /// The fully resolved selected location.
    pub fn selected(&self) -> Option<&Location> {
        match &self.selection {
            Selection::Resolved(location) => Some(location),
            _ => None,
        }
    }

    pub fn is_resolving_timezone(&self) -> bool {
        matches!(self.selection, Selection::Pending { .. })
    }

    // ─── Validation and generation ───────────────────────────────

    pub fn validate(&self) -> Validation {
        self.validate_on(Local::now().date_naive())
    }

    /// Validate against a given "today".
    pub fn validate_on(&self, today: NaiveDate) -> Validation {
        Validation {
            date_missing: self.date.is_none(),
            time_missing: self.time.is_none(),
            location_missing: self.selected().is_none(),
            date_in_future: self.date.is_some_and(|d| d > today),
        }
    }

    pub fn generate(&self, user_offset: i32) -> Result<BirthReport, FormError> {
        self.generate_on(Local::now().date_naive(), user_offset)
    }

    pub fn generate_on(&self, today: NaiveDate, user_offset: i32) -> Result<BirthReport, FormError> {
        let validation = self.validate_on(today);
        match (self.date, self.time, self.selected()) {
            (Some(date), Some(time), Some(location)) if validation.can_submit() => {
                Ok(BirthReport::new(date, time, location.clone(), user_offset)?)
            }
            _ => Err(FormError::Incomplete(validation)),
        }
    }
}
