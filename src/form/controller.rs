//! Async glue around [`FormSession`]: debounced searches and timezone
//! lookups run on the blocking pool and report back over a channel.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::session::{FormError, FormSession, LocationInput};
use crate::location::{LocationResolver, SearchOutcome};
use crate::render::BirthReport;
use crate::timezone::{Timezone, TimezoneResolution, TimezoneResolver};

/// Runs at most one delayed task; scheduling again cancels the previous one.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A finished background lookup, tagged with the generation it belongs to.
#[derive(Debug)]
enum Completion {
    Search { generation: u64, outcome: SearchOutcome },
    Timezone { generation: u64, resolution: TimezoneResolution },
}

/// What applying a completion did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Results { count: usize, notice: Option<String> },
    Timezone(TimezoneResolution),
    Stale,
}

pub struct FormController {
    session: FormSession,
    resolver: Arc<Mutex<LocationResolver>>,
    timezones: Arc<TimezoneResolver>,
    debouncer: Debouncer,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl FormController {
    pub fn new(resolver: LocationResolver, timezones: TimezoneResolver, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: FormSession::new(),
            resolver: Arc::new(Mutex::new(resolver)),
            timezones: Arc::new(timezones),
            debouncer: Debouncer::new(debounce),
            tx,
            rx,
        }
    }

    pub fn session(&self) -> &FormSession {
        &self.session
    }

    pub fn set_date(&mut self, raw: &str) -> Result<(), FormError> {
        self.session.set_date(raw)
    }

    pub fn set_time(&mut self, raw: &str) -> Result<(), FormError> {
        self.session.set_time(raw)
    }

    /// New location text: restart the debounce timer, or clear everything
    /// when the text is empty.
    pub fn input_location(&mut self, raw: &str) {
        match self.session.input_location(raw) {
            LocationInput::Cleared => self.debouncer.cancel(),
            LocationInput::Search { generation, query } => {
                let resolver = Arc::clone(&self.resolver);
                let tx = self.tx.clone();
                self.debouncer.schedule(async move {
                    let outcome = run_search(resolver, query).await;
                    // The receiver lives as long as the controller.
                    let _ = tx.send(Completion::Search { generation, outcome });
                });
            }
        }
    }

    /// Pick a candidate and start its timezone lookup.
    pub fn select(&mut self, index: usize) -> Result<(), FormError> {
        let ticket = self.session.select(index)?;
        let timezones = Arc::clone(&self.timezones);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let resolution = run_timezone(timezones, ticket.latitude, ticket.longitude).await;
            let _ = tx.send(Completion::Timezone {
                generation: ticket.generation,
                resolution,
            });
        });
        Ok(())
    }

    /// Wait for the next background completion and apply it.
    pub async fn next_update(&mut self) -> Option<Update> {
        let completion = self.rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Apply completions until no search or timezone lookup is outstanding.
    pub async fn settle(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        while self.session.is_searching() || self.session.is_resolving_timezone() {
            match self.next_update().await {
                Some(update) => updates.push(update),
                None => break,
            }
        }
        updates
    }

    fn apply(&mut self, completion: Completion) -> Update {
        match completion {
            Completion::Search { generation, outcome } => {
                let count = outcome.candidates.len();
                let notice = outcome.notice.clone();
                if self.session.complete_search(generation, outcome) {
                    Update::Results { count, notice }
                } else {
                    Update::Stale
                }
            }
            Completion::Timezone { generation, resolution } => {
                if self
                    .session
                    .attach_timezone(generation, resolution.timezone.clone())
                {
                    Update::Timezone(resolution)
                } else {
                    Update::Stale
                }
            }
        }
    }

    pub fn generate(&self, user_offset: i32) -> Result<BirthReport, FormError> {
        self.session.generate(user_offset)
    }
}

async fn run_search(resolver: Arc<Mutex<LocationResolver>>, query: String) -> SearchOutcome {
    debug!("debounced search for '{}'", query);
    let joined = tokio::task::spawn_blocking(move || {
        let mut resolver = resolver.lock().unwrap_or_else(PoisonError::into_inner);
        resolver.search(&query)
    })
    .await;
    joined.unwrap_or_else(|e| {
        warn!("search task failed: {}", e);
        SearchOutcome::failed("Location search failed. Please try again.")
    })
}

async fn run_timezone(timezones: Arc<TimezoneResolver>, lat: f64, lon: f64) -> TimezoneResolution {
    let joined = tokio::task::spawn_blocking(move || timezones.resolve(lat, lon)).await;
    joined.unwrap_or_else(|e| {
        warn!("timezone task failed: {}", e);
        TimezoneResolution {
            timezone: Timezone::utc(),
            failures: Vec::new(),
        }
    })
}
