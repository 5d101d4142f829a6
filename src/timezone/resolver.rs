//! Timezone resolver: tries each strategy in order and records why the
//! earlier ones failed.
//!
//! Default chain: timezonedb → timezoneapi.io → longitude approximation.

use serde::Serialize;
use tracing::{info, warn};

use super::strategies::{HttpSettings, LongitudeApproximation, TimezoneApiIo, TimezoneDb, TimezoneStrategy};
use super::types::Timezone;
use crate::config::Config;

/// A strategy that was tried and did not produce a timezone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub error: String,
}

/// The chosen timezone plus the failures that preceded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimezoneResolution {
    pub timezone: Timezone,
    pub failures: Vec<StrategyFailure>,
}

/// Ordered list of timezone strategies.
pub struct TimezoneResolver {
    strategies: Vec<Box<dyn TimezoneStrategy>>,
}

impl TimezoneResolver {
    pub fn new(strategies: Vec<Box<dyn TimezoneStrategy>>) -> Self {
        Self { strategies }
    }

    /// The full network chain described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let http = HttpSettings {
            user_agent: config.user_agent.clone(),
            timeout: config.http_timeout,
        };
        Self::new(vec![
            Box::new(TimezoneDb::new(
                config.timezonedb_url.clone(),
                config.timezonedb_key.clone(),
                http.clone(),
            )),
            Box::new(TimezoneApiIo::new(config.timezoneapi_url.clone(), http)),
            Box::new(LongitudeApproximation),
        ])
    }

    /// Approximation only; no network access.
    pub fn offline() -> Self {
        Self::new(vec![Box::new(LongitudeApproximation)])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve a timezone for the coordinates. Never fails: when every
    /// strategy errors, the result is UTC with a zero offset.
    pub fn resolve(&self, lat: f64, lon: f64) -> TimezoneResolution {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match strategy.lookup(lat, lon) {
                Ok(timezone) => {
                    info!(
                        "timezone for ({:.4}, {:.4}) resolved by {}: {}",
                        lat,
                        lon,
                        strategy.name(),
                        timezone
                    );
                    return TimezoneResolution { timezone, failures };
                }
                Err(e) => {
                    warn!("timezone strategy {} failed: {}", strategy.name(), e);
                    failures.push(StrategyFailure {
                        strategy: strategy.name(),
                        error: e.to_string(),
                    });
                }
            }
        }

        warn!("all timezone strategies failed for ({}, {}); using UTC", lat, lon);
        TimezoneResolution {
            timezone: Timezone::utc(),
            failures,
        }
    }
}
