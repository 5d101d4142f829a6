//! Timezone resolution for birth locations.
//!
//! Coordinates go through an ordered chain of lookup strategies; the last
//! resort is a whole-hour estimate derived from longitude.

pub mod resolver;
pub mod strategies;
pub mod types;

pub use resolver::{StrategyFailure, TimezoneResolution, TimezoneResolver};
pub use strategies::{HttpSettings, LongitudeApproximation, TimezoneApiIo, TimezoneDb, TimezoneStrategy};
pub use types::{current_offset, Timezone, TimezoneError, TimezoneSource};
