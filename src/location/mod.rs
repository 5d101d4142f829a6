//! Place search for the birth location.
//!
//! Provides Nominatim geocoding, display-name synthesis, and a
//! query-keyed search cache.

pub mod cache;
pub mod providers;
pub mod resolver;
pub mod types;

pub use cache::SearchCache;
pub use providers::{format_coords, Geocoder, Nominatim};
pub use resolver::{LocationResolver, MIN_QUERY_CHARS};
pub use types::{Address, GeocodeError, Location, SearchOutcome};
