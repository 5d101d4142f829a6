//! Birth data intake: place search, timezone resolution, and the
//! UTC-corrected birth time.

pub mod config;
pub mod correction;
pub mod form;
pub mod location;
pub mod render;
pub mod server;
pub mod timezone;
