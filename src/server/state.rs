use crate::location::LocationResolver;
use crate::timezone::TimezoneResolver;
use std::sync::Mutex;

pub struct AppState {
    pub resolver: Mutex<LocationResolver>,
    pub timezones: TimezoneResolver,
    /// Used for reports when the request names no user offset; `None`
    /// means the server's local zone.
    pub user_offset: Option<i32>,
}

impl AppState {
    pub fn new(resolver: LocationResolver, timezones: TimezoneResolver) -> Self {
        Self {
            resolver: Mutex::new(resolver),
            timezones,
            user_offset: None,
        }
    }
}
