//! Runtime configuration from environment variables.
//!
//! Every setting has a default; CLI flags override what is read here.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_TIMEZONEDB_URL: &str = "https://api.timezonedb.com";
pub const DEFAULT_TIMEZONEAPI_URL: &str = "https://timezoneapi.io";
pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_RESULT_LIMIT: usize = 5;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub geocoder_url: String,
    /// `accept-language` sent to the geocoder.
    pub language: String,
    pub result_limit: usize,
    pub timezonedb_url: String,
    pub timezonedb_key: Option<String>,
    pub timezoneapi_url: String,
    pub debounce: Duration,
    pub http_timeout: Duration,
    /// Search cache file; `None` means the default under the home directory.
    pub cache_path: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoder_url: DEFAULT_GEOCODER_URL.into(),
            language: DEFAULT_LANGUAGE.into(),
            result_limit: DEFAULT_RESULT_LIMIT,
            timezonedb_url: DEFAULT_TIMEZONEDB_URL.into(),
            timezonedb_key: None,
            timezoneapi_url: DEFAULT_TIMEZONEAPI_URL.into(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            cache_path: None,
            user_agent: format!("natal_input/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            geocoder_url: string_var("NATAL_GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            language: string_var("NATAL_LANGUAGE").unwrap_or(defaults.language),
            result_limit: parsed_var("NATAL_RESULT_LIMIT")?
                .filter(|n| *n > 0)
                .unwrap_or(defaults.result_limit),
            timezonedb_url: string_var("NATAL_TIMEZONEDB_URL").unwrap_or(defaults.timezonedb_url),
            timezonedb_key: string_var("NATAL_TIMEZONEDB_KEY"),
            timezoneapi_url: string_var("NATAL_TIMEZONEAPI_URL").unwrap_or(defaults.timezoneapi_url),
            debounce: parsed_var("NATAL_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            http_timeout: parsed_var("NATAL_HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            cache_path: string_var("NATAL_CACHE_PATH").map(PathBuf::from),
            user_agent: string_var("NATAL_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }
}

/// A set, non-blank variable.
fn string_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match string_var(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var: name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests touching the process environment run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "NATAL_GEOCODER_URL",
        "NATAL_LANGUAGE",
        "NATAL_RESULT_LIMIT",
        "NATAL_TIMEZONEDB_URL",
        "NATAL_TIMEZONEDB_KEY",
        "NATAL_TIMEZONEAPI_URL",
        "NATAL_DEBOUNCE_MS",
        "NATAL_HTTP_TIMEOUT_SECS",
        "NATAL_CACHE_PATH",
        "NATAL_USER_AGENT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.geocoder_url, DEFAULT_GEOCODER_URL);
        assert_eq!(config.language, "ru");
        assert_eq!(config.result_limit, 5);
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert!(config.timezonedb_key.is_none());
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("NATAL_LANGUAGE", "en");
        env::set_var("NATAL_TIMEZONEDB_KEY", " secret ");
        env::set_var("NATAL_DEBOUNCE_MS", "250");
        env::set_var("NATAL_CACHE_PATH", "/tmp/natal-cache.json");

        let config = Config::from_env().unwrap();
        assert_eq!(config.language, "en");
        assert_eq!(config.timezonedb_key.as_deref(), Some("secret"));
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/natal-cache.json")));

        clear_env();
    }

    #[test]
    fn test_invalid_number() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("NATAL_HTTP_TIMEOUT_SECS", "soon");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("NATAL_HTTP_TIMEOUT_SECS"));

        clear_env();
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("NATAL_GEOCODER_URL", "   ");
        env::set_var("NATAL_RESULT_LIMIT", "0");

        let config = Config::from_env().unwrap();
        assert_eq!(config.geocoder_url, DEFAULT_GEOCODER_URL);
        assert_eq!(config.result_limit, DEFAULT_RESULT_LIMIT);

        clear_env();
    }
}
