//! Location resolver: short-query guard, search cache, then the geocoder.
//!
//! Search flow: query < 3 chars → empty | cache hit → cached | geocoder → cache

use tracing::{info, warn};

use super::cache::SearchCache;
use super::providers::{Geocoder, Nominatim};
use super::types::SearchOutcome;
use crate::config::Config;

/// Queries shorter than this (in characters) are not searched.
pub const MIN_QUERY_CHARS: usize = 3;

/// Notice shown when the geocoder cannot be reached.
pub const SEARCH_FAILED_NOTICE: &str = "Location search failed. Please try again.";

/// Notice shown when a search is attempted in offline mode.
pub const OFFLINE_NOTICE: &str = "Offline mode: only cached searches are available.";

pub struct LocationResolver {
    geocoder: Box<dyn Geocoder>,
    cache: SearchCache,
    offline: bool,
}

impl LocationResolver {
    pub fn new(geocoder: Box<dyn Geocoder>, cache: SearchCache) -> Self {
        Self {
            geocoder,
            cache,
            offline: false,
        }
    }

    /// Nominatim with the cache file named by `config` (or the default).
    pub fn from_config(config: &Config) -> Self {
        let cache = match &config.cache_path {
            Some(path) => SearchCache::load_from(path.clone()),
            None => SearchCache::load(),
        };
        Self::new(Box::new(Nominatim::from_config(config)), cache)
    }

    /// Set offline mode: answer from the cache only.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Search for places matching `query`. Never fails: a geocoder error
    /// yields no candidates and a notice for the user.
    pub fn search(&mut self, query: &str) -> SearchOutcome {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return SearchOutcome::empty();
        }

        if let Some(candidates) = self.cache.get(query) {
            return SearchOutcome {
                candidates,
                notice: None,
                from_cache: true,
            };
        }

        if self.offline {
            return SearchOutcome::failed(OFFLINE_NOTICE);
        }

        match self.geocoder.search(query) {
            Ok(candidates) => {
                info!("search '{}' returned {} candidate(s)", query, candidates.len());
                self.cache.put(query, &candidates);
                SearchOutcome {
                    candidates,
                    notice: None,
                    from_cache: false,
                }
            }
            Err(e) => {
                warn!("search '{}' failed: {}", query, e);
                SearchOutcome::failed(SEARCH_FAILED_NOTICE)
            }
        }
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::location::types::{GeocodeError, Location};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Geocoder returning canned results and counting calls.
    pub(crate) struct FakeGeocoder {
        pub calls: Arc<AtomicUsize>,
        pub fail: bool,
    }

    impl FakeGeocoder {
        pub(crate) fn new() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (Self { calls: calls.clone(), fail: false }, calls)
        }
    }

    impl Geocoder for FakeGeocoder {
        fn search(&self, query: &str) -> Result<Vec<Location>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GeocodeError::Network("connection refused".into()));
            }
            Ok(vec![
                Location::from_coords(Some(format!("{}, Россия", query).as_str()), 55.7558, 37.6173),
                Location::from_coords(Some(format!("{}, USA", query).as_str()), 46.7324, -117.0002),
            ])
        }
    }

    fn resolver() -> (LocationResolver, Arc<AtomicUsize>) {
        let (geocoder, calls) = FakeGeocoder::new();
        (LocationResolver::new(Box::new(geocoder), SearchCache::in_memory()), calls)
    }

    #[test]
    fn test_short_query_skips_network() {
        let (mut resolver, calls) = resolver();
        for q in ["", "Mo", "  Mo  ", "Мо"] {
            let outcome = resolver.search(q);
            assert!(outcome.candidates.is_empty());
            assert!(outcome.notice.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn test_three_multibyte_chars_are_enough() {
        let (mut resolver, calls) = resolver();
        let outcome = resolver.search("Мос");
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeat_query_served_from_cache() {
        let (mut resolver, calls) = resolver();
        let first = resolver.search("Moscow");
        assert!(!first.from_cache);

        let second = resolver.search("Moscow");
        assert!(second.from_cache);
        assert_eq!(second.candidates, first.candidates);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_returns_notice_and_is_not_cached() {
        let (mut geocoder, calls) = FakeGeocoder::new();
        geocoder.fail = true;
        let mut resolver = LocationResolver::new(Box::new(geocoder), SearchCache::in_memory());

        let outcome = resolver.search("Moscow");
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.notice.as_deref(), Some(SEARCH_FAILED_NOTICE));

        resolver.search("Moscow");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(resolver.cache().is_empty());
    }

    #[test]
    fn test_offline_uses_cache_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("search-cache.json");
        let mut cache = SearchCache::load_from(path);
        cache.put("Moscow", &[Location::from_coords(Some("Moscow, Russia"), 55.75, 37.61)]);

        let (geocoder, calls) = FakeGeocoder::new();
        let mut resolver = LocationResolver::new(Box::new(geocoder), cache);
        resolver.set_offline(true);

        assert_eq!(resolver.search("Moscow").candidates.len(), 1);
        let miss = resolver.search("Berlin");
        assert!(miss.candidates.is_empty());
        assert_eq!(miss.notice.as_deref(), Some(OFFLINE_NOTICE));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_query_is_trimmed_before_caching() {
        let (mut resolver, calls) = resolver();
        resolver.search("  Moscow ");
        assert!(resolver.search("Moscow").from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
