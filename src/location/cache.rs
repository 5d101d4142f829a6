//! File-backed search cache at ~/.natal/search-cache.json.
//!
//! Keys are `location_<query>` with the query text taken literally (case
//! and whitespace included). Values are the candidate lists returned for
//! that query. Entries never expire and are never evicted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::types::Location;

const KEY_PREFIX: &str = "location_";

/// The search cache. Without a path it lives only in memory.
pub struct SearchCache {
    path: Option<PathBuf>,
    entries: HashMap<String, Vec<Location>>,
}

impl SearchCache {
    /// Load the cache from the default location (~/.natal/search-cache.json).
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load the cache from a specific file. A missing or unreadable file
    /// starts an empty cache.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path: Some(path),
            entries,
        }
    }

    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".natal")
            .join("search-cache.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<String, Vec<Location>>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("ignoring corrupt search cache {}: {}", path.display(), e);
                None
            }
        }
    }

    fn key(query: &str) -> String {
        format!("{}{}", KEY_PREFIX, query)
    }

    /// Cached candidates for exactly this query text.
    pub fn get(&self, query: &str) -> Option<Vec<Location>> {
        let hit = self.entries.get(&Self::key(query)).cloned();
        if hit.is_some() {
            debug!("search cache hit for '{}'", query);
        }
        hit
    }

    /// Store candidates for a query and persist to disk.
    pub fn put(&mut self, query: &str, candidates: &[Location]) {
        self.entries.insert(Self::key(query), candidates.to_vec());
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("cannot create cache directory {}: {}", parent.display(), e);
                return;
            }
        }
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("cannot write search cache {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("cannot serialize search cache: {}", e),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn moscow() -> Location {
        Location {
            name: "Москва, Россия".into(),
            latitude: 55.7558,
            longitude: 37.6173,
            display_name: "Москва, Центральный федеральный округ, Россия".into(),
            address: Default::default(),
            timezone: None,
        }
    }

    fn test_cache() -> (SearchCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("search-cache.json");
        (SearchCache::load_from(path), dir)
    }

    #[test]
    fn test_cache_put_get() {
        let (mut cache, _dir) = test_cache();
        cache.put("Моск", &[moscow()]);

        let hit = cache.get("Моск").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "Москва, Россия");
    }

    #[test]
    fn test_cache_keys_are_literal() {
        let (mut cache, _dir) = test_cache();
        cache.put("Moscow", &[moscow()]);

        assert!(cache.get("Moscow").is_some());
        assert!(cache.get("moscow").is_none());
        assert!(cache.get("Moscow ").is_none());
    }

    #[test]
    fn test_cache_stores_empty_results() {
        let (mut cache, _dir) = test_cache();
        cache.put("Atlantis", &[]);
        assert_eq!(cache.get("Atlantis"), Some(vec![]));
    }

    #[test]
    fn test_cache_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("search-cache.json");

        {
            let mut cache = SearchCache::load_from(path.clone());
            cache.put("Moscow", &[moscow()]);
        }

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"location_Moscow\""));

        let reloaded = SearchCache::load_from(path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("Moscow").unwrap()[0].latitude, 55.7558);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("search-cache.json");
        fs::write(&path, "{not json").unwrap();

        let cache = SearchCache::load_from(path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_in_memory_never_writes() {
        let mut cache = SearchCache::in_memory();
        cache.put("Moscow", &[moscow()]);
        assert_eq!(cache.len(), 1);
        assert!(cache.path.is_none());
    }
}
