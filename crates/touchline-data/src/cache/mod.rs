//! Caching layer for analysis results.
//!
//! Results are stored as JSON strings keyed by a caller-chosen key and expire
//! after a time-to-live. Entries are not locked while being recomputed, so two
//! concurrent misses both compute and the last write wins.

pub mod sqlite;

pub use sqlite::SqliteCache;

use crate::error::{DataError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Key/value cache with per-entry expiry.
pub trait AnalysisCache {
    /// Fetch a live entry; expired entries read as `None`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store an entry that expires `ttl` from now.
    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Drop an entry.
    fn invalidate(&self, key: &str) -> Result<()>;
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of funnel stages stored
    pub funnel_stages: usize,
    /// Number of daily transition rows stored
    pub transition_rows: usize,
    /// Number of cached analyses, expired included
    pub cached_analyses: usize,
    /// Number of cached analyses that are still live
    pub live_analyses: usize,
}

/// Process-local [`AnalysisCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (String, DateTime<Utc>)>>> {
        self.entries
            .lock()
            .map_err(|_| DataError::Cache("memory cache lock poisoned".to_string()))
    }

    /// Number of stored entries, expired included.
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        let Some((value, expires_at)) = entries.get(key) else {
            return Ok(None);
        };
        if *expires_at > Utc::now() {
            return Ok(Some(value.clone()));
        }

        entries.remove(key);
        Ok(None)
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = Utc::now() + ttl;
        self.lock()?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache.put("k", "{\"a\":1}", Duration::minutes(5)).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(cache.get("missing").unwrap(), None);

        cache.invalidate("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache.put("stale", "1", Duration::seconds(-1)).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("stale").unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_memory_cache_overwrite() {
        let cache = MemoryCache::new();
        cache.put("k", "1", Duration::minutes(1)).unwrap();
        cache.put("k", "2", Duration::minutes(1)).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("2"));
    }
}
