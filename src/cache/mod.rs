//! Content-hashed, TTL-bound caching.
//!
//! One logical store per payload kind:
//! - classification results (what a term resolved to)
//! - raw validator responses (fastest expiry)
//! - merged suggestion lists (longest-lived)
//!
//! Each store is keyed by the SHA-256 of the normalized term, so surface
//! variants share an entry. Stores are injected values, not globals; tests
//! swap in in-memory stores.

pub mod store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::Serialize;
use serde_json::Value;

pub use store::{cache_key, CacheEntry, CacheStore, FileCache, MemoryCache, StoreStats};

/// The three payload kinds, each with its own TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// Resolved term classifications
    Classification,
    /// Raw terminology-validator responses
    Validator,
    /// Merged suggestion lists
    Suggestion,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Classification => "classification",
            CacheKind::Validator => "validator",
            CacheKind::Suggestion => "suggestion",
        }
    }
}

/// TTL and capacity settings for the cache set
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Classification TTL in seconds (default 24h)
    pub classification_ttl_secs: i64,
    /// Validator response TTL in seconds (default 5m, fastest expiry)
    pub validator_ttl_secs: i64,
    /// Suggestion list TTL in seconds (default 7d, longest-lived)
    pub suggestion_ttl_secs: i64,
    /// Max entries per store
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            classification_ttl_secs: 24 * 3600,
            validator_ttl_secs: 300,
            suggestion_ttl_secs: 7 * 24 * 3600,
            capacity: 1000,
        }
    }
}

/// Per-kind cache stats snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub classification: StoreStats,
    pub validator: StoreStats,
    pub suggestion: StoreStats,
}

/// The engine's set of caches, one store per kind
pub struct CacheSet {
    classification: Arc<dyn CacheStore>,
    validator: Arc<dyn CacheStore>,
    suggestion: Arc<dyn CacheStore>,
    settings: CacheSettings,
}

impl CacheSet {
    /// Build from explicit stores (tests inject in-memory stores here)
    pub fn new(
        classification: Arc<dyn CacheStore>,
        validator: Arc<dyn CacheStore>,
        suggestion: Arc<dyn CacheStore>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            classification,
            validator,
            suggestion,
            settings,
        }
    }

    /// All-in-memory set (no persistence)
    pub fn in_memory(settings: CacheSettings) -> Self {
        let capacity = settings.capacity;
        Self::new(
            Arc::new(MemoryCache::new(capacity)),
            Arc::new(MemoryCache::new(capacity)),
            Arc::new(MemoryCache::new(capacity)),
            settings,
        )
    }

    /// Durable set with one JSON snapshot per kind under `dir`
    pub fn durable(dir: &Path, settings: CacheSettings) -> Self {
        let capacity = settings.capacity;
        Self::new(
            Arc::new(FileCache::open(dir.join("classification.json"), capacity)),
            Arc::new(FileCache::open(dir.join("validator.json"), capacity)),
            Arc::new(FileCache::open(dir.join("suggestion.json"), capacity)),
            settings,
        )
    }

    fn store(&self, kind: CacheKind) -> &dyn CacheStore {
        match kind {
            CacheKind::Classification => self.classification.as_ref(),
            CacheKind::Validator => self.validator.as_ref(),
            CacheKind::Suggestion => self.suggestion.as_ref(),
        }
    }

    fn ttl(&self, kind: CacheKind) -> Duration {
        let secs = match kind {
            CacheKind::Classification => self.settings.classification_ttl_secs,
            CacheKind::Validator => self.settings.validator_ttl_secs,
            CacheKind::Suggestion => self.settings.suggestion_ttl_secs,
        };
        Duration::seconds(secs)
    }

    /// Look up a term in the given kind's store
    pub fn get(&self, kind: CacheKind, term: &str) -> Option<CacheEntry> {
        self.store(kind).get(&cache_key(term))
    }

    /// Cache a payload for a term with the kind's TTL
    pub fn put(&self, kind: CacheKind, term: &str, payload: Value) {
        let ttl = self.ttl(kind);
        self.store(kind).put(&cache_key(term), payload, ttl);
    }

    /// Sweep expired entries from every store
    pub fn sweep_all(&self) -> usize {
        let removed = self.classification.sweep() + self.validator.sweep() + self.suggestion.sweep();
        if removed > 0 {
            tracing::info!("Cache sweep removed {} expired entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            classification: self.classification.stats(),
            validator: self.validator.stats(),
            suggestion: self.suggestion.stats(),
        }
    }
}

/// Spawn a background task that sweeps expired entries on an interval
pub fn spawn_sweeper(caches: Arc<CacheSet>, every: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately; skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            caches.sweep_all();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kinds_are_isolated() {
        let caches = CacheSet::in_memory(CacheSettings::default());
        caches.put(CacheKind::Validator, "warfarin", json!({"valid": true}));

        assert!(caches.get(CacheKind::Validator, "warfarin").is_some());
        assert!(caches.get(CacheKind::Classification, "warfarin").is_none());
        assert!(caches.get(CacheKind::Suggestion, "warfarin").is_none());
    }

    #[test]
    fn test_surface_variants_share_entry() {
        let caches = CacheSet::in_memory(CacheSettings::default());
        caches.put(CacheKind::Classification, "  Metformin ", json!("correct"));
        assert!(caches.get(CacheKind::Classification, "metformin").is_some());
    }

    #[test]
    fn test_validator_ttl_is_fastest() {
        let settings = CacheSettings::default();
        assert!(settings.validator_ttl_secs < settings.classification_ttl_secs);
        assert!(settings.classification_ttl_secs < settings.suggestion_ttl_secs);
    }

    #[tokio::test]
    async fn test_background_sweeper_removes_expired() {
        let settings = CacheSettings {
            validator_ttl_secs: -1,
            ..CacheSettings::default()
        };
        let caches = Arc::new(CacheSet::in_memory(settings));
        caches.put(CacheKind::Validator, "warfarin", json!({"valid": true}));

        let handle = spawn_sweeper(caches.clone(), StdDuration::from_millis(10));
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        handle.abort();

        assert_eq!(caches.store(CacheKind::Validator).len(), 0);
    }

    #[test]
    fn test_sweep_all_counts_across_kinds() {
        let settings = CacheSettings {
            classification_ttl_secs: -1,
            validator_ttl_secs: -1,
            suggestion_ttl_secs: 3600,
            capacity: 10,
        };
        let caches = CacheSet::in_memory(settings);
        caches.put(CacheKind::Classification, "a", json!(1));
        caches.put(CacheKind::Validator, "b", json!(2));
        caches.put(CacheKind::Suggestion, "c", json!(3));

        assert_eq!(caches.sweep_all(), 2);
        assert!(caches.get(CacheKind::Suggestion, "c").is_some());
    }
}
