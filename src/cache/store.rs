//! TTL-bound, capacity-bounded cache stores.
//!
//! Entries are keyed by a content hash of the normalized term so surface
//! variants ("Warfarin ", "warfarin") share one entry. Lookups never fail:
//! an absent, expired, or malformed entry is simply a miss. Eviction is
//! least-recently-accessed when capacity is reached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::normalize_term;

/// Cache key for a term: hex SHA-256 of the normalized term text
pub fn cache_key(term: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_term(term).as_bytes());
    hex::encode(hasher.finalize())
}

/// A single cached payload with expiry and access bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content-hash key (see [`cache_key`])
    pub key: String,

    /// Kind-specific payload, stored as JSON
    pub payload: Value,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// Hard expiry; lookups past this point miss
    pub expires_at: DateTime<Utc>,

    /// Successful lookups since creation (observability only)
    pub access_count: u64,

    /// Last successful lookup, used for LRU eviction
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Hit/miss and size counters for one store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Storage interface for one cache kind.
///
/// Implementations must tolerate concurrent readers; writes (insert, evict,
/// sweep) may be serialized.
pub trait CacheStore: Send + Sync {
    /// Look up an entry. Expired entries are never returned; every hit
    /// increments the entry's access counter.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Insert or replace an entry with the given TTL
    fn put(&self, key: &str, payload: Value, ttl: Duration);

    /// Remove an entry if present
    fn remove(&self, key: &str);

    /// Delete all expired entries, returning how many were removed
    fn sweep(&self) -> usize;

    /// Number of entries currently stored (including not-yet-swept expired)
    fn len(&self) -> usize;

    /// Hit/miss counters
    fn stats(&self) -> StoreStats;
}

struct MemoryInner {
    entries: HashMap<String, CacheEntry>,
}

/// In-memory store with LRU eviction, used directly in tests and as the
/// working set of [`FileCache`]
pub struct MemoryCache {
    inner: RwLock<MemoryInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                entries: HashMap::new(),
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Snapshot all entries (for persistence)
    pub fn entries(&self) -> Vec<CacheEntry> {
        let inner = self.inner.read().expect("cache lock poisoned");
        inner.entries.values().cloned().collect()
    }

    /// Replace contents from a snapshot, dropping already-expired entries
    pub fn load_entries(&self, entries: Vec<CacheEntry>) {
        let now = Utc::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");
        inner.entries = entries
            .into_iter()
            .filter(|e| !e.is_expired_at(now))
            .map(|e| (e.key.clone(), e))
            .collect();
    }

    /// Evict the least-recently-accessed entry. Ties break on key so
    /// eviction order is deterministic.
    fn evict_one(inner: &mut MemoryInner) {
        let victim = inner
            .entries
            .values()
            .min_by(|a, b| {
                a.last_accessed
                    .cmp(&b.last_accessed)
                    .then_with(|| a.key.cmp(&b.key))
            })
            .map(|e| e.key.clone());

        if let Some(key) = victim {
            inner.entries.remove(&key);
        }
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Utc::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");

        match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.access_count += 1;
                entry.last_accessed = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: &str, payload: Value, ttl: Duration) {
        let now = Utc::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");

        if !inner.entries.contains_key(key) && inner.entries.len() >= self.capacity {
            Self::evict_one(&mut inner);
        }

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload,
                created_at: now,
                expires_at: now + ttl,
                access_count: 0,
                last_accessed: now,
            },
        );
    }

    fn remove(&self, key: &str) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        inner.entries.remove(key);
    }

    fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().expect("cache lock poisoned");
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired_at(now));
        before - inner.entries.len()
    }

    fn len(&self) -> usize {
        let inner = self.inner.read().expect("cache lock poisoned");
        inner.entries.len()
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Durable store: in-memory working set plus a JSON snapshot on disk.
///
/// The snapshot is rewritten after every mutation. A missing or malformed
/// snapshot degrades to an empty cache rather than an error.
pub struct FileCache {
    mem: MemoryCache,
    path: PathBuf,
}

impl FileCache {
    /// Open (or create) a file-backed cache at `path`
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mem = MemoryCache::new(capacity);

        match Self::load_snapshot(&path) {
            Some(entries) => mem.load_entries(entries),
            None => {
                if path.exists() {
                    tracing::warn!("Discarding unreadable cache snapshot: {}", path.display());
                }
            }
        }

        Self { mem, path }
    }

    fn load_snapshot(path: &Path) -> Option<Vec<CacheEntry>> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn persist(&self) {
        let entries = self.mem.entries();
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create cache directory: {}", e);
                return;
            }
        }

        match serde_json::to_string(&entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::warn!("Failed to persist cache snapshot {}: {}", self.path.display(), e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize cache snapshot: {}", e),
        }
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        // Access counters reach disk on the next mutation
        self.mem.get(key)
    }

    fn put(&self, key: &str, payload: Value, ttl: Duration) {
        self.mem.put(key, payload, ttl);
        self.persist();
    }

    fn remove(&self, key: &str) {
        self.mem.remove(key);
        self.persist();
    }

    fn sweep(&self) -> usize {
        let removed = self.mem.sweep();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    fn len(&self) -> usize {
        self.mem.len()
    }

    fn stats(&self) -> StoreStats {
        self.mem.stats()
    }
}
