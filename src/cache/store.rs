//! Key-value stores backing the catalog cache.
//!
//! Values are opaque serialized strings with a per-entry TTL. The in-process
//! store is an LRU bounded by `cache.max_entries`; expired entries are dropped
//! lazily on read.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT_TOTAL: &str = "storefront_cache_evict_total";
/// Longest lifetime an entry may have; longer TTLs are clamped.
const MAX_ENTRY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("key-value store rejected write for `{key}`: {message}")]
    Rejected { key: String, message: String },
}

impl KvError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Remote or local string store with per-entry expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), KvError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// Bounded in-process store.
pub struct MemoryKvStore {
    entries: Mutex<LruCache<String, StoredValue>>,
}

impl MemoryKvStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(stored) if stored.expires_at > now => return Some(stored.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn write(&self, key: &str, value: String, ttl: Duration, now: Instant) {
        let Some(expires_at) = now.checked_add(ttl.min(MAX_ENTRY_TTL)) else {
            return;
        };
        let stored = StoredValue { value, expires_at };
        let mut entries = mutex_lock(&self.entries, SOURCE, "put");
        if let Some((evicted, _)) = entries.push(key.to_string(), stored) {
            if evicted != key {
                counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
            }
        }
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.read(key, Instant::now()))
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), KvError> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.write(key, value, ttl, Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_entries: usize) -> MemoryKvStore {
        MemoryKvStore::new(&CacheConfig {
            max_entries,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn get_returns_stored_value() {
        let store = store(4);
        store
            .put("category:electronics", "{}".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get("category:electronics").await.unwrap().as_deref(),
            Some("{}")
        );
        assert_eq!(store.get("category:garden").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unbounded_ttl_is_clamped() {
        let store = store(4);
        store
            .put("collections", "[]".into(), Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(store.get("collections").await.unwrap().as_deref(), Some("[]"));

        let now = Instant::now();
        store.write("product-count", "3".into(), Duration::MAX, now);
        assert_eq!(store.read("product-count", now + MAX_ENTRY_TTL), None);
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let store = store(4);
        let now = Instant::now();
        store.write("product-count", "3".into(), Duration::from_secs(5), now);

        assert_eq!(store.read("product-count", now).as_deref(), Some("3"));
        assert_eq!(store.read("product-count", now + Duration::from_secs(5)), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let store = store(4);
        store.put("search:a", "[]".into(), Duration::ZERO).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recent() {
        let store = store(2);
        let ttl = Duration::from_secs(60);
        store.put("a", "1".into(), ttl).await.unwrap();
        store.put("b", "2".into(), ttl).await.unwrap();
        store.get("a").await.unwrap();
        store.put("c", "3".into(), ttl).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("b").await.unwrap(), None);
        assert!(store.get("a").await.unwrap().is_some());
    }
}
