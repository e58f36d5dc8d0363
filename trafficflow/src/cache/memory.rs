//! In-memory (L1) tier using moka.
//!
//! The moka cache is configured with a strict LRU eviction policy and an
//! entry-count capacity, so the entry evicted on overflow is always the one
//! least recently read or written.
//!
//! Expiry is not delegated to moka. Entries carry their own `created_at` and
//! TTL, checked on every read and removed in bulk by
//! [`MemoryTier::remove_expired`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;

use super::entry::CacheEntry;

/// Bounded LRU tier.
pub struct MemoryTier {
    cache: MokaCache<String, Arc<CacheEntry>>,
    capacity: u64,
    evictions: Arc<AtomicU64>,
}

impl MemoryTier {
    /// Creates a tier holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&evictions);

        let cache = MokaCache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |_key, _value, cause| {
                if cause == RemovalCause::Size {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();

        Self {
            cache,
            capacity,
            evictions,
        }
    }

    /// Looks up `key`, refreshing its LRU position.
    pub async fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.cache.get(key).await
    }

    /// Inserts an entry and applies any eviction it causes.
    pub async fn insert(&self, entry: CacheEntry) {
        let key = entry.key().to_string();
        self.cache.insert(key, Arc::new(entry)).await;
        // Keep the entry count within capacity before returning.
        self.cache.run_pending_tasks().await;
    }

    /// Removes `key`. Returns whether it was present.
    pub async fn remove(&self, key: &str) -> bool {
        self.cache.remove(key).await.is_some()
    }

    /// Removes every entry whose TTL has passed. Returns how many were removed.
    pub async fn remove_expired(&self, now: DateTime<Utc>) -> u64 {
        let expired: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in expired {
            if self.cache.remove(key.as_str()).await.is_some() {
                removed += 1;
            }
        }
        self.cache.run_pending_tasks().await;
        removed
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Applies pending maintenance so counts are exact.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Entries evicted by the LRU policy so far.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
