//! Tiered cache combining [`MemoryTier`] and an optional [`RemoteTier`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::Codec;
use super::entry::{CacheEntry, StoredRecord};
use super::memory::MemoryTier;
use super::providers::{RedisTier, DEFAULT_REDIS_TIMEOUT};
use super::stats::{CacheCounters, CacheStats};
use super::traits::{RemoteTier, TierError};
use crate::clock::SharedClock;

/// Default L1 capacity in entries.
pub const DEFAULT_L1_CAPACITY: u64 = 1000;

/// Default entry TTL when a caller does not pass one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Serialized size above which values are compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Interval between L1 expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Default remote tier address.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Tiered cache configuration.
#[derive(Clone, Debug)]
pub struct TieredCacheConfig {
    pub enable_l1: bool,
    pub l1_capacity: u64,
    pub enable_l2: bool,
    /// Remote tier address, used by [`TieredCache::connect`].
    pub redis_url: String,
    pub remote_timeout: Duration,
    pub enable_compression: bool,
    pub compression_threshold: usize,
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            enable_l1: true,
            l1_capacity: DEFAULT_L1_CAPACITY,
            enable_l2: true,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            remote_timeout: DEFAULT_REDIS_TIMEOUT,
            enable_compression: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl TieredCacheConfig {
    pub fn with_l1_capacity(mut self, capacity: u64) -> Self {
        self.l1_capacity = capacity;
        self
    }

    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Disables the remote tier.
    pub fn memory_only(mut self) -> Self {
        self.enable_l2 = false;
        self
    }
}

/// Best-effort two-tier cache.
///
/// Construct one instance at startup and share it with an `Arc`. All methods
/// take `&self` and are safe to call concurrently.
pub struct TieredCache {
    l1: Option<MemoryTier>,
    l2: Option<Arc<dyn RemoteTier>>,
    /// L2 was enabled but no tier could be attached.
    l2_missing: bool,
    l2_down: AtomicBool,
    codec: Codec,
    default_ttl: Duration,
    sweep_interval: Duration,
    clock: SharedClock,
    counters: CacheCounters,
}

impl TieredCache {
    /// Creates a cache over an explicit remote tier.
    pub fn new(config: &TieredCacheConfig, remote: Option<Arc<dyn RemoteTier>>, clock: SharedClock) -> Self {
        let l1 = config
            .enable_l1
            .then(|| MemoryTier::new(config.l1_capacity.max(1)));
        let l2 = if config.enable_l2 { remote } else { None };

        Self {
            l1,
            l2_missing: config.enable_l2 && l2.is_none(),
            l2,
            l2_down: AtomicBool::new(false),
            codec: Codec::new(config.enable_compression, config.compression_threshold),
            default_ttl: config.default_ttl,
            sweep_interval: config.sweep_interval,
            clock,
            counters: CacheCounters::default(),
        }
    }

    /// Creates a cache, connecting to Redis when L2 is enabled.
    ///
    /// A failed connection is logged, counted as a remote error and the
    /// cache runs with L1 only.
    pub async fn connect(config: &TieredCacheConfig, clock: SharedClock) -> Self {
        let mut connect_failed = false;
        let remote: Option<Arc<dyn RemoteTier>> = if config.enable_l2 {
            match RedisTier::connect(&config.redis_url, config.remote_timeout).await {
                Ok(tier) => Some(Arc::new(tier)),
                Err(e) => {
                    warn!(error = %e, url = %config.redis_url, "Remote cache tier unavailable, using memory only");
                    connect_failed = true;
                    None
                }
            }
        } else {
            None
        };

        let cache = Self::new(config, remote, clock);
        if connect_failed {
            CacheCounters::incr(&cache.counters.remote_errors);
        }
        info!(
            l1_capacity = config.l1_capacity,
            l2 = cache.l2.is_some(),
            compression_threshold = config.compression_threshold,
            "Tiered cache ready"
        );
        cache
    }

    /// Returns the cached value for `key`, or `None` on a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        CacheCounters::incr(&self.counters.total_requests);
        let now = self.clock.now();

        if let Some(l1) = &self.l1 {
            if let Some(entry) = l1.get(key).await {
                if entry.is_expired(now) {
                    l1.remove(key).await;
                    CacheCounters::incr(&self.counters.expired);
                } else {
                    match self.codec.decode(entry.value(), entry.is_compressed()) {
                        Ok(value) => {
                            entry.touch(now);
                            CacheCounters::incr(&self.counters.l1_hits);
                            return Some(value);
                        }
                        // The entry may be valid for another type; leave it.
                        Err(e) => debug!(key = %key, error = %e, "L1 value does not match requested type"),
                    }
                }
            }
        }

        if let Some(l2) = self.remote() {
            match l2.get(key).await {
                Ok(Some(bytes)) => {
                    if let Some(value) = self.accept_remote(l2, key, &bytes).await {
                        CacheCounters::incr(&self.counters.l2_hits);
                        return Some(value);
                    }
                }
                Ok(None) => {}
                Err(e) => self.record_remote_error(key, e),
            }
        }

        CacheCounters::incr(&self.counters.misses);
        None
    }

    // Decodes a remote record, discarding it if expired, and backfills L1.
    async fn accept_remote<T: DeserializeOwned>(
        &self,
        l2: &Arc<dyn RemoteTier>,
        key: &str,
        bytes: &[u8],
    ) -> Option<T> {
        let now = self.clock.now();
        let record = match StoredRecord::from_bytes(bytes) {
            Ok(record) => record,
            Err(e) => {
                debug!(key = %key, error = %e, "Undecodable L2 record, deleting");
                self.delete_remote(l2, key).await;
                return None;
            }
        };

        if record.is_expired(now) {
            self.delete_remote(l2, key).await;
            CacheCounters::incr(&self.counters.expired);
            return None;
        }

        let value = match self.codec.decode(&record.value, record.compressed) {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "L2 value does not match requested type");
                return None;
            }
        };

        if let Some(l1) = &self.l1 {
            let entry = CacheEntry::from_record(key, record);
            entry.touch(now);
            l1.insert(entry).await;
        }
        Some(value)
    }

    async fn delete_remote(&self, l2: &Arc<dyn RemoteTier>, key: &str) {
        if let Err(e) = l2.delete(key).await {
            self.record_remote_error(key, e);
        }
    }

    /// Stores `value` under `key` in every tier.
    ///
    /// `ttl` of `None` uses the configured default. Returns `true` if at
    /// least one tier accepted the write.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let encoded = match self.codec.encode(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache value");
                return false;
            }
        };
        CacheCounters::add(&self.counters.compression_savings, encoded.savings());

        let entry = CacheEntry::new(key, encoded, self.clock.now(), ttl);
        let mut stored = false;

        if let Some(l2) = self.remote() {
            match entry.to_record().to_bytes() {
                Ok(bytes) => match l2.set_with_ttl(key, bytes, ttl).await {
                    Ok(()) => stored = true,
                    Err(e) => self.record_remote_error(key, e),
                },
                Err(e) => warn!(key = %key, error = %e, "Failed to encode remote record"),
            }
        }

        if let Some(l1) = &self.l1 {
            l1.insert(entry).await;
            stored = true;
        }

        stored
    }

    /// Writes a batch of values with a shared TTL. Returns how many were stored.
    pub async fn preload<T, I>(&self, items: I, ttl: Option<Duration>) -> usize
    where
        T: Serialize,
        I: IntoIterator<Item = (String, T)>,
    {
        let mut stored = 0;
        for (key, value) in items {
            if self.put(&key, &value, ttl).await {
                stored += 1;
            }
        }
        info!(stored, "Preloaded cache entries");
        stored
    }

    /// Loads every key in `keys` that has no live value in either tier.
    ///
    /// `loader` returning `None` skips the key. Returns how many values were
    /// stored. Request and hit counters are left untouched.
    pub async fn preload_missing<T, F, Fut>(&self, keys: &[String], loader: &F, ttl: Option<Duration>) -> usize
    where
        T: Serialize,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut stored = 0;
        for key in keys {
            if self.has_live(key).await {
                continue;
            }
            match loader(key.clone()).await {
                Some(value) => {
                    if self.put(key, &value, ttl).await {
                        stored += 1;
                    }
                }
                None => debug!(key = %key, "Preload loader had no value"),
            }
        }
        if stored > 0 {
            debug!(stored, "Preloaded missing cache entries");
        }
        stored
    }

    // Liveness check that neither counts requests nor backfills L1.
    async fn has_live(&self, key: &str) -> bool {
        let now = self.clock.now();
        if let Some(l1) = &self.l1 {
            if let Some(entry) = l1.get(key).await {
                if !entry.is_expired(now) {
                    return true;
                }
            }
        }
        let Some(l2) = self.remote() else {
            return false;
        };
        match l2.get(key).await {
            Ok(Some(bytes)) => StoredRecord::from_bytes(&bytes).is_ok_and(|record| !record.is_expired(now)),
            Ok(None) => false,
            Err(e) => {
                self.record_remote_error(key, e);
                false
            }
        }
    }

    /// Removes `key` from every tier. Returns whether any tier had it.
    pub async fn delete(&self, key: &str) -> bool {
        let mut removed = false;
        if let Some(l1) = &self.l1 {
            removed |= l1.remove(key).await;
        }
        if let Some(l2) = self.remote() {
            match l2.delete(key).await {
                Ok(existed) => removed |= existed,
                Err(e) => self.record_remote_error(key, e),
            }
        }
        removed
    }

    /// True if a live value exists for `key` in either tier.
    pub async fn contains(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).await.is_some()
    }

    /// Empties every tier.
    pub async fn clear(&self) {
        if let Some(l1) = &self.l1 {
            l1.clear();
            l1.sync().await;
        }
        if let Some(l2) = self.remote() {
            if let Err(e) = l2.clear().await {
                self.record_remote_error("*", e);
            }
        }
    }

    /// Removes expired entries from L1. Returns how many were removed.
    pub async fn sweep_expired(&self) -> u64 {
        let Some(l1) = &self.l1 else {
            return 0;
        };
        let removed = l1.remove_expired(self.clock.now()).await;
        CacheCounters::add(&self.counters.expired, removed);
        removed
    }

    /// Re-enables a remote tier that was marked down, if it answers a ping.
    pub async fn probe_remote(&self) -> bool {
        let Some(l2) = &self.l2 else {
            return false;
        };
        if !self.l2_down.load(Ordering::Acquire) {
            return true;
        }
        match l2.ping().await {
            Ok(()) => {
                self.l2_down.store(false, Ordering::Release);
                info!("Remote cache tier reachable again");
                true
            }
            Err(e) => {
                debug!(error = %e, "Remote cache tier still unavailable");
                false
            }
        }
    }

    /// Spawns the periodic sweep task.
    ///
    /// Each tick removes expired L1 entries and pings a downed remote tier.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        debug!("Cache sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired().await;
                        if removed > 0 {
                            debug!(removed, "Swept expired cache entries");
                        }
                        cache.probe_remote().await;
                    }
                }
            }
        })
    }

    /// Spawns a task that refills missing or expired `keys` from `loader`.
    ///
    /// The first pass runs immediately, then once per `interval`, using the
    /// default TTL for loaded values.
    pub fn spawn_preloader<T, F, Fut>(
        self: &Arc<Self>,
        interval: Duration,
        keys: Vec<String>,
        loader: F,
        shutdown: CancellationToken,
    ) -> JoinHandle<()>
    where
        T: Serialize + Send + Sync + 'static,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        debug!("Cache preloader shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.preload_missing(&keys, &loader, None).await;
                    }
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            total_requests: CacheCounters::get(&c.total_requests),
            l1_hits: CacheCounters::get(&c.l1_hits),
            l2_hits: CacheCounters::get(&c.l2_hits),
            misses: CacheCounters::get(&c.misses),
            l1_evictions: self.l1.as_ref().map(|l1| l1.evictions()).unwrap_or(0),
            expired: CacheCounters::get(&c.expired),
            l1_entries: self.l1.as_ref().map(|l1| l1.entry_count()).unwrap_or(0),
            remote_errors: CacheCounters::get(&c.remote_errors),
            remote_available: self.l2.is_some() && !self.l2_down.load(Ordering::Acquire),
            compression_savings: CacheCounters::get(&c.compression_savings),
        }
    }

    // Every call that skips an unreachable tier counts as a remote error.
    fn remote(&self) -> Option<&Arc<dyn RemoteTier>> {
        if self.l2_missing || self.l2_down.load(Ordering::Acquire) {
            CacheCounters::incr(&self.counters.remote_errors);
            return None;
        }
        self.l2.as_ref()
    }

    fn record_remote_error(&self, key: &str, err: TierError) {
        CacheCounters::incr(&self.counters.remote_errors);
        if err.is_unavailable() {
            if !self.l2_down.swap(true, Ordering::AcqRel) {
                warn!(key = %key, error = %err, "Remote cache tier down, continuing with memory only");
            }
        } else {
            warn!(key = %key, error = %err, "Remote cache tier operation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::BoxFuture;
    use crate::clock::ManualClock;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    /// In-process remote tier that ignores TTLs, like a store that has not
    /// purged yet.
    #[derive(Default)]
    struct FakeRemote {
        data: Mutex<HashMap<String, Vec<u8>>>,
        down: AtomicBool,
    }

    impl FakeRemote {
        fn check(&self) -> Result<(), TierError> {
            if self.down.load(Ordering::SeqCst) {
                Err(TierError::Unavailable("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    impl RemoteTier for FakeRemote {
        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, TierError>> {
            Box::pin(async move {
                self.check()?;
                Ok(self.data.lock().get(key).cloned())
            })
        }

        fn set_with_ttl<'a>(
            &'a self,
            key: &'a str,
            value: Vec<u8>,
            _ttl: Duration,
        ) -> BoxFuture<'a, Result<(), TierError>> {
            Box::pin(async move {
                self.check()?;
                self.data.lock().insert(key.to_string(), value);
                Ok(())
            })
        }

        fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, TierError>> {
            Box::pin(async move {
                self.check()?;
                Ok(self.data.lock().remove(key).is_some())
            })
        }

        fn clear(&self) -> BoxFuture<'_, Result<(), TierError>> {
            Box::pin(async move {
                self.check()?;
                self.data.lock().clear();
                Ok(())
            })
        }

        fn ping(&self) -> BoxFuture<'_, Result<(), TierError>> {
            Box::pin(async move { self.check() })
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        road: String,
        speeds: Vec<f64>,
    }

    fn reading(n: usize) -> Reading {
        Reading {
            road: "Wensan Road".to_string(),
            speeds: (0..n).map(|i| i as f64 * 1.5).collect(),
        }
    }

    fn setup(config: TieredCacheConfig) -> (TieredCache, Arc<FakeRemote>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let remote = Arc::new(FakeRemote::default());
        let cache = TieredCache::new(&config, Some(remote.clone()), clock.clone());
        (cache, remote, clock)
    }

    #[tokio::test]
    async fn test_round_trip_uncompressed() {
        let (cache, _, _) = setup(TieredCacheConfig::default());
        assert!(cache.put("k", &reading(3), None).await);
        assert_eq!(cache.get::<Reading>("k").await, Some(reading(3)));
        assert_eq!(cache.stats().compression_savings, 0);
    }

    #[tokio::test]
    async fn test_round_trip_compressed() {
        let (cache, remote, _) = setup(TieredCacheConfig::default().with_compression_threshold(64));
        let value = reading(500);
        assert!(cache.put("k", &value, None).await);
        assert_eq!(cache.get::<Reading>("k").await, Some(value.clone()));

        // Remote copy is flagged compressed.
        let bytes = remote.data.lock().get("k").cloned().unwrap();
        assert!(StoredRecord::from_bytes(&bytes).unwrap().compressed);
        assert!(cache.stats().compression_savings > 0);
    }

    #[tokio::test]
    async fn test_expiry_with_simulated_clock() {
        let (cache, _, clock) = setup(TieredCacheConfig::default());
        cache.put("k", &reading(1), Some(Duration::from_secs(30))).await;

        clock.advance(Duration::from_secs(29));
        assert!(cache.get::<Reading>("k").await.is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get::<Reading>("k").await.is_none());
        // Both tiers dropped it; asking again is still a miss.
        assert!(cache.get::<Reading>("k").await.is_none());
        assert!(cache.stats().expired >= 1);
    }

    #[tokio::test]
    async fn test_l2_expired_record_is_deleted_on_read() {
        let config = TieredCacheConfig {
            enable_l1: false,
            ..Default::default()
        };
        let (cache, remote, clock) = setup(config);
        cache.put("k", &reading(1), Some(Duration::from_secs(10))).await;
        clock.advance(Duration::from_secs(11));

        assert!(cache.get::<Reading>("k").await.is_none());
        assert!(remote.data.lock().get("k").is_none());
    }

    #[tokio::test]
    async fn test_l2_hit_backfills_l1_without_extending_ttl() {
        let (cache, remote, clock) = setup(TieredCacheConfig::default());
        cache.put("k", &reading(2), Some(Duration::from_secs(60))).await;

        // Simulate another process: value only in L2.
        let other = TieredCache::new(&TieredCacheConfig::default(), Some(remote.clone()), clock.clone());
        clock.advance(Duration::from_secs(40));
        assert_eq!(other.get::<Reading>("k").await, Some(reading(2)));
        assert_eq!(other.stats().l2_hits, 1);

        // Served from L1 now.
        assert!(other.get::<Reading>("k").await.is_some());
        assert_eq!(other.stats().l1_hits, 1);

        // Backfilled entry keeps the original deadline.
        remote.data.lock().clear();
        clock.advance(Duration::from_secs(20));
        assert!(other.get::<Reading>("k").await.is_none());
        drop(cache);
    }

    #[tokio::test]
    async fn test_lru_eviction_is_counted() {
        let config = TieredCacheConfig::default().with_l1_capacity(2).memory_only();
        let (cache, _, _) = setup(config);
        cache.put("a", &1u32, None).await;
        cache.put("b", &2u32, None).await;
        assert_eq!(cache.get::<u32>("a").await, Some(1));
        cache.put("c", &3u32, None).await;

        assert_eq!(cache.get::<u32>("b").await, None);
        assert_eq!(cache.get::<u32>("a").await, Some(1));
        assert_eq!(cache.stats().l1_evictions, 1);
    }

    #[tokio::test]
    async fn test_remote_down_degrades_to_memory() {
        let (cache, remote, _) = setup(TieredCacheConfig::default());
        remote.down.store(true, Ordering::SeqCst);

        assert!(cache.put("k", &reading(1), None).await);
        assert_eq!(cache.get::<Reading>("k").await, Some(reading(1)));
        let stats = cache.stats();
        assert_eq!(stats.remote_errors, 1);
        assert!(!stats.remote_available);

        // Subsequent calls skip the tier and each one is counted.
        cache.put("j", &reading(1), None).await;
        assert_eq!(cache.stats().remote_errors, 2);
        assert_eq!(cache.get::<Reading>("missing").await, None);
        assert_eq!(cache.stats().remote_errors, 3);
        cache.delete("j").await;
        assert_eq!(cache.stats().remote_errors, 4);

        remote.down.store(false, Ordering::SeqCst);
        assert!(cache.probe_remote().await);
        assert!(cache.stats().remote_available);
    }

    #[tokio::test]
    async fn test_missing_remote_counts_errors() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = TieredCache::new(&TieredCacheConfig::default(), None, clock);

        assert!(cache.put("k", &1u32, None).await);
        assert_eq!(cache.get::<u32>("absent").await, None);
        let stats = cache.stats();
        assert_eq!(stats.remote_errors, 2);
        assert!(!stats.remote_available);

        // Disabling L2 on purpose is not an error.
        let clock = Arc::new(ManualClock::starting_now());
        let memory = TieredCache::new(&TieredCacheConfig::default().memory_only(), None, clock);
        memory.put("k", &1u32, None).await;
        memory.get::<u32>("absent").await;
        assert_eq!(memory.stats().remote_errors, 0);
    }

    #[tokio::test]
    async fn test_l1_type_mismatch_keeps_entry() {
        let (cache, _, _) = setup(TieredCacheConfig::default());
        cache.put("k", &7u32, None).await;

        assert_eq!(cache.get::<Reading>("k").await, None);
        assert_eq!(cache.get::<u32>("k").await, Some(7));
        assert_eq!(cache.stats().l1_hits, 1);
        assert_eq!(cache.stats().l1_entries, 1);
    }

    #[tokio::test]
    async fn test_preload_missing_skips_live_keys() {
        let (cache, _, _) = setup(TieredCacheConfig::default());
        cache.put("a", &1u32, None).await;
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let loader = move |key: String| {
            seen.lock().push(key.clone());
            async move { (key != "none").then_some(9u32) }
        };

        let keys = vec!["a".to_string(), "b".to_string(), "none".to_string()];
        assert_eq!(cache.preload_missing(&keys, &loader, None).await, 1);
        assert_eq!(*calls.lock(), vec!["b".to_string(), "none".to_string()]);
        assert_eq!(cache.get::<u32>("a").await, Some(1));
        assert_eq!(cache.get::<u32>("b").await, Some(9));
        // Liveness checks are not requests.
        assert_eq!(cache.stats().total_requests, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preloader_refills_expired_keys() {
        let clock = Arc::new(ManualClock::starting_now());
        let config = TieredCacheConfig::default()
            .memory_only()
            .with_default_ttl(Duration::from_secs(300));
        let cache = Arc::new(TieredCache::new(&config, None, clock.clone()));
        let loads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = loads.clone();
        let loader = move |_key: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Some(1u32) }
        };

        let shutdown = CancellationToken::new();
        let keys = vec!["x".to_string(), "y".to_string()];
        let handle = cache.spawn_preloader(Duration::from_secs(60), keys, loader, shutdown.clone());

        // First pass runs at once.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().l1_entries, 2);

        // Live keys are left alone on the next tick.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        clock.advance(Duration::from_secs(301));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(loads.load(Ordering::SeqCst), 4);
        assert_eq!(cache.get::<u32>("x").await, Some(1));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_and_clear_apply_to_both_tiers() {
        let (cache, remote, _) = setup(TieredCacheConfig::default());
        cache.put("a", &1u32, None).await;
        cache.put("b", &2u32, None).await;

        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);
        assert!(remote.data.lock().get("a").is_none());

        cache.clear().await;
        assert!(remote.data.lock().is_empty());
        assert!(!cache.contains("b").await);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_l1_entries() {
        let (cache, _, clock) = setup(TieredCacheConfig::default().memory_only());
        cache.put("short", &1u32, Some(Duration::from_secs(5))).await;
        cache.put("long", &2u32, Some(Duration::from_secs(500))).await;
        clock.advance(Duration::from_secs(6));

        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.stats().l1_entries, 1);
    }

    #[tokio::test]
    async fn test_preload() {
        let (cache, _, _) = setup(TieredCacheConfig::default());
        let items = vec![("x".to_string(), 1u32), ("y".to_string(), 2u32)];
        assert_eq!(cache.preload(items, None).await, 2);
        assert_eq!(cache.get::<u32>("y").await, Some(2));
    }

    #[tokio::test]
    async fn test_hit_rate_accounting() {
        let (cache, _, _) = setup(TieredCacheConfig::default());
        cache.put("k", &1u32, None).await;
        cache.get::<u32>("k").await;
        cache.get::<u32>("missing").await;
        let stats = cache.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
