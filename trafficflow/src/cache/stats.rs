//! Cache statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    /// Entries evicted from L1 by the LRU policy.
    pub l1_evictions: u64,
    /// Entries removed because their TTL passed.
    pub expired: u64,
    pub l1_entries: u64,
    pub remote_errors: u64,
    pub remote_available: bool,
    /// Bytes saved by compression across all writes.
    pub compression_savings: u64,
}

impl CacheStats {
    /// Fraction of requests served from either tier.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.l1_hits + self.l2_hits) as f64 / self.total_requests as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests, {:.1}% hit rate (L1 {}, L2 {}), {} entries, {} evicted, {} expired",
            self.total_requests,
            self.hit_rate() * 100.0,
            self.l1_hits,
            self.l2_hits,
            self.l1_entries,
            self.l1_evictions,
            self.expired
        )
    }
}

/// Live counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub total_requests: AtomicU64,
    pub l1_hits: AtomicU64,
    pub l2_hits: AtomicU64,
    pub misses: AtomicU64,
    pub expired: AtomicU64,
    pub remote_errors: AtomicU64,
    pub compression_savings: AtomicU64,
}

impl CacheCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
