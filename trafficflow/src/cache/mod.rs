//! Two-tier cache: an in-process LRU (L1) in front of an optional shared
//! remote store (L2).
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────┐   miss   ┌───────────────────┐
//!   get(key) ───►│  MemoryTier  │─────────►│ RemoteTier (L2)   │
//!                │  (moka, LRU) │◄─────────│ e.g. RedisTier    │
//!                └──────────────┘ backfill └───────────────────┘
//! ```
//!
//! Values are serialized as JSON and gzip-compressed above a size threshold.
//! Every entry carries `created_at` and `ttl`; no entry is returned once
//! `created_at + ttl` has passed, whatever the tier. The cache is best-effort:
//! tier failures are counted and logged, never returned to callers.

mod codec;
mod entry;
mod keys;
mod memory;
pub mod providers;
mod stats;
mod tiered;
mod traits;

pub use codec::{Codec, Encoded};
pub use entry::{CacheEntry, StoredRecord};
pub use keys::{event_key, snapshot_key, SNAPSHOT_KEY_PRECISION};
pub use memory::MemoryTier;
pub use providers::{RedisTier, DEFAULT_REDIS_TIMEOUT};
pub use stats::CacheStats;
pub use tiered::{
    TieredCache, TieredCacheConfig, DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_L1_CAPACITY,
    DEFAULT_REDIS_URL, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL,
};
pub use traits::{BoxFuture, RemoteTier, TierError};
