//! Cache entries and their remote encoding.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codec::Encoded;
use super::traits::TierError;

/// A value held by the in-memory tier.
///
/// The value bytes, creation time and TTL are fixed at insertion. Access
/// bookkeeping is updated in place on every hit.
#[derive(Debug)]
pub struct CacheEntry {
    key: String,
    value: Vec<u8>,
    compressed: bool,
    created_at: DateTime<Utc>,
    ttl: Duration,
    access_count: AtomicU64,
    last_accessed_ms: AtomicI64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, encoded: Encoded, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value: encoded.bytes,
            compressed: encoded.compressed,
            created_at,
            ttl,
            access_count: AtomicU64::new(0),
            last_accessed_ms: AtomicI64::new(created_at.timestamp_millis()),
        }
    }

    /// Rebuilds an entry from a remote record, keeping its original expiry.
    pub fn from_record(key: impl Into<String>, record: StoredRecord) -> Self {
        let created_at = record.created_at();
        Self {
            key: key.into(),
            value: record.value,
            compressed: record.compressed,
            created_at,
            ttl: Duration::from_millis(record.ttl_ms),
            access_count: AtomicU64::new(0),
            last_accessed_ms: AtomicI64::new(created_at.timestamp_millis()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn size(&self) -> usize {
        self.value.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        expires_at(self.created_at, self.ttl)
    }

    /// True once `created_at + ttl` has been reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Records a hit.
    pub fn touch(&self, now: DateTime<Utc>) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
        self.last_accessed_ms
            .store(now.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_accessed_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Remote representation of this entry.
    pub fn to_record(&self) -> StoredRecord {
        StoredRecord {
            created_at_ms: self.created_at.timestamp_millis(),
            ttl_ms: self.ttl.as_millis().min(u64::MAX as u128) as u64,
            compressed: self.compressed,
            value: self.value.clone(),
        }
    }
}

fn expires_at(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| created_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Entry layout stored in the remote tier.
///
/// Carries its own creation time and TTL so readers can reject entries the
/// remote store has not purged yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub created_at_ms: i64,
    pub ttl_ms: u64,
    pub compressed: bool,
    pub value: Vec<u8>,
}

impl StoredRecord {
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.created_at_ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= expires_at(self.created_at(), Duration::from_millis(self.ttl_ms))
    }

    /// Time left before expiry, zero if already expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let expiry = expires_at(self.created_at(), Duration::from_millis(self.ttl_ms));
        (expiry - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TierError> {
        bincode::serialize(self).map_err(|e| TierError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TierError> {
        bincode::deserialize(bytes).map_err(|e| TierError::Codec(e.to_string()))
    }
}
