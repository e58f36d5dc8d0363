//! Remote tier abstraction.
//!
//! The L2 tier is behind a trait so the tiered cache can run against Redis in
//! production and an in-process fake in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from a cache tier.
#[derive(Debug, Error)]
pub enum TierError {
    /// The tier could not be reached. The tiered cache stops using it.
    #[error("cache tier unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("cache codec error: {0}")]
    Codec(String),

    /// The backend rejected an operation.
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl TierError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TierError::Unavailable(_))
    }
}

/// Shared key/value store used as the L2 tier.
///
/// Values are opaque bytes. Implementations should apply the TTL natively
/// where the backend supports it; the tiered cache also checks expiry on read.
pub trait RemoteTier: Send + Sync {
    /// Fetches the raw bytes stored under `key`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, TierError>>;

    /// Stores `value` under `key`, expiring after `ttl`.
    fn set_with_ttl<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), TierError>>;

    /// Removes `key`. Returns whether it existed.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, TierError>>;

    /// Removes every key.
    fn clear(&self) -> BoxFuture<'_, Result<(), TierError>>;

    /// Checks that the tier is reachable.
    fn ping(&self) -> BoxFuture<'_, Result<(), TierError>>;
}
