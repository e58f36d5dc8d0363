//! Redis-backed remote tier.
//!
//! Uses a [`ConnectionManager`], which reconnects transparently after a
//! dropped connection. Each operation is bounded by a timeout; timeouts and
//! connection failures are reported as [`TierError::Unavailable`].

use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use tracing::info;

use crate::cache::traits::{BoxFuture, RemoteTier, TierError};

/// Default per-operation timeout.
pub const DEFAULT_REDIS_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote tier on a Redis server.
#[derive(Clone)]
pub struct RedisTier {
    manager: ConnectionManager,
    timeout: Duration,
}

impl RedisTier {
    /// Connects to `url` (for example `redis://localhost:6379`).
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, TierError> {
        let client = redis::Client::open(url).map_err(classify)?;
        let manager = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| TierError::Unavailable(format!("connect to {} timed out", url)))?
            .map_err(classify)?;

        info!(url = %url, "Connected to redis cache tier");
        Ok(Self { manager, timeout })
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, TierError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| TierError::Unavailable("redis operation timed out".to_string()))?
            .map_err(classify)
    }
}

/// Maps redis errors onto the tier taxonomy.
pub(crate) fn classify(err: RedisError) -> TierError {
    if err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_io_error()
        || err.is_timeout()
    {
        TierError::Unavailable(err.to_string())
    } else {
        TierError::Backend(err.to_string())
    }
}

impl RemoteTier for RedisTier {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, TierError>> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            self.bounded(async move {
                let value: Option<Vec<u8>> = conn.get(key).await?;
                Ok::<_, RedisError>(value)
            })
            .await
        })
    }

    fn set_with_ttl<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), TierError>> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            // EX takes whole seconds; never round down to zero.
            let seconds = ttl.as_secs().max(1);
            self.bounded(async move {
                let _: () = conn.set_ex(key, value, seconds).await?;
                Ok::<_, RedisError>(())
            })
            .await
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, TierError>> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let removed = self
                .bounded(async move {
                    let removed: u64 = conn.del(key).await?;
                    Ok::<_, RedisError>(removed)
                })
                .await?;
            Ok(removed > 0)
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), TierError>> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            self.bounded(async move {
                let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
                Ok::<_, RedisError>(())
            })
            .await
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), TierError>> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            self.bounded(async move {
                let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok::<_, RedisError>(())
            })
            .await
        })
    }
}
