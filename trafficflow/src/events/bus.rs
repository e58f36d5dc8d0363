//! External pub/sub bus.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::info;

use crate::cache::BoxFuture;

/// Errors publishing to the bus.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    #[error("event bus publish failed: {0}")]
    Publish(String),
}

/// Publishes serialized events to named channels.
pub trait EventBus: Send + Sync {
    fn publish<'a>(&'a self, channel: &'a str, payload: &'a str) -> BoxFuture<'a, Result<(), BusError>>;
}

/// Redis `PUBLISH` bus.
#[derive(Clone)]
pub struct RedisEventBus {
    manager: ConnectionManager,
    timeout: Duration,
}

impl RedisEventBus {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(|e| BusError::Unavailable(e.to_string()))?;
        let manager = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| BusError::Unavailable(format!("connect to {} timed out", url)))?
            .map_err(|e| BusError::Unavailable(e.to_string()))?;
        info!(url = %url, "Connected to redis event bus");
        Ok(Self { manager, timeout })
    }
}

impl EventBus for RedisEventBus {
    fn publish<'a>(&'a self, channel: &'a str, payload: &'a str) -> BoxFuture<'a, Result<(), BusError>> {
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let published: redis::RedisResult<i64> =
                tokio::time::timeout(self.timeout, conn.publish(channel, payload))
                    .await
                    .map_err(|_| BusError::Unavailable("publish timed out".to_string()))?;
            let receivers = published.map_err(|e| BusError::Publish(e.to_string()))?;
            tracing::trace!(channel = %channel, receivers, "Published to bus");
            Ok(())
        })
    }
}
