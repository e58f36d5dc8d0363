//! Collector configuration.

use std::time::Duration;

/// Time between monitoring cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Ceiling for a single source call.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shorter pause used after a cycle in which every source failed.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Locations checked at the same time.
pub const DEFAULT_MAX_CONCURRENT_LOCATIONS: usize = 4;

/// Events the consumer publishes per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Longest wait for a batch to fill.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(1);

/// TTL of cached per-location snapshots.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(300);

/// TTL of cached processed events.
pub const DEFAULT_EVENT_TTL: Duration = Duration::from_secs(3600);

/// Incidents reported earlier than this are ignored.
pub const DEFAULT_INCIDENT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Key domain for cached snapshots.
pub const DEFAULT_SNAPSHOT_DOMAIN: &str = "snapshot";

/// Collector loop configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub poll_interval: Duration,
    pub source_timeout: Duration,
    pub error_backoff: Duration,
    pub max_concurrent_locations: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub snapshot_ttl: Duration,
    pub event_ttl: Duration,
    pub incident_max_age: Duration,
    pub snapshot_domain: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            max_concurrent_locations: DEFAULT_MAX_CONCURRENT_LOCATIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            event_ttl: DEFAULT_EVENT_TTL,
            incident_max_age: DEFAULT_INCIDENT_MAX_AGE,
            snapshot_domain: DEFAULT_SNAPSHOT_DOMAIN.to_string(),
        }
    }
}

impl CollectorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn with_batch(mut self, size: usize, timeout: Duration) -> Self {
        self.batch_size = size;
        self.batch_timeout = timeout;
        self
    }
}
