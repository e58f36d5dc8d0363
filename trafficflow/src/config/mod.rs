//! Application configuration.
//!
//! [`AppConfig`] gathers the typed settings of every component. It is
//! normally built from a [`ConfigFile`] at [`default_config_path`].

mod file;

pub use file::{ConfigError, ConfigFile, LOCATION_SECTION_PREFIX};

use std::path::PathBuf;

use crate::cache::TieredCacheConfig;
use crate::detection::DetectionConfig;
use crate::events::DEFAULT_QUEUE_CAPACITY;
use crate::logging::LoggingConfig;
use crate::model::WatchedLocation;
use crate::orchestrator::CollectorConfig;
use crate::transport::TransportConfig;

/// Directory name under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "trafficflow";
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// `<config dir>/trafficflow/config.ini`, or a relative `config.ini` when the
/// platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache: TieredCacheConfig,
    pub queue_capacity: usize,
    pub detection: DetectionConfig,
    pub collector: CollectorConfig,
    pub transport: TransportConfig,
    /// Redis URL for the pub/sub event bus. No bus when unset.
    pub bus_url: Option<String>,
    pub logging: LoggingConfig,
    pub locations: Vec<WatchedLocation>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache: TieredCacheConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            detection: DetectionConfig::default(),
            collector: CollectorConfig::default(),
            transport: TransportConfig::default(),
            bus_url: None,
            logging: LoggingConfig::default(),
            locations: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn with_cache(mut self, cache: TieredCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_collector(mut self, collector: CollectorConfig) -> Self {
        self.collector = collector;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_bus_url(mut self, url: impl Into<String>) -> Self {
        self.bus_url = Some(url.into());
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_location(mut self, location: WatchedLocation) -> Self {
        self.locations.push(location);
        self
    }
}
