//! INI configuration file.
//!
//! ```ini
//! [cache]
//! l1_capacity = 1000
//! enable_l2 = false
//!
//! [collector]
//! poll_interval_secs = 30
//!
//! [location.west_lake]
//! lng = 120.1551
//! lat = 30.2741
//! radius_km = 3
//! ```
//!
//! Every key is optional and falls back to the built-in default. Location
//! sections require `lng` and `lat`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::AppConfig;
use crate::geo::GeoPoint;
use crate::model::{WatchedLocation, DEFAULT_LOCATION_RADIUS_KM};

/// Prefix of per-location section names.
pub const LOCATION_SECTION_PREFIX: &str = "location.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("malformed config: {0}")]
    Syntax(String),

    #[error("[{section}] {key} = '{value}': expected {expected}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("[{section}] is missing required key '{key}'")]
    MissingKey { section: String, key: &'static str },
}

/// A parsed configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    ini: Ini,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self { ini })
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Syntax(e.to_string()))?;
        Ok(Self { ini })
    }

    /// Loads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.ini.write_to_file(path).map_err(write_err)
    }

    /// Raw value lookup.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.ini.get_from(Some(section), key)
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Renders the file as INI text.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Builds the typed configuration, applying defaults for absent keys.
    pub fn to_app_config(&self) -> Result<AppConfig, ConfigError> {
        let mut app = AppConfig::default();

        let cache = &mut app.cache;
        self.read("cache", "enable_l1", &mut cache.enable_l1)?;
        self.read("cache", "l1_capacity", &mut cache.l1_capacity)?;
        self.read("cache", "enable_l2", &mut cache.enable_l2)?;
        self.read("cache", "redis_url", &mut cache.redis_url)?;
        self.read_secs("cache", "remote_timeout_secs", &mut cache.remote_timeout)?;
        self.read("cache", "compression", &mut cache.enable_compression)?;
        self.read("cache", "compression_threshold", &mut cache.compression_threshold)?;
        self.read_secs("cache", "default_ttl_secs", &mut cache.default_ttl)?;
        self.read_secs("cache", "sweep_interval_secs", &mut cache.sweep_interval)?;

        self.read("queue", "capacity", &mut app.queue_capacity)?;

        let detection = &mut app.detection;
        self.read("detection", "congestion_threshold", &mut detection.congestion_threshold)?;
        self.read(
            "detection",
            "high_congestion_threshold",
            &mut detection.high_congestion_threshold,
        )?;
        if let Some(list) = self.get("detection", "emergency_keywords") {
            detection.emergency_keywords = list
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }
        self.read("detection", "emergency_radius_km", &mut detection.emergency_radius_km)?;
        self.read_secs("detection", "incident_dedup_ttl_secs", &mut detection.incident_dedup_ttl)?;
        self.read("detection", "dedup_capacity", &mut detection.dedup_capacity)?;

        let collector = &mut app.collector;
        self.read_secs("collector", "poll_interval_secs", &mut collector.poll_interval)?;
        self.read_secs("collector", "source_timeout_secs", &mut collector.source_timeout)?;
        self.read_secs("collector", "error_backoff_secs", &mut collector.error_backoff)?;
        self.read("collector", "max_concurrent_locations", &mut collector.max_concurrent_locations)?;
        self.read("collector", "batch_size", &mut collector.batch_size)?;
        if let Some(ms) = self.value::<u64>("collector", "batch_timeout_ms", "milliseconds")? {
            collector.batch_timeout = Duration::from_millis(ms);
        }
        self.read_secs("collector", "snapshot_ttl_secs", &mut collector.snapshot_ttl)?;
        self.read_secs("collector", "event_ttl_secs", &mut collector.event_ttl)?;
        if let Some(hours) = self.value::<u64>("collector", "incident_max_age_hours", "hours")? {
            let secs = hours.checked_mul(3600).ok_or_else(|| ConfigError::InvalidValue {
                section: "collector".to_string(),
                key: "incident_max_age_hours".to_string(),
                value: hours.to_string(),
                expected: "hours",
            })?;
            collector.incident_max_age = Duration::from_secs(secs);
        }
        self.read("collector", "snapshot_domain", &mut collector.snapshot_domain)?;

        self.read("transport", "bind_address", &mut app.transport.bind_address)?;
        self.read("transport", "channel_capacity", &mut app.transport.channel_capacity)?;
        app.bus_url = self
            .get("transport", "bus_url")
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from);

        self.read("logging", "level", &mut app.logging.level)?;
        self.read("logging", "file_prefix", &mut app.logging.file_prefix)?;
        if let Some(dir) = self.get("logging", "directory").map(str::trim) {
            app.logging.directory = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }

        app.locations = self.locations()?;
        Ok(app)
    }

    /// Serializes `app` into a file that parses back to the same values.
    pub fn from_app_config(app: &AppConfig) -> Self {
        let mut ini = Ini::new();
        let c = &app.cache;
        ini.with_section(Some("cache"))
            .set("enable_l1", c.enable_l1.to_string())
            .set("l1_capacity", c.l1_capacity.to_string())
            .set("enable_l2", c.enable_l2.to_string())
            .set("redis_url", c.redis_url.clone())
            .set("remote_timeout_secs", c.remote_timeout.as_secs().to_string())
            .set("compression", c.enable_compression.to_string())
            .set("compression_threshold", c.compression_threshold.to_string())
            .set("default_ttl_secs", c.default_ttl.as_secs().to_string())
            .set("sweep_interval_secs", c.sweep_interval.as_secs().to_string());

        ini.with_section(Some("queue"))
            .set("capacity", app.queue_capacity.to_string());

        let d = &app.detection;
        ini.with_section(Some("detection"))
            .set("congestion_threshold", d.congestion_threshold.to_string())
            .set("high_congestion_threshold", d.high_congestion_threshold.to_string())
            .set("emergency_keywords", d.emergency_keywords.join(","))
            .set("emergency_radius_km", d.emergency_radius_km.to_string())
            .set("incident_dedup_ttl_secs", d.incident_dedup_ttl.as_secs().to_string())
            .set("dedup_capacity", d.dedup_capacity.to_string());

        let o = &app.collector;
        ini.with_section(Some("collector"))
            .set("poll_interval_secs", o.poll_interval.as_secs().to_string())
            .set("source_timeout_secs", o.source_timeout.as_secs().to_string())
            .set("error_backoff_secs", o.error_backoff.as_secs().to_string())
            .set("max_concurrent_locations", o.max_concurrent_locations.to_string())
            .set("batch_size", o.batch_size.to_string())
            .set("batch_timeout_ms", o.batch_timeout.as_millis().to_string())
            .set("snapshot_ttl_secs", o.snapshot_ttl.as_secs().to_string())
            .set("event_ttl_secs", o.event_ttl.as_secs().to_string())
            .set("incident_max_age_hours", (o.incident_max_age.as_secs() / 3600).to_string())
            .set("snapshot_domain", o.snapshot_domain.clone());

        ini.with_section(Some("transport"))
            .set("bind_address", app.transport.bind_address.clone())
            .set("channel_capacity", app.transport.channel_capacity.to_string())
            .set("bus_url", app.bus_url.clone().unwrap_or_default());

        let l = &app.logging;
        ini.with_section(Some("logging"))
            .set("level", l.level.clone())
            .set(
                "directory",
                l.directory
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
            )
            .set("file_prefix", l.file_prefix.clone());

        for location in &app.locations {
            ini.with_section(Some(format!("{}{}", LOCATION_SECTION_PREFIX, location.name)))
                .set("lng", location.center.lng.to_string())
                .set("lat", location.center.lat.to_string())
                .set("radius_km", location.radius_km.to_string());
        }

        Self { ini }
    }

    fn locations(&self) -> Result<Vec<WatchedLocation>, ConfigError> {
        let mut locations = Vec::new();
        for section in self.ini.sections().flatten() {
            let Some(name) = section.strip_prefix(LOCATION_SECTION_PREFIX) else {
                continue;
            };
            let required = |key: &'static str| -> Result<f64, ConfigError> {
                self.value::<f64>(section, key, "a number")?
                    .ok_or_else(|| ConfigError::MissingKey {
                        section: section.to_string(),
                        key,
                    })
            };
            let center = GeoPoint::new(required("lng")?, required("lat")?);
            let radius = self
                .value::<f64>(section, "radius_km", "a number")?
                .unwrap_or(DEFAULT_LOCATION_RADIUS_KM);
            locations.push(WatchedLocation::new(name, center, radius));
        }
        Ok(locations)
    }

    fn value<T: FromStr>(
        &self,
        section: &str,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(raw) = self.get(section, key) else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            expected,
        })
    }

    fn read<T: FromStr + ConfigValue>(&self, section: &str, key: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.value(section, key, T::EXPECTED)? {
            *target = value;
        }
        Ok(())
    }

    fn read_secs(&self, section: &str, key: &str, target: &mut Duration) -> Result<(), ConfigError> {
        if let Some(secs) = self.value::<u64>(section, key, "whole seconds")? {
            *target = Duration::from_secs(secs);
        }
        Ok(())
    }
}

/// Human description of a value type, used in parse errors.
trait ConfigValue {
    const EXPECTED: &'static str;
}

impl ConfigValue for bool {
    const EXPECTED: &'static str = "true or false";
}

impl ConfigValue for u64 {
    const EXPECTED: &'static str = "a non-negative integer";
}

impl ConfigValue for usize {
    const EXPECTED: &'static str = "a non-negative integer";
}

impl ConfigValue for f64 {
    const EXPECTED: &'static str = "a number";
}

impl ConfigValue for String {
    const EXPECTED: &'static str = "text";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let app = ConfigFile::parse("").unwrap().to_app_config().unwrap();
        assert_eq!(app.queue_capacity, crate::events::DEFAULT_QUEUE_CAPACITY);
        assert_eq!(app.cache.l1_capacity, 1000);
        assert_eq!(app.collector.poll_interval, Duration::from_secs(30));
        assert!(app.locations.is_empty());
        assert!(app.bus_url.is_none());
    }

    #[test]
    fn test_overrides_and_locations() {
        let text = "\
[cache]
enable_l2 = false
l1_capacity = 50

[detection]
congestion_threshold = 0.6
emergency_keywords = fire, flood

[collector]
poll_interval_secs = 10
batch_timeout_ms = 250

[location.west_lake]
lng = 120.1551
lat = 30.2741

[location.airport]
lng = 120.43
lat = 30.23
radius_km = 8
";
        let app = ConfigFile::parse(text).unwrap().to_app_config().unwrap();
        assert!(!app.cache.enable_l2);
        assert_eq!(app.cache.l1_capacity, 50);
        assert_eq!(app.detection.congestion_threshold, 0.6);
        assert_eq!(app.detection.emergency_keywords, vec!["fire", "flood"]);
        assert_eq!(app.collector.poll_interval, Duration::from_secs(10));
        assert_eq!(app.collector.batch_timeout, Duration::from_millis(250));

        assert_eq!(app.locations.len(), 2);
        let west_lake = app.locations.iter().find(|l| l.name == "west_lake").unwrap();
        assert_eq!(west_lake.radius_km, DEFAULT_LOCATION_RADIUS_KM);
        let airport = app.locations.iter().find(|l| l.name == "airport").unwrap();
        assert_eq!(airport.radius_km, 8.0);
    }

    #[test]
    fn test_invalid_value_names_section_and_key() {
        let err = ConfigFile::parse("[queue]\ncapacity = lots\n")
            .unwrap()
            .to_app_config()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("[queue]"), "{}", message);
        assert!(message.contains("capacity"), "{}", message);
    }

    #[test]
    fn test_incident_max_age_overflow_is_rejected() {
        let err = ConfigFile::parse("[collector]\nincident_max_age_hours = 18446744073709551615\n")
            .unwrap()
            .to_app_config()
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "incident_max_age_hours"),
            "{}",
            err
        );

        let app = ConfigFile::parse("[collector]\nincident_max_age_hours = 48\n")
            .unwrap()
            .to_app_config()
            .unwrap();
        assert_eq!(app.collector.incident_max_age, Duration::from_secs(48 * 3600));
    }

    #[test]
    fn test_location_requires_coordinates() {
        let err = ConfigFile::parse("[location.nowhere]\nlng = 1.0\n")
            .unwrap()
            .to_app_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "lat", .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let app = AppConfig::default()
            .with_location(WatchedLocation::new("center", GeoPoint::new(120.0, 30.0), 2.5))
            .with_queue_capacity(42);
        ConfigFile::from_app_config(&app).save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap().to_app_config().unwrap();
        assert_eq!(loaded.queue_capacity, 42);
        assert_eq!(loaded.locations, app.locations);
        assert_eq!(loaded.detection.emergency_keywords, app.detection.emergency_keywords);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_or_default(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config.get("queue", "capacity"), Some("10000"));
    }
}
