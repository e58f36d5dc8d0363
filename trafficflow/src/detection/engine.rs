//! Detection rules.

use std::time::Duration;

use tracing::debug;

use crate::clock::SharedClock;
use crate::events::{Event, EventLocation, EventPayload, Priority};
use crate::model::{FusedSnapshot, IncidentReport, RecentSet, WatchedLocation, DEFAULT_RECENT_CAPACITY};

/// Ratio at which congestion becomes an event.
pub const DEFAULT_CONGESTION_THRESHOLD: f64 = 0.7;

/// Ratio at which a congestion event is high priority.
pub const DEFAULT_HIGH_CONGESTION_THRESHOLD: f64 = 0.9;

/// How long an incident is remembered after it was emitted.
pub const DEFAULT_INCIDENT_DEDUP_TTL: Duration = Duration::from_secs(30 * 60);

/// Radius given to emergency events.
pub const DEFAULT_EMERGENCY_RADIUS_KM: f64 = 5.0;

/// Default emergency keywords, matched case-insensitively.
pub const DEFAULT_EMERGENCY_KEYWORDS: &[&str] = &[
    "fire",
    "explosion",
    "casualties",
    "fatal",
    "emergency",
    "火灾",
    "爆炸",
    "伤亡",
    "紧急",
];

pub const CONGESTION_SOURCE: &str = "auto_detection";
pub const ACCIDENT_SOURCE: &str = "incident_detection";
pub const EMERGENCY_SOURCE: &str = "keyword_detection";

/// Detection thresholds and keyword list.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub congestion_threshold: f64,
    pub high_congestion_threshold: f64,
    pub emergency_keywords: Vec<String>,
    pub emergency_radius_km: f64,
    pub incident_dedup_ttl: Duration,
    pub dedup_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            congestion_threshold: DEFAULT_CONGESTION_THRESHOLD,
            high_congestion_threshold: DEFAULT_HIGH_CONGESTION_THRESHOLD,
            emergency_keywords: DEFAULT_EMERGENCY_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            emergency_radius_km: DEFAULT_EMERGENCY_RADIUS_KM,
            incident_dedup_ttl: DEFAULT_INCIDENT_DEDUP_TTL,
            dedup_capacity: DEFAULT_RECENT_CAPACITY,
        }
    }
}

impl DetectionConfig {
    pub fn with_congestion_threshold(mut self, threshold: f64) -> Self {
        self.congestion_threshold = threshold;
        self
    }

    pub fn with_emergency_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emergency_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// Applies the detection rules to snapshots.
pub struct DetectionEngine {
    config: DetectionConfig,
    // Lowercased once; matching is case-insensitive.
    keywords: Vec<(String, String)>,
    emitted_accidents: RecentSet,
    emitted_emergencies: RecentSet,
    clock: SharedClock,
}

impl DetectionEngine {
    pub fn new(config: DetectionConfig, clock: SharedClock) -> Self {
        let keywords = config
            .emergency_keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| (k.clone(), k.to_lowercase()))
            .collect();
        let recent = || RecentSet::new(config.dedup_capacity, config.incident_dedup_ttl, clock.clone());

        Self {
            emitted_accidents: recent(),
            emitted_emergencies: recent(),
            keywords,
            clock: clock.clone(),
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Runs every rule against `snapshot` for `location`.
    pub fn detect(&self, location: &WatchedLocation, snapshot: &FusedSnapshot) -> Vec<Event> {
        let mut events = Vec::new();

        if let Some(event) = self.congestion_rule(location, snapshot) {
            events.push(event);
        }
        for incident in &snapshot.incidents {
            if let Some(event) = self.accident_rule(location, incident) {
                events.push(event);
            }
            if let Some(event) = self.emergency_rule(location, incident) {
                events.push(event);
            }
        }

        if !events.is_empty() {
            debug!(location = %location.name, events = events.len(), "Detected events");
        }
        events
    }

    fn congestion_rule(&self, location: &WatchedLocation, snapshot: &FusedSnapshot) -> Option<Event> {
        let observation = snapshot.best_observation.as_ref()?;
        let ratio = observation.congestion_ratio;
        if ratio < self.config.congestion_threshold {
            return None;
        }

        let priority = if ratio >= self.config.high_congestion_threshold {
            Priority::High
        } else {
            Priority::Medium
        };
        let speed = observation
            .avg_speed_kmh
            .map(|s| format!("{:.1} km/h", s))
            .unwrap_or_else(|| "unknown".to_string());

        Some(Event::new(
            priority,
            format!("Traffic congestion at {}", location.name),
            format!("Congestion ratio {:.0}%, average speed {}", ratio * 100.0, speed),
            EventLocation::new(location.center, location.radius_km),
            CONGESTION_SOURCE,
            EventPayload::Congestion {
                congestion_ratio: ratio,
                avg_speed_kmh: observation.avg_speed_kmh,
                total_roads: observation.roads.total,
            },
            self.clock.now(),
        ))
    }

    fn accident_rule(&self, location: &WatchedLocation, incident: &IncidentReport) -> Option<Event> {
        if !self.first_sighting(&self.emitted_accidents, incident) {
            return None;
        }

        let priority = if incident.severity.is_serious() {
            Priority::Critical
        } else {
            Priority::High
        };

        Some(Event::new(
            priority,
            incident.title.clone(),
            incident.description.clone(),
            EventLocation::new(incident.coordinates.unwrap_or(location.center), location.radius_km),
            ACCIDENT_SOURCE,
            EventPayload::Accident {
                incident_id: incident.id.clone(),
                severity: incident.severity,
                location: incident.location_text.clone(),
                source: incident.source.clone(),
            },
            self.clock.now(),
        ))
    }

    fn emergency_rule(&self, location: &WatchedLocation, incident: &IncidentReport) -> Option<Event> {
        let text = format!("{} {}", incident.title, incident.description).to_lowercase();
        let (keyword, _) = self.keywords.iter().find(|(_, lower)| text.contains(lower.as_str()))?;

        if !self.first_sighting(&self.emitted_emergencies, incident) {
            return None;
        }

        Some(Event::new(
            Priority::Critical,
            format!("Emergency: {}", incident.title),
            format!("Matched emergency keyword '{}' near {}", keyword, incident.location_text),
            EventLocation::new(
                incident.coordinates.unwrap_or(location.center),
                self.config.emergency_radius_km,
            ),
            EMERGENCY_SOURCE,
            EventPayload::Emergency {
                keyword: keyword.clone(),
                incident_id: incident.id.clone(),
            },
            self.clock.now(),
        ))
    }

    // True when neither the id nor the content hash was emitted recently.
    fn first_sighting(&self, seen: &RecentSet, incident: &IncidentReport) -> bool {
        let hash_seen = !incident.dedup_hash.is_empty() && seen.contains(&incident.dedup_hash);
        if seen.contains(&incident.id) || hash_seen {
            return false;
        }
        seen.insert(&incident.id);
        if !incident.dedup_hash.is_empty() {
            seen.insert(&incident.dedup_hash);
        }
        true
    }
}
