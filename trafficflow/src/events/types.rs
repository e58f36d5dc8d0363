//! Event types, priorities and payloads.
//!
//! Each [`EventType`] has exactly one [`EventPayload`] variant with its own
//! schema, so detection and consumption code match exhaustively instead of
//! digging through a free-form map.
//!
//! Names are written in the short form (`congestion`, `critical`). Older
//! producers used longer names and numeric priorities, which are still
//! accepted on input:
//!
//! | written        | also read            |
//! |----------------|----------------------|
//! | `congestion`   | `traffic_congestion` |
//! | `accident`     | `accident_detected`  |
//! | `emergency`    | `emergency_vehicle`  |
//! | `weather`      | `weather_alert`      |
//! | `system`       | `system_alert`       |
//! | `custom`       | `custom_event`       |
//! | `critical`     | `1`                  |
//! | `high`         | `2`                  |
//! | `medium`       | `3`                  |
//! | `low`          | `4`                  |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::model::Severity;

/// Default radius for events that do not name one.
pub const DEFAULT_EVENT_RADIUS_KM: f64 = 3.0;

/// Source label for manually created events.
pub const MANUAL_SOURCE: &str = "manual";

/// Prefix of the pub/sub channel for each event type.
pub const CHANNEL_PREFIX: &str = "traffic_events";

// =============================================================================
// Event Type
// =============================================================================

/// Kind of traffic event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[serde(alias = "traffic_congestion")]
    Congestion,
    #[serde(alias = "accident_detected")]
    Accident,
    #[serde(alias = "emergency_vehicle")]
    Emergency,
    RoadClosure,
    #[serde(alias = "weather_alert")]
    Weather,
    #[serde(alias = "system_alert")]
    System,
    DataUpdate,
    #[serde(alias = "custom_event")]
    Custom,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::Congestion,
        EventType::Accident,
        EventType::Emergency,
        EventType::RoadClosure,
        EventType::Weather,
        EventType::System,
        EventType::DataUpdate,
        EventType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Congestion => "congestion",
            EventType::Accident => "accident",
            EventType::Emergency => "emergency",
            EventType::RoadClosure => "road_closure",
            EventType::Weather => "weather",
            EventType::System => "system",
            EventType::DataUpdate => "data_update",
            EventType::Custom => "custom",
        }
    }

    /// Long name accepted on input.
    pub fn legacy_name(self) -> Option<&'static str> {
        match self {
            EventType::Congestion => Some("traffic_congestion"),
            EventType::Accident => Some("accident_detected"),
            EventType::Emergency => Some("emergency_vehicle"),
            EventType::Weather => Some("weather_alert"),
            EventType::System => Some("system_alert"),
            EventType::Custom => Some("custom_event"),
            EventType::RoadClosure | EventType::DataUpdate => None,
        }
    }

    /// Pub/sub channel for this type: `traffic_events:{type}`.
    pub fn channel(self) -> String {
        format!("{}:{}", CHANNEL_PREFIX, self.as_str())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.legacy_name() == Some(s))
            .ok_or_else(|| format!("unknown event type '{}'", s))
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Dispatch priority. `Critical` is served first.
///
/// Reads either the name or the rank as a number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "PriorityRepr")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Critical, Priority::High, Priority::Medium, Priority::Low];

    /// Queue rank: 1 for critical through 4 for low. Lower ranks are served first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 1,
            Priority::High => 2,
            Priority::Medium => 3,
            Priority::Low => 4,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Priority::ALL.into_iter().find(|p| p.rank() == rank)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .or_else(|| s.parse().ok().and_then(Priority::from_rank))
            .ok_or_else(|| format!("unknown priority '{}'", s))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Rank(u8),
    Name(String),
}

impl TryFrom<PriorityRepr> for Priority {
    type Error = String;

    fn try_from(repr: PriorityRepr) -> Result<Self, Self::Error> {
        match repr {
            PriorityRepr::Rank(rank) => {
                Priority::from_rank(rank).ok_or_else(|| format!("priority rank {} is outside 1-4", rank))
            }
            PriorityRepr::Name(name) => name.parse(),
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Type-specific event data.
///
/// Serializes adjacently tagged, which flattens into the event as
/// `"type": ..., "data": {...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    #[serde(alias = "traffic_congestion")]
    Congestion {
        congestion_ratio: f64,
        avg_speed_kmh: Option<f64>,
        total_roads: u32,
    },
    #[serde(alias = "accident_detected")]
    Accident {
        incident_id: String,
        severity: Severity,
        location: String,
        source: String,
    },
    #[serde(alias = "emergency_vehicle")]
    Emergency {
        keyword: String,
        incident_id: String,
    },
    RoadClosure {
        road: String,
        reason: String,
    },
    #[serde(alias = "weather_alert")]
    Weather {
        condition: String,
        severity: Severity,
    },
    #[serde(alias = "system_alert")]
    System {
        component: String,
        message: String,
    },
    DataUpdate {
        sources: Vec<String>,
        quality_score: f64,
    },
    #[serde(alias = "custom_event")]
    Custom(serde_json::Map<String, serde_json::Value>),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Congestion { .. } => EventType::Congestion,
            EventPayload::Accident { .. } => EventType::Accident,
            EventPayload::Emergency { .. } => EventType::Emergency,
            EventPayload::RoadClosure { .. } => EventType::RoadClosure,
            EventPayload::Weather { .. } => EventType::Weather,
            EventPayload::System { .. } => EventType::System,
            EventPayload::DataUpdate { .. } => EventType::DataUpdate,
            EventPayload::Custom(_) => EventType::Custom,
        }
    }
}

// =============================================================================
// Event
// =============================================================================

/// Where an event applies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventLocation {
    pub lng: f64,
    pub lat: f64,
    pub radius_km: f64,
}

impl EventLocation {
    pub fn new(point: GeoPoint, radius_km: f64) -> Self {
        Self {
            lng: point.lng,
            lat: point.lat,
            radius_km,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lng, self.lat)
    }
}

/// A prioritized, typed notification.
///
/// Only `processed` and `processing_latency_ms` change after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub location: EventLocation,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(default)]
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_latency_ms: Option<u64>,
}

impl Event {
    /// Creates an event with a fresh id.
    pub fn new(
        priority: Priority,
        title: impl Into<String>,
        description: impl Into<String>,
        location: EventLocation,
        source: impl Into<String>,
        payload: EventPayload,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            priority,
            title: title.into(),
            description: description.into(),
            location,
            timestamp,
            source: source.into(),
            payload,
            processed: false,
            processing_latency_ms: None,
        }
    }

    /// A manually created event carrying arbitrary data.
    ///
    /// Defaults to medium priority and the `manual` source.
    pub fn custom(
        title: impl Into<String>,
        description: impl Into<String>,
        location: EventLocation,
        data: serde_json::Map<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Priority::Medium,
            title,
            description,
            location,
            MANUAL_SOURCE,
            EventPayload::Custom(data),
            timestamp,
        )
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Pub/sub channel this event is published on.
    pub fn channel(&self) -> String {
        self.event_type().channel()
    }

    /// Marks the event processed and records time since creation.
    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.processed = true;
        self.processing_latency_ms = Some((now - self.timestamp).num_milliseconds().max(0) as u64);
    }

    /// Canonical JSON encoding.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn congestion_event() -> Event {
        Event::new(
            Priority::High,
            "Heavy congestion",
            "ratio 0.93",
            EventLocation::new(GeoPoint::new(120.15, 30.27), 3.0),
            "auto_detection",
            EventPayload::Congestion {
                congestion_ratio: 0.93,
                avg_speed_kmh: Some(12.0),
                total_roads: 40,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_priority_rank_order() {
        let ranks: Vec<u8> = Priority::ALL.iter().map(|p| p.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_channel_naming() {
        assert_eq!(EventType::RoadClosure.channel(), "traffic_events:road_closure");
        assert_eq!(congestion_event().channel(), "traffic_events:congestion");
    }

    #[test]
    fn test_canonical_json_shape() {
        let event = congestion_event();
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "congestion");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["data"]["total_roads"], 40);
        assert_eq!(value["location"]["radius_km"], 3.0);
        assert_eq!(value["source"], "auto_detection");
        assert!(value.get("processing_latency_ms").is_none());
    }

    #[test]
    fn test_json_round_trip_with_custom_payload() {
        let mut data = serde_json::Map::new();
        data.insert("note".into(), serde_json::json!("manual check"));
        let event = Event::custom(
            "Marathon",
            "roads closed",
            EventLocation::new(GeoPoint::new(1.0, 2.0), DEFAULT_EVENT_RADIUS_KM),
            data,
            Utc::now(),
        );
        let back: Event = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.event_type(), EventType::Custom);
        assert_eq!(back.priority, Priority::Medium);
        assert_eq!(back.source, MANUAL_SOURCE);
    }

    #[test]
    fn test_mark_processed_records_latency() {
        let mut event = congestion_event();
        let later = event.timestamp + chrono::Duration::milliseconds(250);
        event.mark_processed(later);
        assert!(event.processed);
        assert_eq!(event.processing_latency_ms, Some(250));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("data_update".parse::<EventType>(), Ok(EventType::DataUpdate));
        assert!("bogus".parse::<EventType>().is_err());
        assert_eq!("low".parse::<Priority>(), Ok(Priority::Low));
    }

    #[test]
    fn test_legacy_names_and_numeric_priorities_are_read() {
        let types: Vec<EventType> =
            serde_json::from_str(r#"["traffic_congestion", "accident_detected", "custom_event", "road_closure"]"#)
                .unwrap();
        assert_eq!(
            types,
            vec![EventType::Congestion, EventType::Accident, EventType::Custom, EventType::RoadClosure]
        );
        assert_eq!("weather_alert".parse::<EventType>(), Ok(EventType::Weather));

        let priorities: Vec<Priority> = serde_json::from_str(r#"[1, "high", 3, "4"]"#).unwrap();
        assert_eq!(priorities, vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]);
        assert!(serde_json::from_str::<Priority>("5").is_err());
        assert!(serde_json::from_str::<Priority>(r#""urgent""#).is_err());

        // Output keeps the short names.
        assert_eq!(serde_json::to_string(&Priority::Critical).unwrap(), r#""critical""#);
    }

    #[test]
    fn test_legacy_event_json_is_read() {
        let json = r#"{
            "id": "e1",
            "priority": 2,
            "title": "Jam",
            "description": "slow",
            "location": {"lng": 120.1, "lat": 30.2, "radius_km": 3.0},
            "timestamp": "2024-05-01T08:00:00Z",
            "source": "legacy",
            "type": "traffic_congestion",
            "data": {"congestion_ratio": 0.9, "avg_speed_kmh": null, "total_roads": 12}
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.priority, Priority::High);
        assert_eq!(event.event_type(), EventType::Congestion);

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "congestion");
        assert_eq!(value["priority"], "high");
    }
}
