//! Point-in-time traffic readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Road segment counts by traffic state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadCounts {
    pub total: u32,
    pub congested: u32,
    pub slow: u32,
    pub clear: u32,
}

/// A single traffic-condition reading for a location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrafficObservation {
    /// Name of the source that produced this reading.
    pub source: String,
    pub location: GeoPoint,
    pub radius_km: f64,
    pub roads: RoadCounts,
    /// Average speed in km/h, when the source reports one.
    #[serde(default)]
    pub avg_speed_kmh: Option<f64>,
    /// Share of congested roads, nominally in `[0, 1]`.
    pub congestion_ratio: f64,
    /// Raw payload as returned by the source.
    #[serde(default)]
    pub raw_payload: Option<serde_json::Value>,
    pub collected_at: DateTime<Utc>,
}

impl TrafficObservation {
    /// True when the raw source payload is present and not `null`.
    pub fn has_raw_payload(&self) -> bool {
        matches!(&self.raw_payload, Some(v) if !v.is_null())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A clean observation collected at `at` with the given congestion ratio.
    pub fn observation(ratio: f64, at: DateTime<Utc>) -> TrafficObservation {
        TrafficObservation {
            source: "amap".to_string(),
            location: GeoPoint::new(120.1551, 30.2741),
            radius_km: 3.0,
            roads: RoadCounts {
                total: 40,
                congested: (40.0 * ratio) as u32,
                slow: 4,
                clear: 20,
            },
            avg_speed_kmh: Some(32.0),
            congestion_ratio: ratio,
            raw_payload: Some(serde_json::json!({"status": "1"})),
            collected_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_payload_null_is_absent() {
        let mut obs = fixtures::observation(0.2, Utc::now());
        assert!(obs.has_raw_payload());
        obs.raw_payload = Some(serde_json::Value::Null);
        assert!(!obs.has_raw_payload());
        obs.raw_payload = None;
        assert!(!obs.has_raw_payload());
    }

    #[test]
    fn test_observation_deserializes_with_optional_fields_missing() {
        let json = r#"{
            "source": "amap",
            "location": {"lng": 120.1, "lat": 30.2},
            "radius_km": 3.0,
            "roads": {"total": 10, "congested": 2, "slow": 3, "clear": 5},
            "congestion_ratio": 0.2,
            "collected_at": "2026-01-01T08:00:00Z"
        }"#;
        let obs: TrafficObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.avg_speed_kmh, None);
        assert_eq!(obs.roads.total, 10);
    }
}
