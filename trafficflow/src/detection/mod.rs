//! Rule-based event detection.
//!
//! [`DetectionEngine`] turns a fused snapshot into zero or more events. Three
//! rules run independently:
//!
//! - **Congestion**: the best observation's ratio is at or above the threshold.
//! - **Accident**: an incident not emitted within the dedup window.
//! - **Emergency**: an incident whose text contains an emergency keyword.

mod engine;

pub use engine::{
    DetectionConfig, DetectionEngine, ACCIDENT_SOURCE, CONGESTION_SOURCE, DEFAULT_CONGESTION_THRESHOLD,
    DEFAULT_EMERGENCY_KEYWORDS, DEFAULT_EMERGENCY_RADIUS_KM, DEFAULT_HIGH_CONGESTION_THRESHOLD,
    DEFAULT_INCIDENT_DEDUP_TTL, EMERGENCY_SOURCE,
};
