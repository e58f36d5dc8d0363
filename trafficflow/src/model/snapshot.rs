//! Fused per-location view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IncidentReport, TrafficObservation};

/// Merged, quality-scored view of one location at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusedSnapshot {
    /// Highest-quality observation, if any source returned one.
    pub best_observation: Option<TrafficObservation>,
    /// Quality score of `best_observation`, `0.0` when absent.
    pub observation_quality: f64,
    pub incidents: Vec<IncidentReport>,
    /// Contributing source names, observation source first.
    pub sources: Vec<String>,
    /// Overall quality in `[0, 1]`.
    pub quality_score: f64,
    /// Completeness in `[0, 1]`.
    pub completeness_score: f64,
    pub has_emergency: bool,
    pub collected_at: DateTime<Utc>,
}

impl FusedSnapshot {
    /// Congestion ratio of the best observation.
    pub fn congestion_ratio(&self) -> Option<f64> {
        self.best_observation.as_ref().map(|o| o.congestion_ratio)
    }
}
