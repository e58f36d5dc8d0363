//! Multi-source data fusion.
//!
//! [`FusionEngine`] merges the observations and incident reports collected for
//! one location into a single [`FusedSnapshot`](crate::model::FusedSnapshot).
//! Observation quality is scored by a pluggable [`QualityChecker`].

mod engine;
mod quality;

pub use engine::{
    FusionEngine, MAX_SCORED_INCIDENTS, OBSERVATION_COMPLETENESS_CAP, INCIDENT_COMPLETENESS_CAP,
};
pub use quality::{DefaultQualityChecker, QualityAssessment, QualityChecker, QualityIssue, QualityRules};
