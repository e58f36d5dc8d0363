//! Snapshot fusion.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use super::quality::{DefaultQualityChecker, QualityChecker};
use crate::clock::{system_clock, SharedClock};
use crate::model::{FusedSnapshot, IncidentReport, TrafficObservation};

/// Weight of the best observation's quality in the overall score.
const OBSERVATION_QUALITY_WEIGHT: f64 = 0.6;

/// Weight of completeness in the overall score.
const COMPLETENESS_WEIGHT: f64 = 0.4;

/// Completeness credit per satisfied attribute.
const ATTRIBUTE_CREDIT: f64 = 0.1;

/// Maximum completeness contributed by the observation.
pub const OBSERVATION_COMPLETENESS_CAP: f64 = 0.4;

/// Maximum completeness contributed by incidents.
pub const INCIDENT_COMPLETENESS_CAP: f64 = 0.6;

/// Only the first incidents count toward completeness.
pub const MAX_SCORED_INCIDENTS: usize = 5;

/// Merges observations and incidents into a [`FusedSnapshot`].
#[derive(Clone)]
pub struct FusionEngine {
    checker: Arc<dyn QualityChecker>,
    clock: SharedClock,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(Arc::new(DefaultQualityChecker::default()), system_clock())
    }
}

impl FusionEngine {
    pub fn new(checker: Arc<dyn QualityChecker>, clock: SharedClock) -> Self {
        Self { checker, clock }
    }

    /// Fuses one location's inputs. Never fails; empty input yields a
    /// zero-quality snapshot.
    pub fn fuse(&self, observations: &[TrafficObservation], incidents: &[IncidentReport]) -> FusedSnapshot {
        let now = self.clock.now();
        let best = self.select_best(observations, now);

        let mut sources: Vec<String> = Vec::new();
        if let Some((obs, _)) = &best {
            sources.push(obs.source.clone());
        }
        for incident in incidents {
            if !sources.iter().any(|s| s == &incident.source) {
                sources.push(incident.source.clone());
            }
        }

        let (best_observation, observation_quality) = match best {
            Some((obs, score)) => (Some(obs.clone()), score),
            None => (None, 0.0),
        };

        let completeness = completeness(best_observation.as_ref(), incidents);
        let quality = (OBSERVATION_QUALITY_WEIGHT * observation_quality
            + COMPLETENESS_WEIGHT * completeness)
            .clamp(0.0, 1.0);

        trace!(
            observations = observations.len(),
            incidents = incidents.len(),
            quality,
            completeness,
            "Fused snapshot"
        );

        FusedSnapshot {
            best_observation,
            observation_quality,
            incidents: incidents.to_vec(),
            sources,
            quality_score: quality,
            completeness_score: completeness,
            has_emergency: incidents.iter().any(|i| i.severity.is_serious()),
            collected_at: now,
        }
    }

    // Highest score wins; equal scores go to the later reading.
    fn select_best<'a>(
        &self,
        observations: &'a [TrafficObservation],
        now: DateTime<Utc>,
    ) -> Option<(&'a TrafficObservation, f64)> {
        observations
            .iter()
            .map(|obs| (obs, self.checker.score(obs, now)))
            .fold(None, |best, (obs, score)| match best {
                None => Some((obs, score)),
                Some((current, current_score)) => {
                    if score > current_score
                        || (score == current_score && obs.collected_at > current.collected_at)
                    {
                        Some((obs, score))
                    } else {
                        Some((current, current_score))
                    }
                }
            })
    }
}

fn completeness(observation: Option<&TrafficObservation>, incidents: &[IncidentReport]) -> f64 {
    let observation_part = observation
        .map(|obs| {
            let flags = [
                obs.avg_speed_kmh.is_some(),
                obs.congestion_ratio > 0.0,
                obs.roads.total > 0,
                obs.has_raw_payload(),
            ];
            credit(&flags).min(OBSERVATION_COMPLETENESS_CAP)
        })
        .unwrap_or(0.0);

    let incident_part: f64 = incidents
        .iter()
        .take(MAX_SCORED_INCIDENTS)
        .map(|incident| {
            credit(&[
                incident.coordinates.is_some(),
                incident.reported_at.is_some(),
                incident.severity.is_known(),
                incident.has_description(),
            ])
        })
        .sum();

    (observation_part + incident_part.min(INCIDENT_COMPLETENESS_CAP)).min(1.0)
}

fn credit(flags: &[bool]) -> f64 {
    flags.iter().filter(|f| **f).count() as f64 * ATTRIBUTE_CREDIT
}
