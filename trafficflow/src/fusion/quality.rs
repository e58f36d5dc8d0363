//! Observation quality scoring.
//!
//! A clean observation scores `1.0`. Each violated rule multiplies the score
//! by that rule's penalty factor, so penalties compound and the score can
//! only decrease.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::TrafficObservation;

/// A quality rule an observation violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIssue {
    SpeedOutOfRange,
    RatioOutOfRange,
    NoRoads,
    FutureTimestamp,
    Stale,
}

/// Result of scoring one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    /// Score in `[0, 1]`.
    pub score: f64,
    pub issues: Vec<QualityIssue>,
}

impl QualityAssessment {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Scores a traffic observation.
pub trait QualityChecker: Send + Sync {
    /// Assesses `observation` as of `now`.
    fn assess(&self, observation: &TrafficObservation, now: DateTime<Utc>) -> QualityAssessment;

    /// Convenience for callers that only need the score.
    fn score(&self, observation: &TrafficObservation, now: DateTime<Utc>) -> f64 {
        self.assess(observation, now).score
    }
}

/// Thresholds and penalty factors for [`DefaultQualityChecker`].
#[derive(Debug, Clone)]
pub struct QualityRules {
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub max_age: Duration,
    pub speed_penalty: f64,
    pub ratio_penalty: f64,
    pub no_roads_penalty: f64,
    pub future_penalty: f64,
    pub stale_penalty: f64,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            min_speed_kmh: 5.0,
            max_speed_kmh: 120.0,
            max_age: Duration::from_secs(3600),
            speed_penalty: 0.5,
            ratio_penalty: 0.5,
            no_roads_penalty: 0.3,
            future_penalty: 0.1,
            stale_penalty: 0.8,
        }
    }
}

/// Rule-based quality checker.
#[derive(Debug, Clone, Default)]
pub struct DefaultQualityChecker {
    rules: QualityRules,
}

impl DefaultQualityChecker {
    pub fn new(rules: QualityRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &QualityRules {
        &self.rules
    }
}

impl QualityChecker for DefaultQualityChecker {
    fn assess(&self, obs: &TrafficObservation, now: DateTime<Utc>) -> QualityAssessment {
        let rules = &self.rules;
        let mut score = 1.0_f64;
        let mut issues = Vec::new();

        // Speed is only judged when the source reports it.
        if let Some(speed) = obs.avg_speed_kmh {
            if !(rules.min_speed_kmh..=rules.max_speed_kmh).contains(&speed) {
                score *= rules.speed_penalty;
                issues.push(QualityIssue::SpeedOutOfRange);
            }
        }

        if !(0.0..=1.0).contains(&obs.congestion_ratio) {
            score *= rules.ratio_penalty;
            issues.push(QualityIssue::RatioOutOfRange);
        }

        if obs.roads.total == 0 {
            score *= rules.no_roads_penalty;
            issues.push(QualityIssue::NoRoads);
        }

        if obs.collected_at > now {
            score *= rules.future_penalty;
            issues.push(QualityIssue::FutureTimestamp);
        } else if (now - obs.collected_at).to_std().unwrap_or(Duration::ZERO) > rules.max_age {
            score *= rules.stale_penalty;
            issues.push(QualityIssue::Stale);
        }

        QualityAssessment {
            score: score.clamp(0.0, 1.0),
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::observation_fixture as observation;

    #[test]
    fn test_clean_observation_scores_one() {
        let now = Utc::now();
        let result = DefaultQualityChecker::default().assess(&observation(0.4, now), now);
        assert!(result.is_clean());
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_penalties_compound() {
        let now = Utc::now();
        let mut obs = observation(1.5, now);
        obs.avg_speed_kmh = Some(150.0);
        let result = DefaultQualityChecker::default().assess(&obs, now);
        assert_eq!(
            result.issues,
            vec![QualityIssue::SpeedOutOfRange, QualityIssue::RatioOutOfRange]
        );
        assert!((result.score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_speed_is_not_penalized() {
        let now = Utc::now();
        let mut obs = observation(0.3, now);
        obs.avg_speed_kmh = None;
        assert_eq!(DefaultQualityChecker::default().score(&obs, now), 1.0);
    }

    #[test]
    fn test_no_roads_penalty() {
        let now = Utc::now();
        let mut obs = observation(0.3, now);
        obs.roads.total = 0;
        assert!((DefaultQualityChecker::default().score(&obs, now) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_timestamp_rules() {
        let now = Utc::now();
        let checker = DefaultQualityChecker::default();

        let future = observation(0.3, now + chrono::Duration::minutes(5));
        assert!((checker.score(&future, now) - 0.1).abs() < 1e-12);

        let stale = observation(0.3, now - chrono::Duration::hours(2));
        assert!((checker.score(&stale, now) - 0.8).abs() < 1e-12);

        let recent = observation(0.3, now - chrono::Duration::minutes(59));
        assert_eq!(checker.score(&recent, now), 1.0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_score_in_unit_interval(
                ratio in -2.0f64..3.0,
                speed in proptest::option::of(-50.0f64..300.0),
                roads in 0u32..50,
                age_secs in -7200i64..14400,
            ) {
                let now = Utc::now();
                let mut obs = observation(0.5, now - chrono::Duration::seconds(age_secs));
                obs.congestion_ratio = ratio;
                obs.avg_speed_kmh = speed;
                obs.roads.total = roads;
                let score = DefaultQualityChecker::default().score(&obs, now);
                prop_assert!((0.0..=1.0).contains(&score));
            }

            #[test]
            fn prop_out_of_range_never_exceeds_unpenalized(
                ratio in prop_oneof![-5.0f64..-0.001, 1.001f64..5.0],
                speed in prop_oneof![0.0f64..4.99, 120.01f64..400.0],
            ) {
                let now = Utc::now();
                let checker = DefaultQualityChecker::default();
                let clean = observation(0.5, now);
                let baseline = checker.score(&clean, now);

                let mut bad_ratio = clean.clone();
                bad_ratio.congestion_ratio = ratio;
                prop_assert!(checker.score(&bad_ratio, now) <= baseline * 0.5 + 1e-12);

                let mut bad_speed = clean.clone();
                bad_speed.avg_speed_kmh = Some(speed);
                prop_assert!(checker.score(&bad_speed, now) <= baseline * 0.5 + 1e-12);
            }
        }
    }
}
