//! Incident reports from scraped or reported sources.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::geo::GeoPoint;

/// Location text used when a report does not name a place.
pub const UNKNOWN_LOCATION: &str = "unknown location";

/// Incident severity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
    Critical,
    #[default]
    Unknown,
}

// Ordered from most to least severe; the first match wins.
const SEVERITY_KEYWORDS: &[(Severity, &[&str])] = &[
    (
        Severity::Critical,
        &["fatal", "killed", "multiple vehicles", "pile-up", "特大", "死亡", "多车"],
    ),
    (
        Severity::Severe,
        &["serious", "injured", "overturned", "严重", "受伤", "翻车"],
    ),
    (
        Severity::Moderate,
        &["collision", "crash", "一般", "碰撞", "追尾"],
    ),
    (Severity::Minor, &["minor", "scrape", "轻微", "刮擦"]),
];

impl Severity {
    /// Classifies free text by keyword, most severe match first.
    ///
    /// Returns [`Severity::Unknown`] when no keyword matches.
    pub fn classify(title: &str, description: &str) -> Self {
        let text = format!("{} {}", title, description).to_lowercase();
        SEVERITY_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| text.contains(w)))
            .map(|(severity, _)| *severity)
            .unwrap_or(Severity::Unknown)
    }

    /// True for severities that mark a snapshot as an emergency.
    pub fn is_serious(self) -> bool {
        matches!(self, Severity::Severe | Severity::Critical)
    }

    pub fn is_known(self) -> bool {
        self != Severity::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A textual record of an accident, closure or hazard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "unknown_location")]
    pub location_text: String,
    /// Resolved coordinates, when the source could geocode the location.
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    #[serde(default)]
    pub severity: Severity,
    pub source: String,
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
    /// Content hash used to suppress duplicate reports.
    #[serde(default)]
    pub dedup_hash: String,
}

fn unknown_location() -> String {
    UNKNOWN_LOCATION.to_string()
}

impl IncidentReport {
    /// Creates a report and computes its content hash.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let mut report = Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            location_text: unknown_location(),
            coordinates: None,
            severity: Severity::Unknown,
            source: source.into(),
            reported_at: None,
            dedup_hash: String::new(),
        };
        report.refresh_hash();
        report
    }

    pub fn with_location(mut self, text: impl Into<String>, coordinates: Option<GeoPoint>) -> Self {
        self.location_text = text.into();
        self.coordinates = coordinates;
        self.refresh_hash();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_reported_at(mut self, at: DateTime<Utc>) -> Self {
        self.reported_at = Some(at);
        self.refresh_hash();
        self
    }

    /// Recomputes `dedup_hash` from the current content.
    pub fn refresh_hash(&mut self) {
        self.dedup_hash = Self::content_hash(
            &self.title,
            &self.description,
            &self.location_text,
            self.reported_at,
        );
    }

    /// SHA-256 over `title_description_location_time`, time at minute precision.
    pub fn content_hash(
        title: &str,
        description: &str,
        location: &str,
        reported_at: Option<DateTime<Utc>>,
    ) -> String {
        let time = reported_at
            .map(|t| t.format("%Y%m%d%H%M").to_string())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{}_{}_{}", title, description, location, time).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}
