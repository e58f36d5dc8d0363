//! Collaborator-facing data sources.
//!
//! The collector treats sources as opaque async producers. Real deployments
//! plug in API clients and scrapers; [`FixtureSource`] replays JSON files.

mod fixture;

use std::time::Duration;

use thiserror::Error;

use crate::cache::BoxFuture;
use crate::model::{IncidentReport, TrafficObservation, WatchedLocation};

pub use fixture::{FixtureFile, FixtureSource};

/// A source call that did not produce data.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source '{source_name}' timed out after {timeout:?}")]
    Timeout { source_name: String, timeout: Duration },

    #[error("source '{source_name}' unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    #[error("source '{source_name}' returned invalid data: {reason}")]
    InvalidData { source_name: String, reason: String },
}

/// Produces traffic observations for a location.
pub trait ObservationSource: Send + Sync {
    fn name(&self) -> &str;

    fn collect_observations<'a>(
        &'a self,
        location: &'a WatchedLocation,
    ) -> BoxFuture<'a, Result<Vec<TrafficObservation>, SourceError>>;
}

/// Produces incident reports for a location.
pub trait IncidentSource: Send + Sync {
    fn name(&self) -> &str;

    fn collect_incidents<'a>(
        &'a self,
        location: &'a WatchedLocation,
    ) -> BoxFuture<'a, Result<Vec<IncidentReport>, SourceError>>;
}
