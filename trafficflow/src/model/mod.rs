//! Pipeline data model.
//!
//! Observations and incident reports are produced by collaborators and are
//! immutable once built. [`FusedSnapshot`] is the merged per-location view the
//! detection rules consume.

mod incident;
mod location;
mod observation;
mod recent;
mod snapshot;

pub use incident::{IncidentReport, Severity, UNKNOWN_LOCATION};
pub use location::{WatchedLocation, DEFAULT_LOCATION_RADIUS_KM};
pub use observation::{RoadCounts, TrafficObservation};
pub use recent::{RecentSet, DEFAULT_RECENT_CAPACITY, DEFAULT_RECENT_TTL};
pub use snapshot::FusedSnapshot;

#[cfg(test)]
pub(crate) use observation::fixtures::observation as observation_fixture;
