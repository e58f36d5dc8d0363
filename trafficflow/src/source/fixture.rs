//! JSON fixture source.
//!
//! The fixture file is re-read on every call, so editing it while the
//! collector runs changes what the next cycle sees.
//!
//! ```json
//! {
//!   "locations": {
//!     "west_lake": {
//!       "observations": [ { ...TrafficObservation... } ],
//!       "incidents": [ { ...IncidentReport... } ]
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{IncidentSource, ObservationSource, SourceError};
use crate::cache::BoxFuture;
use crate::model::{IncidentReport, TrafficObservation, WatchedLocation};

/// Parsed fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub locations: HashMap<String, LocationFixture>,
}

/// Data for one watched location, keyed by location name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationFixture {
    #[serde(default)]
    pub observations: Vec<TrafficObservation>,
    #[serde(default)]
    pub incidents: Vec<IncidentReport>,
}

/// Source backed by a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    name: String,
    path: PathBuf,
}

impl FixtureSource {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self, location: &WatchedLocation) -> Result<LocationFixture, SourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Unavailable {
                source_name: self.name.clone(),
                reason: format!("{}: {}", self.path.display(), e),
            })?;
        let mut file: FixtureFile = serde_json::from_str(&text).map_err(|e| SourceError::InvalidData {
            source_name: self.name.clone(),
            reason: e.to_string(),
        })?;

        let mut fixture = file.locations.remove(&location.name).unwrap_or_default();
        for incident in &mut fixture.incidents {
            if incident.dedup_hash.is_empty() {
                incident.refresh_hash();
            }
        }
        Ok(fixture)
    }
}

impl ObservationSource for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect_observations<'a>(
        &'a self,
        location: &'a WatchedLocation,
    ) -> BoxFuture<'a, Result<Vec<TrafficObservation>, SourceError>> {
        Box::pin(async move { Ok(self.load(location).await?.observations) })
    }
}

impl IncidentSource for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect_incidents<'a>(
        &'a self,
        location: &'a WatchedLocation,
    ) -> BoxFuture<'a, Result<Vec<IncidentReport>, SourceError>> {
        Box::pin(async move { Ok(self.load(location).await?.incidents) })
    }
}
