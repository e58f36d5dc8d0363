//! Watched locations.

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Default monitoring radius around a watched location.
pub const DEFAULT_LOCATION_RADIUS_KM: f64 = 3.0;

/// A place the collector polls every cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchedLocation {
    pub name: String,
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl WatchedLocation {
    pub fn new(name: impl Into<String>, center: GeoPoint, radius_km: f64) -> Self {
        Self {
            name: name.into(),
            center,
            radius_km,
        }
    }
}
