//! Geographic points and the flat-plane distance model.
//!
//! All geofencing in this crate uses [`FlatPlane`]: longitude and latitude
//! deltas are treated as planar coordinates and scaled by [`KM_PER_DEGREE`].
//! The result is an approximation that degrades away from the equator and
//! over long distances. It is the only distance model used for subscription
//! and incident filtering.

use serde::{Deserialize, Serialize};

/// Kilometres per degree used by the flat-plane approximation.
pub const KM_PER_DEGREE: f64 = 111.0;

/// A longitude/latitude pair in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Flat-plane distance model: `sqrt(Δlng² + Δlat²) × 111`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatPlane;

impl FlatPlane {
    /// Approximate distance in kilometres between two points.
    pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
        let d_lng = a.lng - b.lng;
        let d_lat = a.lat - b.lat;
        (d_lng * d_lng + d_lat * d_lat).sqrt() * KM_PER_DEGREE
    }

    /// True when two circles of the given radii overlap or touch.
    pub fn within(a: GeoPoint, a_radius_km: f64, b: GeoPoint, b_radius_km: f64) -> bool {
        Self::distance_km(a, b) <= a_radius_km + b_radius_km
    }
}
