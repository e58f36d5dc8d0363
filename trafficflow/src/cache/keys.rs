//! Cache key scheme.

use crate::geo::GeoPoint;

/// Decimal places used for coordinates in snapshot keys.
pub const SNAPSHOT_KEY_PRECISION: usize = 4;

/// Key for a per-location snapshot: `"{domain}:{lng}:{lat}"`.
pub fn snapshot_key(domain: &str, point: GeoPoint) -> String {
    format!(
        "{}:{:.prec$}:{:.prec$}",
        domain,
        point.lng,
        point.lat,
        prec = SNAPSHOT_KEY_PRECISION
    )
}

/// Key for a cached event: `"event:{id}"`.
pub fn event_key(id: &str) -> String {
    format!("event:{}", id)
}
