//! Spatial math for route distances and path interpolation.

use crate::models::Coordinates;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
///
/// # Returns
/// Distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance between two positions in meters.
pub fn distance_between(a: &Coordinates, b: &Coordinates) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Linear interpolation in degree space. Altitude is not carried.
pub fn lerp(from: &Coordinates, to: &Coordinates, ratio: f64) -> Coordinates {
    Coordinates {
        lat: from.lat + (to.lat - from.lat) * ratio,
        lng: from.lng + (to.lng - from.lng) * ratio,
        altitude: None,
    }
}
