//! Synthetic flight route generation.
//!
//! There is no flight planner behind this: the direct route is a straight
//! line through its own midpoint, and the alternatives displace that
//! midpoint sideways along the route delta and inflate distance and time.

use crate::models::{flight_altitude, Coordinates, Route};
use crate::spatial::{distance_between, lerp};

/// Average cruise speed used to estimate flight duration.
const FLIGHT_SPEED_KMH: f64 = 800.0;
/// Number of linear segments in a generated path.
const PATH_SEGMENTS: usize = 8;
/// Midpoint displacement of the two alternatives, as a fraction of the delta.
const ALTERNATIVE_VARIANCE: f64 = 0.1;
const FIRST_ALTERNATIVE_FACTOR: f64 = 1.05;
const SECOND_ALTERNATIVE_FACTOR: f64 = 1.07;

/// Generate the direct flight route followed by its two alternatives.
pub fn generate_flight_routes(source: &Coordinates, destination: &Coordinates) -> Vec<Route> {
    let source_alt = flight_altitude(source.altitude);
    let dest_alt = flight_altitude(destination.altitude);

    let distance_m = distance_between(source, destination);
    let duration_s = (distance_m / 1000.0) / FLIGHT_SPEED_KMH * 3600.0;

    let build = |variance: f64, factor: f64| Route {
        geometry: flight_path(source, destination, variance),
        distance_m: distance_m * factor,
        duration_s: duration_s * factor,
        altitude_m: Some([source_alt, dest_alt]),
    };

    vec![
        build(0.0, 1.0),
        build(ALTERNATIVE_VARIANCE, FIRST_ALTERNATIVE_FACTOR),
        build(-ALTERNATIVE_VARIANCE, SECOND_ALTERNATIVE_FACTOR),
    ]
}

/// Midpoint of the route, displaced by `variance` times the lat/lng delta.
pub fn displaced_midpoint(source: &Coordinates, destination: &Coordinates, variance: f64) -> Coordinates {
    Coordinates {
        lat: (source.lat + destination.lat) / 2.0 + variance * (destination.lat - source.lat),
        lng: (source.lng + destination.lng) / 2.0 + variance * (destination.lng - source.lng),
        altitude: None,
    }
}

/// Piecewise-linear path source -> midpoint -> destination.
///
/// The path has `PATH_SEGMENTS` segments: the endpoints plus seven interior
/// points, the middle one being the displaced midpoint itself.
pub fn flight_path(source: &Coordinates, destination: &Coordinates, variance: f64) -> Vec<Coordinates> {
    let mid = displaced_midpoint(source, destination, variance);
    let half = PATH_SEGMENTS / 2;

    let mut points = Vec::with_capacity(PATH_SEGMENTS + 1);
    points.push(Coordinates { altitude: None, ..*source });

    for i in 1..PATH_SEGMENTS {
        if i < half {
            points.push(lerp(source, &mid, i as f64 / half as f64));
        } else {
            points.push(lerp(&mid, destination, (i - half) as f64 / half as f64));
        }
    }

    points.push(Coordinates { altitude: None, ..*destination });
    points
}
