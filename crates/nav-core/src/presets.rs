//! Built-in location catalog offered by the location picker.

use crate::models::{Coordinates, Location, TravelMode};

/// (name, lat, lng)
const GROUND_LOCATIONS: [(&str, f64, f64); 8] = [
    ("New York", 40.7128, -74.0060),
    ("Los Angeles", 34.0522, -118.2437),
    ("Chicago", 41.8781, -87.6298),
    ("San Francisco", 37.7749, -122.4194),
    ("Boston", 42.3601, -71.0589),
    ("Austin", 30.2672, -97.7431),
    ("Seattle", 47.6062, -122.3081),
    ("Denver", 39.7392, -104.9903),
];

/// (name, lat, lng, altitude_m)
const AIRPORTS: [(&str, f64, f64, f64); 8] = [
    ("JFK Airport", 40.6413, -73.7781, 4000.0),
    ("LAX Airport", 33.9416, -118.4085, 3500.0),
    ("ORD Airport", 41.9742, -87.9073, 3800.0),
    ("SFO Airport", 37.6213, -122.3790, 4100.0),
    ("BOS Airport", 42.3656, -71.0096, 3700.0),
    ("AUS Airport", 30.1975, -97.6664, 3200.0),
    ("SEA Airport", 47.4502, -122.3088, 3600.0),
    ("DEN Airport", 39.8561, -104.6737, 5200.0),
];

/// Preset locations for a travel mode: cities for ground, airports for flight.
pub fn locations(mode: TravelMode) -> Vec<Location> {
    match mode {
        TravelMode::Ground => GROUND_LOCATIONS
            .iter()
            .map(|&(name, lat, lng)| {
                Location::new(name, Coordinates { lat, lng, altitude: None })
            })
            .collect(),
        TravelMode::Flight => AIRPORTS
            .iter()
            .map(|&(name, lat, lng, alt)| {
                Location::new(name, Coordinates { lat, lng, altitude: Some(alt) })
            })
            .collect(),
    }
}

/// Case-insensitive lookup by name within one mode's catalog.
pub fn find(mode: TravelMode, name: &str) -> Option<Location> {
    let wanted = name.trim();
    locations(mode)
        .into_iter()
        .find(|loc| loc.name.eq_ignore_ascii_case(wanted))
}
