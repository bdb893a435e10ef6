//! Core data models for the navigation system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Altitude assigned to flight-mode locations when none is given.
pub const DEFAULT_FLIGHT_ALTITUDE_M: f64 = 3500.0;

/// Altitude for a flight-mode point. Zero counts as unset.
pub fn flight_altitude(altitude: Option<f64>) -> f64 {
    match altitude {
        Some(alt) if alt != 0.0 => alt,
        _ => DEFAULT_FLIGHT_ALTITUDE_M,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("altitude {0} is not a finite number")]
    InvalidAltitude(f64),
}

/// A geographic position. Altitude is only carried in flight mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Coordinates {
    /// Build a validated ground position.
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        let coords = Self {
            lat,
            lng,
            altitude: None,
        };
        coords.validate()?;
        Ok(coords)
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::LatitudeOutOfRange(self.lat));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(CoordinateError::LongitudeOutOfRange(self.lng));
        }
        if let Some(alt) = self.altitude {
            if !alt.is_finite() {
                return Err(CoordinateError::InvalidAltitude(alt));
            }
        }
        Ok(())
    }

    /// Same horizontal position, ignoring altitude.
    pub fn same_position(&self, other: &Coordinates) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

/// A named, selected endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coordinates: Coordinates,
}

impl Location {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }

    /// Build a user-entered location.
    ///
    /// An empty name becomes `Custom (lat, lng)`. In flight mode a missing
    /// or zero altitude defaults to [`DEFAULT_FLIGHT_ALTITUDE_M`]; in ground mode
    /// altitude is dropped.
    pub fn custom(
        name: Option<&str>,
        lat: f64,
        lng: f64,
        altitude: Option<f64>,
        mode: TravelMode,
    ) -> Result<Self, CoordinateError> {
        let mut coordinates = Coordinates::new(lat, lng)?;
        if mode.is_flight() {
            coordinates.altitude = Some(flight_altitude(altitude));
            coordinates.validate()?;
        }

        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Custom ({:.4}, {:.4})", lat, lng),
        };

        Ok(Self { name, coordinates })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Ground,
    Flight,
}

impl TravelMode {
    pub fn is_flight(self) -> bool {
        matches!(self, TravelMode::Flight)
    }

    /// Noun used in user-facing text.
    pub fn route_noun(self) -> &'static str {
        match self {
            TravelMode::Ground => "route",
            TravelMode::Flight => "flight path",
        }
    }
}

impl std::str::FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ground" => Ok(TravelMode::Ground),
            "flight" => Ok(TravelMode::Flight),
            other => Err(format!("unknown travel mode '{}'", other)),
        }
    }
}

/// Axis-aligned box in frame pixels: top-left corner plus size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One labeled detection produced by the classifier for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box: BoundingBox::default(),
        }
    }
}

/// A single video frame handed to the classifier.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    /// Raw RGBA8 pixels; may be empty for synthetic sources.
    pub data: Vec<u8>,
}

/// A candidate route between the selected endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub geometry: Vec<Coordinates>,
    pub distance_m: f64,
    pub duration_s: f64,
    /// `[source, destination]` cruise altitudes, flight routes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_m: Option<[f64; 2]>,
}

impl Route {
    pub fn new(geometry: Vec<Coordinates>, distance_m: f64, duration_s: f64) -> Self {
        Self {
            geometry,
            distance_m,
            duration_s,
            altitude_m: None,
        }
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            distance_km: (self.distance_m / 100.0).round() / 10.0,
            duration_min: (self.duration_s / 60.0).round() as u64,
        }
    }
}

/// Display figures for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_km: f64,
    pub duration_min: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Obstacle detected and an alternative route was promoted.
    Obstacle,
    /// Obstacle detected but no alternative was left.
    NoAlternative,
    DetectionReady,
    DetectionFailed,
    RoutePlanned,
    RouteFailed,
}

/// A user-facing notice.
///
/// Persistent alerts stay until dismissed and offer a retry action.
/// Everything else is a transient toast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub mode: TravelMode,
    pub persistent: bool,
    pub retryable: bool,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn transient(kind: AlertKind, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            label: None,
            mode: TravelMode::Ground,
            persistent: false,
            retryable: false,
            raised_at: Utc::now(),
        }
    }

    /// A fatal condition: stays on screen with a retry action.
    pub fn persistent(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            persistent: true,
            retryable: true,
            ..Self::transient(kind, AlertSeverity::Error, message)
        }
    }

    pub fn with_mode(mut self, mode: TravelMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_reject_out_of_range_values() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert_eq!(
            Coordinates::new(90.5, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinates::new(0.0, -180.1),
            Err(CoordinateError::LongitudeOutOfRange(-180.1))
        );
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn custom_location_defaults_name_and_flight_altitude() {
        let loc = Location::custom(None, 40.71284, -74.006, None, TravelMode::Flight).unwrap();
        assert_eq!(loc.name, "Custom (40.7128, -74.0060)");
        assert_eq!(loc.coordinates.altitude, Some(DEFAULT_FLIGHT_ALTITUDE_M));

        let ground = Location::custom(Some("  Home "), 1.0, 2.0, Some(100.0), TravelMode::Ground).unwrap();
        assert_eq!(ground.name, "Home");
        assert_eq!(ground.coordinates.altitude, None);
    }

    #[test]
    fn zero_flight_altitude_takes_the_default() {
        assert_eq!(flight_altitude(Some(0.0)), DEFAULT_FLIGHT_ALTITUDE_M);
        assert_eq!(flight_altitude(Some(1200.0)), 1200.0);

        let loc = Location::custom(Some("Strip"), 10.0, 20.0, Some(0.0), TravelMode::Flight).unwrap();
        assert_eq!(loc.coordinates.altitude, Some(DEFAULT_FLIGHT_ALTITUDE_M));
    }

    #[test]
    fn route_summary_rounds_for_display() {
        let route = Route::new(Vec::new(), 4_567_890.0, 150_000.0);
        let summary = route.summary();
        assert_eq!(summary.distance_km, 4567.9);
        assert_eq!(summary.duration_min, 2500);
    }

    #[test]
    fn ground_coordinates_serialize_without_altitude() {
        let json = serde_json::to_value(Coordinates::new(1.5, 2.5).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"lat": 1.5, "lng": 2.5}));

        let parsed: Location = serde_json::from_value(serde_json::json!({
            "name": "JFK",
            "coordinates": {"lat": 40.6, "lng": -73.7, "altitude": 4000.0}
        }))
        .unwrap();
        assert_eq!(parsed.coordinates.altitude, Some(4000.0));
        assert_eq!(serde_json::to_value(TravelMode::Flight).unwrap(), "flight");
    }

    #[test]
    fn travel_mode_parses_case_insensitively() {
        assert_eq!("Flight".parse::<TravelMode>(), Ok(TravelMode::Flight));
        assert_eq!(" ground ".parse::<TravelMode>(), Ok(TravelMode::Ground));
        assert!("boat".parse::<TravelMode>().is_err());
    }
}
