pub mod classifier;
pub mod detection;
pub mod models;
pub mod polyline;
pub mod presets;
pub mod reroute;
pub mod route_store;
pub mod routing;
pub mod spatial;

pub use classifier::{top_obstacle, ObstacleFilter, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_OBSTACLE_LABELS};
pub use detection::{
    DetectionError, DetectionMachine, DetectionPhase, DetectionSnapshot, DetectionState,
    DetectionTiming, InitFailure, InitFailureReason, InitStage, ResumePolicy,
};
pub use models::{
    Alert, AlertKind, AlertSeverity, BoundingBox, CoordinateError, Coordinates, Frame, Location,
    Prediction, Route, RouteSummary, TravelMode, DEFAULT_FLIGHT_ALTITUDE_M,
};
pub use reroute::{obstacle_alert, DetectionControl, RerouteCoordinator, RerouteOutcome};
pub use route_store::{PromotionPolicy, RouteError, RouteStore};
pub use routing::generate_flight_routes;
pub use spatial::haversine_distance;
