//! Navigation endpoints: plan a trip, inspect it, tear it down.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use nav_core::{
    presets, Alert, AlertKind, AlertSeverity, CoordinateError, Location, Route, RouteError,
    RouteSummary, TravelMode,
};

use crate::alerts::AlertSink;
use crate::loops::SchedulerCommand;
use crate::providers::RoutingError;
use crate::state::{AppState, Navigation};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// A location as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LocationInput {
    Named(Location),
    /// A catalog entry, looked up by name for the requested mode.
    Preset { preset: String },
    Point {
        #[serde(default)]
        name: Option<String>,
        lat: f64,
        lng: f64,
        #[serde(default)]
        altitude: Option<f64>,
    },
}

#[derive(Debug)]
enum ResolveError {
    UnknownPreset(String),
    Coordinates(CoordinateError),
}

impl LocationInput {
    fn resolve(self, mode: TravelMode) -> Result<Location, ResolveError> {
        match self {
            LocationInput::Named(location) => {
                let c = location.coordinates;
                Location::custom(Some(&location.name), c.lat, c.lng, c.altitude, mode)
                    .map_err(ResolveError::Coordinates)
            }
            LocationInput::Preset { preset } => {
                presets::find(mode, &preset).ok_or(ResolveError::UnknownPreset(preset))
            }
            LocationInput::Point {
                name,
                lat,
                lng,
                altitude,
            } => Location::custom(name.as_deref(), lat, lng, altitude, mode)
                .map_err(ResolveError::Coordinates),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NavigationRequest {
    pub source: LocationInput,
    pub destination: LocationInput,
    #[serde(default)]
    pub mode: TravelMode,
}

#[derive(Debug, Serialize)]
pub struct NavigationView {
    pub source: Option<Location>,
    pub destination: Option<Location>,
    pub mode: TravelMode,
    pub current_route: Option<Route>,
    pub summary: Option<RouteSummary>,
    pub alternatives_remaining: usize,
    pub obstacle_detected: bool,
    pub reroutes: u64,
}

impl NavigationView {
    fn from_navigation(nav: &Navigation) -> Self {
        let current = nav.routes.current().cloned();
        Self {
            source: nav.source.clone(),
            destination: nav.destination.clone(),
            mode: nav.mode,
            summary: current.as_ref().map(Route::summary),
            current_route: current,
            alternatives_remaining: nav.routes.alternatives_remaining(),
            obstacle_detected: nav.coordinator.obstacle_detected(),
            reroutes: nav.coordinator.reroutes(),
        }
    }
}

/// Plan routes for a source/destination pair and start detection.
pub async fn start_navigation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NavigationRequest>,
) -> Result<Json<NavigationView>, ApiError> {
    let mode = req.mode;
    let source = resolve(req.source, mode, "source")?;
    let destination = resolve(req.destination, mode, "destination")?;

    if source.coordinates.same_position(&destination.coordinates) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            RoutingError::SameEndpoints.to_string(),
        ));
    }

    tracing::info!(
        "Planning {} from '{}' to '{}'",
        mode.route_noun(),
        source.name,
        destination.name
    );

    let routing = state.routing();
    let routes = match routing
        .fetch_routes(&source.coordinates, &destination.coordinates, mode)
        .await
    {
        Ok(routes) => routes,
        Err(err) => return Err(route_failure(&state, mode, err)),
    };

    let planned = state.with_navigation(|nav| {
        let summary = nav.plan(source, destination, mode, routes)?.summary();
        Ok::<_, RouteError>((summary, NavigationView::from_navigation(nav)))
    });

    let (summary, view) = match planned {
        Ok(planned) => planned,
        Err(RouteError::NoRouteFound) => {
            return Err(route_failure(&state, mode, RoutingError::NoRouteFound))
        }
        Err(err) => {
            return Err(route_failure(&state, mode, RoutingError::InvalidRoute(err.to_string())))
        }
    };

    if state.alerts().dismiss_kind(AlertKind::RouteFailed).is_some() {
        tracing::debug!("Cleared previous route failure");
    }
    state.alerts().raise(
        Alert::transient(
            AlertKind::RoutePlanned,
            AlertSeverity::Info,
            format!(
                "Found {} {}(s). Best: {} km, {} min.",
                view.alternatives_remaining + 1,
                mode.route_noun(),
                summary.distance_km,
                summary.duration_min
            ),
        )
        .with_mode(mode),
    );

    if !state.scheduler().send(SchedulerCommand::Start).await {
        tracing::warn!("Detection loop is not running");
    }

    Ok(Json(view))
}

fn resolve(input: LocationInput, mode: TravelMode, role: &str) -> Result<Location, ApiError> {
    input.resolve(mode).map_err(|err| match err {
        ResolveError::UnknownPreset(name) => api_error(
            StatusCode::BAD_REQUEST,
            format!("unknown {} location '{}'", role, name),
        ),
        ResolveError::Coordinates(err) => {
            api_error(StatusCode::BAD_REQUEST, format!("invalid {}: {}", role, err))
        }
    })
}

fn route_failure(state: &AppState, mode: TravelMode, err: RoutingError) -> ApiError {
    tracing::error!("Route fetch failed: {}", err);
    let status = match err {
        RoutingError::SameEndpoints => StatusCode::BAD_REQUEST,
        RoutingError::NoRouteFound => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    };
    state.alerts().raise(
        Alert::persistent(
            AlertKind::RouteFailed,
            format!("Failed to get {}s: {}", mode.route_noun(), err),
        )
        .with_mode(mode),
    );
    api_error(status, err.to_string())
}

pub async fn get_navigation(State(state): State<Arc<AppState>>) -> Json<NavigationView> {
    Json(state.with_navigation(|nav| NavigationView::from_navigation(nav)))
}

/// Drop the route set and stop detection.
pub async fn end_navigation(State(state): State<Arc<AppState>>) -> StatusCode {
    state.with_navigation(Navigation::clear);
    state.scheduler().send(SchedulerCommand::Stop).await;
    tracing::info!("Navigation ended");
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct LocationsQuery {
    #[serde(default)]
    pub mode: TravelMode,
}

/// Preset locations for the requested mode.
pub async fn list_locations(Query(query): Query<LocationsQuery>) -> Json<Vec<Location>> {
    Json(presets::locations(query.mode))
}
