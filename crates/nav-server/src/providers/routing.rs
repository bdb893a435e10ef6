//! Route fetching: OSRM for ground, synthetic flight paths for flight mode.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use nav_core::polyline;
use nav_core::{generate_flight_routes, Coordinates, Route, TravelMode};

use super::RoutingProvider;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Http(String),
    #[error("routing error ({code}): {message}")]
    Provider { code: String, message: String },
    #[error("no routes found between these locations")]
    NoRouteFound,
    #[error("invalid route geometry: {0}")]
    InvalidRoute(String),
    #[error("source and destination must be different locations")]
    SameEndpoints,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

/// OSRM returns either an encoded polyline or a GeoJSON line string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OsrmGeometry {
    Encoded(String),
    /// `[lng, lat]` pairs
    LineString { coordinates: Vec<[f64; 2]> },
}

impl OsrmGeometry {
    fn into_points(self) -> Result<Vec<Coordinates>, RoutingError> {
        match self {
            OsrmGeometry::Encoded(encoded) => {
                polyline::decode(&encoded).map_err(|e| RoutingError::InvalidRoute(e.to_string()))
            }
            OsrmGeometry::LineString { coordinates } => Ok(coordinates
                .into_iter()
                .map(|[lng, lat]| Coordinates {
                    lat,
                    lng,
                    altitude: None,
                })
                .collect()),
        }
    }
}

/// Parse an OSRM `route` response body into routes, provider order kept.
pub fn parse_osrm_response(body: &str) -> Result<Vec<Route>, RoutingError> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|e| RoutingError::Http(format!("malformed routing response: {}", e)))?;

    if response.code != "Ok" {
        return Err(RoutingError::Provider {
            code: response.code,
            message: response
                .message
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    if response.routes.is_empty() {
        return Err(RoutingError::NoRouteFound);
    }

    response
        .routes
        .into_iter()
        .map(|route| -> Result<Route, RoutingError> {
            let geometry = route.geometry.into_points()?;
            Ok(Route::new(geometry, route.distance, route.duration))
        })
        .collect()
}

/// Routing provider backed by an OSRM-compatible HTTP service.
pub struct RoutingClient {
    client: Client,
    base_url: String,
}

impl RoutingClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn route_url(&self, source: &Coordinates, destination: &Coordinates) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&alternatives=true&steps=true",
            self.base_url, source.lng, source.lat, destination.lng, destination.lat
        )
    }

    pub async fn fetch_ground_routes(
        &self,
        source: &Coordinates,
        destination: &Coordinates,
    ) -> Result<Vec<Route>, RoutingError> {
        let url = self.route_url(source, destination);
        tracing::debug!("Fetching routes from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RoutingError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Http(format!("OSRM API error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::Http(e.to_string()))?;
        let routes = parse_osrm_response(&body)?;
        tracing::info!("Fetched {} ground route(s)", routes.len());
        Ok(routes)
    }
}

impl RoutingProvider for RoutingClient {
    fn fetch_routes<'a>(
        &'a self,
        source: &'a Coordinates,
        destination: &'a Coordinates,
        mode: TravelMode,
    ) -> BoxFuture<'a, Result<Vec<Route>, RoutingError>> {
        Box::pin(async move {
            if source.same_position(destination) {
                return Err(RoutingError::SameEndpoints);
            }
            match mode {
                TravelMode::Flight => {
                    let routes = generate_flight_routes(source, destination);
                    tracing::info!("Generated {} flight path(s)", routes.len());
                    Ok(routes)
                }
                TravelMode::Ground => self.fetch_ground_routes(source, destination).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_polyline_and_geojson_geometry() {
        let body = json!({
            "code": "Ok",
            "routes": [
                {"geometry": "_p~iF~ps|U_ulLnnqC_mqNvxq`@", "distance": 1200.5, "duration": 300.0},
                {"geometry": {"type": "LineString", "coordinates": [[-120.2, 38.5], [-120.95, 40.7]]},
                 "distance": 1500.0, "duration": 420.0}
            ]
        })
        .to_string();

        let routes = parse_osrm_response(&body).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].geometry.len(), 3);
        assert!((routes[0].geometry[0].lat - 38.5).abs() < 1e-9);
        assert!((routes[0].geometry[0].lng + 120.2).abs() < 1e-9);
        assert_eq!(routes[1].geometry[1].lat, 40.7);
        assert_eq!(routes[1].geometry[1].lng, -120.95);
        assert_eq!(routes[1].distance_m, 1500.0);
    }

    #[test]
    fn provider_error_code_is_reported() {
        let body = json!({"code": "NoRoute", "message": "Impossible route"}).to_string();
        assert_eq!(
            parse_osrm_response(&body),
            Err(RoutingError::Provider {
                code: "NoRoute".into(),
                message: "Impossible route".into()
            })
        );
    }

    #[test]
    fn empty_route_list_is_no_route_found() {
        let body = json!({"code": "Ok", "routes": []}).to_string();
        assert_eq!(parse_osrm_response(&body), Err(RoutingError::NoRouteFound));
    }

    #[test]
    fn route_url_uses_lng_lat_order() {
        let client = RoutingClient::new("http://osrm.local/", Duration::from_secs(1));
        let src = Coordinates::new(40.7128, -74.006).unwrap();
        let dst = Coordinates::new(34.0522, -118.2437).unwrap();
        assert_eq!(
            client.route_url(&src, &dst),
            "http://osrm.local/route/v1/driving/-74.006,40.7128;-118.2437,34.0522?overview=full&alternatives=true&steps=true"
        );
    }

    #[tokio::test]
    async fn flight_mode_needs_no_network() {
        let client = RoutingClient::new("http://127.0.0.1:9", Duration::from_secs(1));
        let src = Coordinates::new(40.6413, -73.7781).unwrap().with_altitude(4000.0);
        let dst = Coordinates::new(33.9416, -118.4085).unwrap().with_altitude(3000.0);

        let routes = client.fetch_routes(&src, &dst, TravelMode::Flight).await.unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].altitude_m, Some([4000.0, 3000.0]));
    }

    #[tokio::test]
    async fn identical_endpoints_are_rejected() {
        let client = RoutingClient::new("http://127.0.0.1:9", Duration::from_secs(1));
        let point = Coordinates::new(1.0, 2.0).unwrap();
        let result = client.fetch_routes(&point, &point, TravelMode::Ground).await;
        assert_eq!(result, Err(RoutingError::SameEndpoints));
    }
}
