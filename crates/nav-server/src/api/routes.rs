//! REST API routes.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::{detection, navigation, ws};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/v1/navigation",
            post(navigation::start_navigation)
                .get(navigation::get_navigation)
                .delete(navigation::end_navigation),
        )
        .route("/v1/locations", get(navigation::list_locations))
        .route("/v1/detection", get(detection::get_detection))
        .route("/v1/detection/start", post(detection::start_detection))
        .route("/v1/detection/stop", post(detection::stop_detection))
        .route("/v1/detection/retry", post(detection::retry_detection))
        .route("/v1/alerts/ack", post(detection::acknowledge_alert))
        .route("/v1/alerts/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
}
