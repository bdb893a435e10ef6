//! API routes for the navigation server.

pub mod detection;
pub mod navigation;
mod routes;
pub mod ws;

use axum::Router;

pub fn routes() -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router()
}
