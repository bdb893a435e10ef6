//! Detection control endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;

use nav_core::DetectionSnapshot;

use crate::loops::SchedulerCommand;
use crate::state::AppState;

pub async fn get_detection(State(state): State<Arc<AppState>>) -> Json<DetectionSnapshot> {
    Json(state.scheduler().snapshot())
}

pub async fn start_detection(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    dispatch(&state, SchedulerCommand::Start).await
}

pub async fn stop_detection(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    dispatch(&state, SchedulerCommand::Stop).await
}

pub async fn retry_detection(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    dispatch(&state, SchedulerCommand::Retry).await
}

/// Dismiss the current alert: clears any persistent notice, resumes polling
/// and re-arms rerouting.
pub async fn acknowledge_alert(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    if let Some(alert) = state.alerts().dismiss() {
        tracing::info!("Dismissed {:?} notice", alert.kind);
    }
    dispatch(&state, SchedulerCommand::Acknowledge).await
}

async fn dispatch(state: &AppState, command: SchedulerCommand) -> (StatusCode, Json<serde_json::Value>) {
    if state.scheduler().send(command).await {
        (StatusCode::ACCEPTED, Json(json!({ "accepted": format!("{:?}", command) })))
    } else {
        tracing::warn!("Dropped {:?}: detection loop is not running", command);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "detection loop is not running" })),
        )
    }
}
