//! Health endpoint.

use std::sync::Arc;

use axum::{Json, extract::State};
use loopcast_telemetry::build_sha;

use crate::models::HealthResponse;
use crate::state::ApiState;

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        build: build_sha().to_string(),
        session: state.controller.status(),
    })
}
