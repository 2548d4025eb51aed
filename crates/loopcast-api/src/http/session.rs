//! Session lifecycle endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use loopcast_core::{SessionSnapshot, SourceReference};
use tracing::info;

use crate::http::errors::ApiError;
use crate::models::{SourceInput, StartSessionRequest};
use crate::state::ApiState;

pub(crate) async fn get_session(State(state): State<Arc<ApiState>>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot())
}

pub(crate) async fn start_session(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let Json(request) = payload?;
    let sources: Vec<SourceReference> = request
        .sources
        .into_iter()
        .map(SourceInput::into_reference)
        .collect();
    let config = state.session_config(request.stream_key, request.shape);

    let snapshot = state.controller.start_session(sources, config).await?;
    info!(
        session_id = ?snapshot.session_id,
        pid = ?snapshot.pid,
        "session started via api"
    );
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub(crate) async fn stop_session(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state.controller.stop_session().await?;
    Ok(Json(snapshot))
}
