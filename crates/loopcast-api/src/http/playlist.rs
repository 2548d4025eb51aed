//! Playlist preparation endpoint.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use loopcast_core::SourceReference;

use crate::http::errors::ApiError;
use crate::models::{PlaylistRequest, PlaylistResponse, SourceInput};
use crate::state::ApiState;

pub(crate) async fn prepare_playlist(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<PlaylistRequest>, JsonRejection>,
) -> Result<Json<PlaylistResponse>, ApiError> {
    let Json(request) = payload?;
    let sources: Vec<SourceReference> = request
        .sources
        .into_iter()
        .map(SourceInput::into_reference)
        .collect();
    let descriptor = state.controller.prepare_playlist(&sources).await?;
    Ok(Json(PlaylistResponse::from(&descriptor)))
}
