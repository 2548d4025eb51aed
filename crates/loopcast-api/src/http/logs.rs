//! Relay log endpoints.
//!
//! # Design
//! - `GET /v1/session/logs` is a pull view over the bounded buffer, paged by `since`.
//! - The SSE stream replays retained lines newer than the cursor, then follows live
//!   output. Reconnecting clients resume from `Last-Event-ID`.
//! - Streams end when the server starts shutting down.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::HeaderMap,
    response::sse::{self, Sse},
};
use futures_util::stream::{self, Stream, StreamExt};
use loopcast_core::{LogEntry, LogId, LogStream};

use crate::http::constants::{HEADER_LAST_EVENT_ID, SSE_KEEP_ALIVE_SECS};
use crate::http::errors::ApiError;
use crate::models::{LogsQuery, LogsResponse};
use crate::state::ApiState;

pub(crate) async fn get_logs(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let Query(query) = query?;
    let entries = match query.since {
        Some(since) => state.controller.logs_since(since),
        None => state.controller.recent_logs(),
    };
    Ok(Json(LogsResponse::new(entries)))
}

pub(crate) async fn stream_logs(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<sse::Event, Infallible>> + Send>, ApiError> {
    let Query(query) = query?;
    let cursor = query.since.or_else(|| last_event_id(&headers)).unwrap_or(0);
    let shutdown = state.shutdown.clone();
    let stream = log_events(state.controller.subscribe_logs(Some(cursor)))
        .take_until(async move { shutdown.cancelled().await });

    Ok(Sse::new(stream).keep_alive(
        sse::KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    ))
}

fn last_event_id(headers: &HeaderMap) -> Option<LogId> {
    headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn log_events(logs: LogStream) -> impl Stream<Item = Result<sse::Event, Infallible>> + Send {
    stream::unfold(logs, |mut logs| async move {
        let entry = logs.next().await?;
        Some((Ok(log_event(&entry)), logs))
    })
}

fn log_event(entry: &LogEntry) -> sse::Event {
    sse::Event::default()
        .event("log")
        .id(entry.id.to_string())
        .data(entry.line.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn last_event_id_parses_numeric_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(last_event_id(&headers), None);
        headers.insert(HEADER_LAST_EVENT_ID, HeaderValue::from_static(" 42 "));
        assert_eq!(last_event_id(&headers), Some(42));
        headers.insert(HEADER_LAST_EVENT_ID, HeaderValue::from_static("abc"));
        assert_eq!(last_event_id(&headers), None);
    }
}
