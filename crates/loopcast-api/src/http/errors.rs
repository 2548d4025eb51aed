//! RFC9457-style API error wrapper.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loopcast_core::SessionError;
use loopcast_telemetry::current_request_id;
use tracing::{error, warn};

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONFLICT, PROBLEM_INTERNAL, PROBLEM_LAUNCH_FAILED,
    PROBLEM_UNRESOLVABLE,
};
use crate::models::ProblemDetails;

/// Structured API error rendered as a problem document.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn unresolvable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            PROBLEM_UNRESOLVABLE,
            "source could not be resolved",
        )
        .with_detail(detail)
    }

    pub(crate) fn launch_failed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_LAUNCH_FAILED,
            "relay launch failed",
        )
        .with_detail(detail)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let detail = err.detail();
        match err {
            SessionError::SessionAlreadyActive { .. } | SessionError::Cancelled { .. } => {
                Self::conflict(detail)
            }
            SessionError::InvalidReference { .. }
            | SessionError::EmptyPlaylist
            | SessionError::InvalidConfig { .. } => Self::bad_request(detail),
            SessionError::SourceNotFound { .. } | SessionError::TransferFailed { .. } => {
                Self::unresolvable(detail)
            }
            SessionError::LaunchFailed { .. } => Self::launch_failed(detail),
            SessionError::TerminationFailed { .. }
            | SessionError::TaskAborted { .. }
            | SessionError::Io { .. } => Self::internal(detail),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = current_request_id();
        if self.status.is_server_error() {
            error!(
                status = self.status.as_u16(),
                kind = self.kind,
                detail = self.detail.as_deref(),
                request_id = request_id.as_deref(),
                "request failed"
            );
        } else {
            warn!(
                status = self.status.as_u16(),
                kind = self.kind,
                detail = self.detail.as_deref(),
                request_id = request_id.as_deref(),
                "request rejected"
            );
        }
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}
