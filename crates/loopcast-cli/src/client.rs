//! Shared client utilities and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use loopcast_api::ProblemDetails;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "Last-Event-ID";

/// Error surfaced to the operator; the variant picks the exit code.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// HTTP client and base URL shared by every command.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
}

impl AppContext {
    /// Build a context whose client tags every request with `trace_id`.
    pub(crate) fn new(base_url: Url, timeout: Duration, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, base_url })
    }

    /// Resolve an API path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }
}

/// `--api-url` value parser.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Turn a non-success response into a CLI error.
///
/// Problems the operator can fix (bad input, an active session, an unresolvable source)
/// are validation errors; everything else is a failure carrying the HTTP status.
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let problem = serde_json::from_slice::<ProblemDetails>(&body).ok();

    let message = match &problem {
        Some(ProblemDetails {
            detail: Some(detail),
            ..
        }) => detail.clone(),
        Some(problem) => problem.title.clone(),
        None => String::from_utf8_lossy(&body).trim().to_string(),
    };

    let operator_fixable = matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    );
    if operator_fixable {
        return CliError::validation(message);
    }
    if message.is_empty() {
        return CliError::failure(anyhow!("request failed with status {status}"));
    }
    CliError::failure(anyhow!("{message} (status {})", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn exit_codes_distinguish_validation() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
    }

    #[test]
    fn parse_url_rejects_invalid_input() {
        let err = parse_url("not-a-url").expect_err("invalid URL should fail");
        assert!(err.contains("invalid URL"));
    }

    #[tokio::test]
    async fn conflict_problem_is_a_validation_error() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/session");
            then.status(409)
                .header("content-type", "application/problem+json")
                .json_body(json!({
                    "type": "https://loopcast.dev/problems/conflict",
                    "title": "conflict",
                    "status": 409,
                    "detail": "session is running"
                }));
        });
        let response = reqwest::get(format!("{}/v1/session", server.base_url())).await?;
        let err = classify_problem(response).await;
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "session is running");
        Ok(())
    }

    #[tokio::test]
    async fn gateway_problem_is_a_failure() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/session");
            then.status(502).json_body(json!({
                "type": "https://loopcast.dev/problems/launch-failed",
                "title": "relay launch failed",
                "status": 502,
                "detail": "ffmpeg: not found"
            }));
        });
        let response = reqwest::get(format!("{}/v1/session", server.base_url())).await?;
        let err = classify_problem(response).await;
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.display_message(), "ffmpeg: not found (status 502)");
        Ok(())
    }
}
