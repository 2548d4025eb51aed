use std::io::{self, IsTerminal};

use anyhow::anyhow;
use loopcast_api::StartSessionRequest;
use loopcast_core::SessionSnapshot;
use reqwest::Response;

use crate::cli::{OutputFormat, StartArgs};
use crate::client::{AppContext, CliError, CliResult, classify_problem};
use crate::commands::source_inputs;
use crate::output::render_snapshot;

const SESSION_PATH: &str = "/v1/session";

pub(crate) async fn handle_status(ctx: &AppContext, output: OutputFormat) -> CliResult<()> {
    let snapshot = fetch_snapshot(ctx).await?;
    render_snapshot(&snapshot, output)
}

pub(crate) async fn handle_start(
    ctx: &AppContext,
    args: StartArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let sources = source_inputs(&args.sources)?;
    let shape = args.shape();
    let stream_key = resolve_stream_key(args.stream_key)?;
    let request = StartSessionRequest {
        sources,
        stream_key,
        shape,
    };
    let snapshot = start_session(ctx, &request).await?;
    render_snapshot(&snapshot, output)
}

pub(crate) async fn handle_stop(ctx: &AppContext, output: OutputFormat) -> CliResult<()> {
    let snapshot = stop_session(ctx).await?;
    render_snapshot(&snapshot, output)
}

pub(crate) async fn fetch_snapshot(ctx: &AppContext) -> CliResult<SessionSnapshot> {
    let response = ctx
        .client
        .get(ctx.endpoint(SESSION_PATH)?)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to {SESSION_PATH} failed: {err}")))?;
    read_snapshot(response).await
}

pub(crate) async fn start_session(
    ctx: &AppContext,
    request: &StartSessionRequest,
) -> CliResult<SessionSnapshot> {
    let response = ctx
        .client
        .post(ctx.endpoint(SESSION_PATH)?)
        .json(request)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to {SESSION_PATH} failed: {err}")))?;
    read_snapshot(response).await
}

pub(crate) async fn stop_session(ctx: &AppContext) -> CliResult<SessionSnapshot> {
    let response = ctx
        .client
        .delete(ctx.endpoint(SESSION_PATH)?)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to {SESSION_PATH} failed: {err}")))?;
    read_snapshot(response).await
}

async fn read_snapshot(response: Response) -> CliResult<SessionSnapshot> {
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    response
        .json::<SessionSnapshot>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse session snapshot: {err}")))
}

fn resolve_stream_key(provided: Option<String>) -> CliResult<String> {
    if let Some(key) = provided {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(CliError::validation("stream key cannot be empty"));
        }
        return Ok(trimmed.to_string());
    }

    if io::stdin().is_terminal() {
        let key = rpassword::prompt_password("Stream key: ").map_err(|err| {
            CliError::failure(anyhow!("failed to read stream key from stdin: {err}"))
        })?;
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(CliError::validation("stream key cannot be empty"));
        }
        Ok(trimmed.to_string())
    } else {
        Err(CliError::validation(
            "stream key required; supply --stream-key or LOOPCAST_STREAM_KEY when running non-interactively",
        ))
    }
}
