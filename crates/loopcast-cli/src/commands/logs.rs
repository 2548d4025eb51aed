use std::io::{self, Write};
use std::time::Duration;

use anyhow::anyhow;
use futures_util::StreamExt;
use loopcast_api::LogsResponse;

use crate::cli::{LogsArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult, HEADER_LAST_EVENT_ID, classify_problem};
use crate::output::{render_logs, write_log_line};

const LOGS_PATH: &str = "/v1/session/logs";
const STREAM_PATH: &str = "/v1/session/logs/stream";
/// Upper bound for a single follow connection; the loop reconnects afterwards.
const FOLLOW_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub(crate) async fn handle_logs(
    ctx: &AppContext,
    args: LogsArgs,
    output: OutputFormat,
) -> CliResult<()> {
    if args.follow {
        return follow_logs(ctx, &args, output).await;
    }
    let logs = fetch_logs(ctx, args.since).await?;
    render_logs(&logs, output)
}

pub(crate) async fn fetch_logs(ctx: &AppContext, since: Option<u64>) -> CliResult<LogsResponse> {
    let mut url = ctx.endpoint(LOGS_PATH)?;
    if let Some(since) = since {
        url.query_pairs_mut()
            .append_pair("since", &since.to_string());
    }

    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to {LOGS_PATH} failed: {err}")))?;
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    response
        .json::<LogsResponse>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to parse log entries: {err}")))
}

async fn follow_logs(ctx: &AppContext, args: &LogsArgs, output: OutputFormat) -> CliResult<()> {
    let mut resume_id = args.since;
    let retry = Duration::from_secs(args.retry_secs);

    loop {
        let builder = ctx
            .client
            .get(ctx.endpoint(STREAM_PATH)?)
            .timeout(FOLLOW_TIMEOUT);
        let builder = if let Some(id) = resume_id {
            builder.header(HEADER_LAST_EVENT_ID, id.to_string())
        } else {
            builder
        };

        let response = match builder.send().await {
            Ok(resp) => resp,
            Err(err) => {
                eprintln!(
                    "log stream connection failed: {err}. retrying in {}s",
                    args.retry_secs
                );
                tokio::time::sleep(retry).await;
                continue;
            }
        };

        if !response.status().is_success() {
            return Err(classify_problem(response).await);
        }

        let mut stdout = io::stdout();
        match stream_log_lines(response, &mut stdout, output, resume_id).await {
            Ok(last_id) => resume_id = last_id,
            Err(err) => {
                eprintln!(
                    "log stream error: {}. retrying in {}s",
                    err.display_message(),
                    args.retry_secs
                );
            }
        }
        tokio::time::sleep(retry).await;
    }
}

/// Copy `log` events from an SSE response to `writer`, skipping ids at or below
/// `last_seen`. Returns the newest id written.
pub(crate) async fn stream_log_lines<W: Write>(
    response: reqwest::Response,
    writer: &mut W,
    output: OutputFormat,
    mut last_seen: Option<u64>,
) -> CliResult<Option<u64>> {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut current_id: Option<u64> = None;
    let mut current_data: Vec<String> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|err| CliError::failure(anyhow!("failed to read log stream: {err}")))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim_end_matches('\r').to_string();
            buffer.drain(..=pos);

            if line.is_empty() {
                let id = current_id.take();
                if current_data.is_empty() {
                    continue;
                }
                let payload = current_data.join("\n");
                current_data.clear();
                let Some(id) = id else {
                    continue;
                };
                if last_seen.is_some_and(|seen| id <= seen) {
                    continue;
                }
                last_seen = Some(id);
                write_log_line(writer, id, &payload, output)?;
            } else if let Some(data) = line.strip_prefix("data:") {
                current_data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            } else if let Some(id) = line.strip_prefix("id:")
                && let Ok(value) = id.trim().parse::<u64>()
            {
                current_id = Some(value);
            }
        }
    }

    Ok(last_seen)
}
