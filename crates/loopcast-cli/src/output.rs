//! Output renderers for CLI commands.

use std::io::Write;

use anyhow::anyhow;
use loopcast_api::{LogsResponse, PlaylistResponse};
use loopcast_core::SessionSnapshot;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

pub(crate) fn render_snapshot(snapshot: &SessionSnapshot, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(snapshot)?,
        OutputFormat::Table => {
            println!("status: {}", snapshot.status.as_str());
            if let Some(id) = snapshot.session_id {
                println!("session: {id}");
            }
            if let Some(pid) = snapshot.pid {
                println!("pid: {pid}");
            }
            if let Some(shape) = snapshot.shape {
                println!("shape: {}", shape.as_str());
            }
            for (index, source) in snapshot.sources.iter().enumerate() {
                println!("source[{index}]: {} ({})", source.value(), source.kind().as_str());
            }
            if let Some(started) = snapshot.started_at {
                println!("started: {started}");
            }
            if let Some(stopped) = snapshot.stopped_at {
                println!("stopped: {stopped}");
            }
            if let Some(code) = snapshot.exit_code {
                println!("exit code: {code}");
            }
            if let Some(reason) = &snapshot.failure {
                println!("failure: {reason}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_logs(logs: &LogsResponse, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(logs)?,
        OutputFormat::Table => {
            for entry in &logs.entries {
                println!(
                    "{:>6} {} {}",
                    entry.id,
                    entry.timestamp.format("%H:%M:%S"),
                    entry.line
                );
            }
            if let Some(last) = logs.last_id {
                println!("next cursor: {last}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_playlist(playlist: &PlaylistResponse, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(playlist)?,
        OutputFormat::Table => {
            println!("playlist: {}", playlist.location);
            for entry in &playlist.entries {
                println!("  {entry}");
            }
        }
    }
    Ok(())
}

/// Write one streamed log line. JSON output emits one compact object per line.
pub(crate) fn write_log_line<W: Write>(
    writer: &mut W,
    id: u64,
    line: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let result = match format {
        OutputFormat::Table => writeln!(writer, "{line}"),
        OutputFormat::Json => writeln!(writer, "{}", json!({ "id": id, "line": line })),
    };
    result
        .and_then(|()| writer.flush())
        .map_err(|err| CliError::failure(anyhow!("failed to write log line: {err}")))
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_log_line_is_raw_text() {
        let mut written = Vec::new();
        write_log_line(&mut written, 3, "frame=1", OutputFormat::Table).expect("write");
        assert_eq!(written, b"frame=1\n");
    }
}
