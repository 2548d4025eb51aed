//! Output drain: forwards merged relay output into the log buffer.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::command::RelayCommand;
use super::lines::LineSplitter;
use crate::log_buffer::LogBuffer;

const READ_CHUNK: usize = 8 * 1024;

/// Read `reader` until EOF, appending each redacted line to `logs` in emission order.
pub(crate) async fn drain_output<R>(mut reader: R, logs: LogBuffer, command: Arc<RelayCommand>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut chunk = vec![0_u8; READ_CHUNK];
    let mut forwarded = 0_u64;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => {
                for line in splitter.push(&chunk[..read]) {
                    logs.append(command.redact(&line));
                    forwarded += 1;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(error = %err, "relay output read failed");
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        logs.append(command.redact(&line));
        forwarded += 1;
    }
    debug!(lines = forwarded, "relay output drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OutputShape, PlaylistDescriptor, SessionConfig, StreamKey};
    use std::path::PathBuf;

    fn command() -> Arc<RelayCommand> {
        let descriptor = PlaylistDescriptor::new(PathBuf::from("/tmp/playlist.txt"), Vec::new());
        let config = SessionConfig::new("rtmp://ingest/{key}", StreamKey::new("sekret"), OutputShape::Normal);
        Arc::new(RelayCommand::build("ffmpeg", &descriptor, &config))
    }

    #[tokio::test]
    async fn forwards_lines_in_order_and_redacts() {
        let logs = LogBuffer::with_capacity(10);
        let output: &[u8] = b"Output #0, flv, to 'rtmp://ingest/sekret':\nframe=1\rframe=2\rtail";

        drain_output(output, logs.clone(), command()).await;

        let lines: Vec<String> = logs.snapshot().into_iter().map(|entry| entry.line).collect();
        assert_eq!(
            lines,
            vec![
                "Output #0, flv, to 'rtmp://ingest/****':",
                "frame=1",
                "frame=2",
                "tail",
            ]
        );
    }
}
