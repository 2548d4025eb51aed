//! Typed settings for the relay host.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::defaults;

/// Validated host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelaySettings {
    /// Relay binary (name resolved through `PATH`, or an absolute path).
    pub ffmpeg_program: String,
    /// Directory holding transferred media.
    pub media_dir: PathBuf,
    /// Concat-list descriptor location.
    pub playlist_path: PathBuf,
    /// Ingest endpoint template, e.g. `rtmp://a.rtmp.youtube.com/live2/{key}`.
    pub ingest_template: String,
    /// Retained relay log lines.
    pub log_capacity: usize,
    /// Window between `SIGTERM` and `SIGKILL` when stopping the relay.
    #[serde(with = "duration_secs")]
    pub stop_grace: Duration,
    /// Control API bind address.
    pub bind_addr: IpAddr,
    /// Control API port.
    pub http_port: u16,
    /// Log level directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format (`json` or `pretty`); inferred from the build when unset.
    pub log_format: Option<String>,
}

impl RelaySettings {
    /// Socket address the control API listens on.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }

    /// `true` when the control API is reachable only from this host.
    #[must_use]
    pub const fn is_loopback(&self) -> bool {
        self.bind_addr.is_loopback()
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            ffmpeg_program: defaults::FFMPEG_PROGRAM.to_string(),
            media_dir: PathBuf::from(defaults::MEDIA_DIR),
            playlist_path: PathBuf::from(defaults::PLAYLIST_PATH),
            ingest_template: defaults::INGEST_TEMPLATE.to_string(),
            log_capacity: defaults::LOG_CAPACITY,
            stop_grace: defaults::STOP_GRACE,
            bind_addr: defaults::BIND_ADDR,
            http_port: defaults::HTTP_PORT,
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_loopback() {
        let settings = RelaySettings::default();
        assert!(settings.is_loopback());
        assert_eq!(settings.socket_addr().port(), 7070);
        assert_eq!(settings.log_capacity, 25);
    }

    #[test]
    fn serializes_grace_as_seconds() -> anyhow::Result<()> {
        let value = serde_json::to_value(RelaySettings::default())?;
        assert_eq!(value["stop_grace"], 5);
        assert_eq!(value["bind_addr"], "127.0.0.1");
        Ok(())
    }
}
