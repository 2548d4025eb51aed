//! Fallback values applied when a `LOOPCAST_*` variable is unset.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Relay binary resolved through `PATH`.
pub const FFMPEG_PROGRAM: &str = "ffmpeg";
/// Directory holding transferred media.
pub const MEDIA_DIR: &str = "media";
/// Concat-list descriptor location.
pub const PLAYLIST_PATH: &str = "playlist.txt";
/// YouTube Live primary ingest.
pub const INGEST_TEMPLATE: &str = "rtmp://a.rtmp.youtube.com/live2/{key}";
/// Retained relay log lines.
pub const LOG_CAPACITY: usize = 25;
/// Upper bound for retained relay log lines.
pub const MAX_LOG_CAPACITY: usize = 10_000;
/// Window between `SIGTERM` and `SIGKILL`.
pub const STOP_GRACE: Duration = Duration::from_secs(5);
/// Upper bound for the stop grace window, in seconds.
pub const MAX_STOP_GRACE_SECS: u64 = 300;
/// Control API bind address; loopback only unless overridden.
pub const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// Control API port.
pub const HTTP_PORT: u16 = 7070;
/// Log level when neither `RUST_LOG` nor `LOOPCAST_LOG_LEVEL` is set.
pub const LOG_LEVEL: &str = "info";
