//! Domain types shared by the resolver, playlist builder, supervisor, and controller.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each started relay session.
pub type SessionId = Uuid;

/// Sequential identifier assigned to each log entry.
pub type LogId = u64;

/// Placeholder substituted with the stream key inside an ingest template.
pub const STREAM_KEY_PLACEHOLDER: &str = "{key}";

/// Mask printed wherever the stream key would otherwise appear.
pub const REDACTED: &str = "****";

/// How a source reference becomes a local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Remote share link that must be transferred to local storage.
    RemoteLink,
    /// File uploaded by the operator into local storage.
    LocalUpload,
    /// File that already exists on local storage.
    LocalExisting,
}

impl SourceKind {
    /// Machine-friendly label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteLink => "remote_link",
            Self::LocalUpload => "local_upload",
            Self::LocalExisting => "local_existing",
        }
    }
}

/// Immutable reference to a video source supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceReference {
    kind: SourceKind,
    value: String,
}

impl SourceReference {
    /// Construct a reference with an explicit resolution kind.
    #[must_use]
    pub fn new(kind: SourceKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Reference to a remote share link.
    #[must_use]
    pub fn remote(link: impl Into<String>) -> Self {
        Self::new(SourceKind::RemoteLink, link)
    }

    /// Reference to a file already present on local storage.
    #[must_use]
    pub fn local(path: impl Into<String>) -> Self {
        Self::new(SourceKind::LocalExisting, path)
    }

    /// Reference to a file the operator uploaded to local storage.
    #[must_use]
    pub fn upload(path: impl Into<String>) -> Self {
        Self::new(SourceKind::LocalUpload, path)
    }

    /// Classify a free-form input: `http(s)://` links are remote, anything else is a
    /// local path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Self::remote(trimmed)
        } else {
            Self::local(trimmed)
        }
    }

    /// Resolution kind.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Link or path as supplied.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Local file produced by the resolver for a given reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    path: PathBuf,
    source: SourceReference,
}

impl ResolvedAsset {
    pub(crate) const fn new(path: PathBuf, source: SourceReference) -> Self {
        Self { path, source }
    }

    /// Local path ready for playback.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reference the asset was resolved from.
    #[must_use]
    pub const fn source(&self) -> &SourceReference {
        &self.source
    }
}

/// Ordered queue written to disk for the relay engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistDescriptor {
    location: PathBuf,
    entries: Vec<PathBuf>,
}

impl PlaylistDescriptor {
    pub(crate) const fn new(location: PathBuf, entries: Vec<PathBuf>) -> Self {
        Self { location, entries }
    }

    /// Location of the descriptor file.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Absolute asset paths in playback order.
    #[must_use]
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Number of queued assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false` for descriptors produced by the builder.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output aspect variant requested for the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputShape {
    /// Keep the source geometry.
    #[default]
    Normal,
    /// Portrait 720x1280 output for shorts.
    Shorts,
}

impl OutputShape {
    /// Machine-friendly label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Shorts => "shorts",
        }
    }
}

/// Secret stream key. Never printed in clear text.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    /// Wrap a stream key.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the clear-text key. Only the relay argv should need this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `true` when the key is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "StreamKey({REDACTED})")
    }
}

/// Ingest settings for one session. Held in memory only.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    ingest_template: String,
    stream_key: StreamKey,
    shape: OutputShape,
}

impl SessionConfig {
    /// Build a session configuration.
    #[must_use]
    pub fn new(ingest_template: impl Into<String>, stream_key: StreamKey, shape: OutputShape) -> Self {
        Self {
            ingest_template: ingest_template.into(),
            stream_key,
            shape,
        }
    }

    /// Endpoint template, e.g. `rtmp://a.rtmp.youtube.com/live2/{key}`.
    #[must_use]
    pub fn ingest_template(&self) -> &str {
        &self.ingest_template
    }

    /// Stream key.
    #[must_use]
    pub const fn stream_key(&self) -> &StreamKey {
        &self.stream_key
    }

    /// Requested output shape.
    #[must_use]
    pub const fn shape(&self) -> OutputShape {
        self.shape
    }

    /// Fully assembled ingest URL including the clear-text key.
    #[must_use]
    pub fn ingest_url(&self) -> String {
        substitute_key(&self.ingest_template, self.stream_key.expose())
    }

    /// Ingest URL with the key masked.
    #[must_use]
    pub fn redacted_ingest_url(&self) -> String {
        substitute_key(&self.ingest_template, REDACTED)
    }
}

fn substitute_key(template: &str, key: &str) -> String {
    if template.contains(STREAM_KEY_PLACEHOLDER) {
        template.replace(STREAM_KEY_PLACEHOLDER, key)
    } else {
        format!("{}/{key}", template.trim_end_matches('/'))
    }
}

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has been started.
    #[default]
    Idle,
    /// Sources are being resolved and the relay is being launched.
    Starting,
    /// The relay process is running.
    Running,
    /// A stop was requested and the relay is shutting down.
    Stopping,
    /// The relay exited after a stop request or cleanly on its own.
    Stopped,
    /// The relay could not be launched or exited abnormally.
    Failed,
}

impl SessionStatus {
    /// `true` while a session occupies the controller.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Machine-friendly label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Observer view of the current or most recent session. Never carries the stream key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Identifier of the session, absent before the first start.
    pub session_id: Option<SessionId>,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Process id of the relay while it is alive.
    pub pid: Option<u32>,
    /// Output shape requested for the session.
    pub shape: Option<OutputShape>,
    /// Sources queued for the session.
    #[serde(default)]
    pub sources: Vec<SourceReference>,
    /// Time the start request was accepted.
    pub started_at: Option<DateTime<Utc>>,
    /// Time the session reached a terminal status.
    pub stopped_at: Option<DateTime<Utc>>,
    /// Exit code reported by the relay, when it exited normally.
    pub exit_code: Option<i32>,
    /// Reason for a failed or aborted start.
    pub failure: Option<String>,
}

/// One line of relay or session output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Sequential identifier, monotonic across the controller lifetime.
    pub id: LogId,
    /// Time the line was appended.
    pub timestamp: DateTime<Utc>,
    /// Line text without trailing line terminators.
    pub line: String,
}
