//! Request and response bodies for the control API.
//!
//! Shared with the CLI so both ends agree on the wire format.

use std::fmt;

use loopcast_core::{LogEntry, LogId, OutputShape, PlaylistDescriptor, SessionStatus, SourceReference};
use serde::{Deserialize, Serialize};

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A source as accepted on the wire: a bare link/path or an explicit reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceInput {
    /// Free-form link or path, classified by [`SourceReference::parse`].
    Raw(String),
    /// Reference with an explicit resolution kind.
    Typed(SourceReference),
}

impl SourceInput {
    /// Convert into a domain reference.
    #[must_use]
    pub fn into_reference(self) -> SourceReference {
        match self {
            Self::Raw(raw) => SourceReference::parse(&raw),
            Self::Typed(reference) => reference,
        }
    }
}

impl From<&str> for SourceInput {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

/// Body of `POST /v1/session`.
#[derive(Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    /// Sources in playback order.
    pub sources: Vec<SourceInput>,
    /// Ingest stream key; held in memory only.
    pub stream_key: String,
    /// Requested output shape.
    #[serde(default)]
    pub shape: OutputShape,
}

impl fmt::Debug for StartSessionRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StartSessionRequest")
            .field("sources", &self.sources)
            .field("stream_key", &loopcast_core::model::REDACTED)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Body of `POST /v1/playlist`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistRequest {
    /// Sources in playback order.
    pub sources: Vec<SourceInput>,
}

/// Summary of a freshly written playlist descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistResponse {
    /// Descriptor location.
    pub location: String,
    /// Absolute asset paths in playback order.
    pub entries: Vec<String>,
}

impl From<&PlaylistDescriptor> for PlaylistResponse {
    fn from(descriptor: &PlaylistDescriptor) -> Self {
        Self {
            location: descriptor.location().display().to_string(),
            entries: descriptor
                .entries()
                .iter()
                .map(|entry| entry.display().to_string())
                .collect(),
        }
    }
}

/// Query string of `GET /v1/session/logs`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LogsQuery {
    /// Return only entries newer than this identifier.
    #[serde(default)]
    pub since: Option<LogId>,
}

/// Body of `GET /v1/session/logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsResponse {
    /// Retained entries, oldest first.
    pub entries: Vec<LogEntry>,
    /// Identifier of the newest entry returned, usable as the next `since` cursor.
    #[serde(default)]
    pub last_id: Option<LogId>,
}

impl LogsResponse {
    /// Wrap entries, deriving the next cursor.
    #[must_use]
    pub fn new(entries: Vec<LogEntry>) -> Self {
        let last_id = entries.last().map(|entry| entry.id);
        Self { entries, last_id }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while the server answers.
    pub status: String,
    /// Build identifier.
    pub build: String,
    /// Status of the current or most recent session.
    pub session: SessionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcast_core::SourceKind;
    use serde_json::json;

    #[test]
    fn sources_accept_strings_and_references() -> anyhow::Result<()> {
        let request: PlaylistRequest = serde_json::from_value(json!({
            "sources": [
                "https://drive.google.com/file/d/abc/view",
                { "kind": "local_upload", "value": "uploads/intro.mp4" },
                "/srv/media/outro.mp4"
            ]
        }))?;
        let kinds: Vec<SourceKind> = request
            .sources
            .into_iter()
            .map(|source| source.into_reference().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::RemoteLink,
                SourceKind::LocalUpload,
                SourceKind::LocalExisting
            ]
        );
        Ok(())
    }

    #[test]
    fn start_request_defaults_shape_and_hides_key() -> anyhow::Result<()> {
        let request: StartSessionRequest = serde_json::from_value(json!({
            "sources": ["a.mp4"],
            "stream_key": "live-secret"
        }))?;
        assert_eq!(request.shape, OutputShape::Normal);
        assert!(!format!("{request:?}").contains("live-secret"));
        Ok(())
    }

    #[test]
    fn problem_type_is_renamed() -> anyhow::Result<()> {
        let problem = ProblemDetails {
            kind: "https://loopcast.dev/problems/conflict".into(),
            title: "conflict".into(),
            status: 409,
            detail: None,
        };
        let value = serde_json::to_value(&problem)?;
        assert_eq!(value["type"], "https://loopcast.dev/problems/conflict");
        assert!(value.get("detail").is_none());
        Ok(())
    }
}
