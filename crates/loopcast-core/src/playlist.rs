//! Concat-list descriptor for the relay engine.
//!
//! The descriptor is rewritten wholesale on every build: content goes to a temporary
//! sibling first and is renamed over the well-known location, so the relay never reads a
//! half-written queue.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::model::{PlaylistDescriptor, ResolvedAsset};

const TEMP_SUFFIX: &str = ".tmp";

/// Writes [`PlaylistDescriptor`]s to a fixed location.
#[derive(Debug, Clone)]
pub struct PlaylistBuilder {
    location: PathBuf,
}

impl PlaylistBuilder {
    /// Builder writing the descriptor to `location`.
    #[must_use]
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Well-known descriptor location.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Write the concat-list for `assets`, replacing any previous descriptor.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPlaylist` when `assets` is empty (nothing is written),
    /// `SourceNotFound` when an asset has disappeared, and `Io` when the descriptor cannot
    /// be written.
    pub async fn build(&self, assets: &[ResolvedAsset]) -> SessionResult<PlaylistDescriptor> {
        if assets.is_empty() {
            return Err(SessionError::EmptyPlaylist);
        }

        let mut entries = Vec::with_capacity(assets.len());
        for asset in assets {
            let absolute = tokio::fs::canonicalize(asset.path())
                .await
                .map_err(|source| SessionError::not_found(asset.path(), Some(source)))?;
            entries.push(absolute);
        }

        let body = render(&entries);
        if let Some(parent) = self.location.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SessionError::io("create_playlist_dir", parent, source))?;
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, body.as_bytes())
            .await
            .map_err(|source| SessionError::io("write_playlist", &staging, source))?;
        if let Err(source) = tokio::fs::rename(&staging, &self.location).await {
            remove_if_present(&staging).await;
            return Err(SessionError::io("replace_playlist", &self.location, source));
        }

        info!(
            path = %self.location.display(),
            entries = entries.len(),
            "playlist written"
        );
        Ok(PlaylistDescriptor::new(self.location.clone(), entries))
    }

    /// Remove the descriptor so no stale queue survives a failed preparation.
    pub async fn discard(&self) {
        remove_if_present(&self.location).await;
        debug!(path = %self.location.display(), "playlist discarded");
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.location.as_os_str().to_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }
}

/// Render concat-demuxer lines: `file '<path>'` with single quotes escaped as `'\''`.
fn render(entries: &[PathBuf]) -> String {
    let mut body = String::new();
    for entry in entries {
        let escaped = entry.to_string_lossy().replace('\'', r"'\''");
        body.push_str("file '");
        body.push_str(&escaped);
        body.push_str("'\n");
    }
    body
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(error = %err, path = %path.display(), "failed to remove playlist file"),
    }
}
