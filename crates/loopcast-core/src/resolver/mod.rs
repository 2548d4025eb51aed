//! Source resolution: turn operator references into local, playable files.
//!
//! # Design
//! - Remote links are reduced to a canonical identifier and a deterministic filename so
//!   re-resolving the same link is a cache hit rather than a second transfer.
//! - Transfers write to a `.part` sibling and are renamed into place only on success, so
//!   a failed transfer never looks like a cached file on the next call. The partial file
//!   is removed on failure and also when the resolving future is dropped mid-transfer.
//! - The transfer itself sits behind the [`Transfer`] trait.

pub mod drive;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SessionError, SessionResult};
use crate::model::{ResolvedAsset, SourceKind, SourceReference};

/// Prefix of the deterministic filename used for transferred assets.
pub const ASSET_PREFIX: &str = "drive_";
/// Extension of the deterministic filename used for transferred assets.
pub const ASSET_EXTENSION: &str = "mp4";
const PARTIAL_SUFFIX: &str = ".part";

const MIN_IDENTIFIER_LEN: usize = 10;

/// Errors raised by a transfer implementation.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The HTTP client could not be constructed.
    #[error("transfer client unavailable")]
    Client {
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },
    /// The configured base URL could not produce a download URL.
    #[error("transfer url invalid")]
    InvalidUrl {
        /// URL that failed to parse or join.
        url: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The HTTP request could not be completed.
    #[error("transfer request failed")]
    Http {
        /// URL that was requested.
        url: String,
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },
    /// The remote answered with a non-success status.
    #[error("transfer response status error")]
    Status {
        /// URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The remote kept answering with an HTML page instead of file content.
    #[error("transfer returned an html page")]
    HtmlResponse {
        /// URL that was requested last.
        url: String,
    },
    /// The transfer reported success without producing the target file.
    #[error("transfer produced no output")]
    MissingOutput {
        /// Path that should have been written.
        path: PathBuf,
    },
    /// Local IO failed while writing the transferred content.
    #[error("transfer io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl TransferError {
    /// Build an IO variant.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// External operation that populates a local path from a canonical remote identifier.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Write the content referenced by `identifier` into `target`.
    ///
    /// # Errors
    ///
    /// Returns an error when the content cannot be fetched or written.
    async fn fetch(&self, identifier: &str, target: &Path) -> Result<(), TransferError>;
}

/// Extract the canonical identifier from a share link.
///
/// Accepts the path-segment form (`/file/d/<id>/view`) and the query-parameter form
/// (`open?id=<id>`, `uc?id=<id>`).
#[must_use]
pub fn extract_identifier(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    let from_path = url.path_segments().and_then(|segments| {
        let segments: Vec<&str> = segments.collect();
        segments
            .windows(2)
            .find(|pair| pair[0] == "d")
            .map(|pair| pair[1].to_string())
    });
    from_path.filter(|candidate| is_identifier(candidate)).or_else(|| {
        url.query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
            .filter(|candidate| is_identifier(candidate))
    })
}

fn is_identifier(candidate: &str) -> bool {
    candidate.len() >= MIN_IDENTIFIER_LEN
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Resolves [`SourceReference`]s into [`ResolvedAsset`]s.
#[derive(Clone)]
pub struct SourceResolver {
    media_dir: PathBuf,
    transfer: Arc<dyn Transfer>,
}

impl SourceResolver {
    /// Create a resolver storing transferred assets under `media_dir`.
    #[must_use]
    pub fn new(media_dir: impl Into<PathBuf>, transfer: Arc<dyn Transfer>) -> Self {
        Self {
            media_dir: media_dir.into(),
            transfer,
        }
    }

    /// Directory holding transferred assets.
    #[must_use]
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Deterministic local path for a remote identifier.
    #[must_use]
    pub fn target_path(&self, identifier: &str) -> PathBuf {
        self.media_dir
            .join(format!("{ASSET_PREFIX}{identifier}.{ASSET_EXTENSION}"))
    }

    /// Resolve one reference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` for links without an identifier, `SourceNotFound` for
    /// missing local files, and `TransferFailed` when the transfer fails.
    pub async fn resolve(&self, reference: &SourceReference) -> SessionResult<ResolvedAsset> {
        match reference.kind() {
            SourceKind::RemoteLink => self.resolve_remote(reference).await,
            SourceKind::LocalUpload | SourceKind::LocalExisting => {
                resolve_local(reference).await
            }
        }
    }

    /// Resolve references in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error encountered.
    pub async fn resolve_all(
        &self,
        references: &[SourceReference],
    ) -> SessionResult<Vec<ResolvedAsset>> {
        let mut assets = Vec::with_capacity(references.len());
        for reference in references {
            assets.push(self.resolve(reference).await?);
        }
        Ok(assets)
    }

    async fn resolve_remote(&self, reference: &SourceReference) -> SessionResult<ResolvedAsset> {
        let identifier =
            extract_identifier(reference.value()).ok_or_else(|| SessionError::InvalidReference {
                value: reference.value().to_string(),
                reason: "no_identifier",
            })?;
        let identifier = identifier.as_str();
        let target = self.target_path(identifier);

        if is_readable_file(&target).await {
            debug!(identifier, path = %target.display(), "remote source already present");
            return Ok(ResolvedAsset::new(target, reference.clone()));
        }

        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|source| SessionError::io("create_media_dir", &self.media_dir, source))?;

        let partial = PartialFile::new(partial_path(&target));
        info!(identifier, path = %target.display(), "transferring remote source");
        if let Err(source) = self.transfer.fetch(identifier, partial.path()).await {
            return Err(SessionError::TransferFailed {
                identifier: identifier.to_string(),
                source,
            });
        }

        if !is_readable_file(partial.path()).await {
            return Err(SessionError::TransferFailed {
                identifier: identifier.to_string(),
                source: TransferError::MissingOutput {
                    path: partial.path().to_path_buf(),
                },
            });
        }

        // Another caller may have populated the target meanwhile; keep the existing file.
        if !is_readable_file(&target).await {
            tokio::fs::rename(partial.path(), &target).await.map_err(|source| {
                SessionError::TransferFailed {
                    identifier: identifier.to_string(),
                    source: TransferError::io("promote_partial", &target, source),
                }
            })?;
            partial.disarm();
        }

        Ok(ResolvedAsset::new(target, reference.clone()))
    }
}

async fn resolve_local(reference: &SourceReference) -> SessionResult<ResolvedAsset> {
    let raw = Path::new(reference.value());
    let path = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| SessionError::not_found(raw, Some(source)))?
            .join(raw)
    };

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|source| SessionError::not_found(&path, Some(source)))?;
    if !metadata.is_file() {
        return Err(SessionError::not_found(&path, None));
    }
    tokio::fs::File::open(&path)
        .await
        .map_err(|source| SessionError::not_found(&path, Some(source)))?;

    Ok(ResolvedAsset::new(path, reference.clone()))
}

async fn is_readable_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.is_file() && tokio::fs::File::open(path).await.is_ok(),
        Err(_) => false,
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Staging file of an in-flight transfer, removed on drop unless disarmed.
///
/// Removal is synchronous so the file is gone by the time a cancelled resolution
/// reports back.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    const fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial transfer"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "failed to remove partial transfer");
            }
        }
    }
}
