//! # Design
//!
//! - Provide structured, constant-message errors for the session pipeline.
//! - Capture operation context (paths, identifiers, programs) in fields.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{SessionId, SessionStatus};
use crate::resolver::TransferError;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors produced by the stream session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A remote reference carried no recognizable identifier.
    #[error("invalid source reference")]
    InvalidReference {
        /// Reference as supplied by the caller.
        value: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// A local source did not exist or could not be read.
    #[error("source not found")]
    SourceNotFound {
        /// Path that was checked.
        path: PathBuf,
        /// Underlying IO error when one was reported.
        #[source]
        source: Option<io::Error>,
    },
    /// The transfer of a remote source failed.
    #[error("source transfer failed")]
    TransferFailed {
        /// Canonical remote identifier.
        identifier: String,
        /// Underlying transfer failure.
        source: TransferError,
    },
    /// No assets were supplied for the playlist.
    #[error("playlist is empty")]
    EmptyPlaylist,
    /// The relay process could not be created.
    #[error("relay launch failed")]
    LaunchFailed {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Another session is still starting, running, or stopping.
    #[error("relay session already active")]
    SessionAlreadyActive {
        /// Identifier of the active session.
        session_id: Option<SessionId>,
        /// Status of the active session.
        status: SessionStatus,
    },
    /// The stop signal could not be delivered to the relay.
    #[error("relay termination failed")]
    TerminationFailed {
        /// Process group that was signalled.
        pid: u32,
        /// Underlying errno.
        source: nix::Error,
    },
    /// Session settings were rejected before any work started.
    #[error("invalid session configuration")]
    InvalidConfig {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// A stop request cancelled the session while it was starting.
    #[error("session start cancelled")]
    Cancelled {
        /// Identifier of the cancelled session.
        session_id: SessionId,
    },
    /// The background start task did not complete.
    #[error("session task aborted")]
    TaskAborted {
        /// Underlying join failure.
        source: tokio::task::JoinError,
    },
    /// IO failures while writing session artifacts.
    #[error("session io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl SessionError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(path: impl Into<PathBuf>, source: Option<io::Error>) -> Self {
        Self::SourceNotFound {
            path: path.into(),
            source,
        }
    }

    /// Machine-readable discriminator used by the HTTP and CLI surfaces.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReference { .. } => "invalid_reference",
            Self::SourceNotFound { .. } => "source_not_found",
            Self::TransferFailed { .. } => "transfer_failed",
            Self::EmptyPlaylist => "empty_playlist",
            Self::LaunchFailed { .. } => "launch_failed",
            Self::SessionAlreadyActive { .. } => "session_already_active",
            Self::TerminationFailed { .. } => "termination_failed",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Cancelled { .. } => "cancelled",
            Self::TaskAborted { .. } => "task_aborted",
            Self::Io { .. } => "io",
        }
    }

    /// Human-readable detail including the context fields. Never includes secrets.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidReference { value, reason } => format!("{value}: {reason}"),
            Self::SourceNotFound { path, .. } => format!("{} is missing or unreadable", path.display()),
            Self::TransferFailed { identifier, source } => format!("{identifier}: {source}"),
            Self::EmptyPlaylist => "at least one source is required".to_string(),
            Self::LaunchFailed { program, source } => format!("{program}: {source}"),
            Self::SessionAlreadyActive { session_id, status } => match session_id {
                Some(id) => format!("session {id} is {status}"),
                None => format!("a session is {status}"),
            },
            Self::TerminationFailed { pid, source } => format!("pid {pid}: {source}"),
            Self::InvalidConfig { field, reason } => format!("{field}: {reason}"),
            Self::Cancelled { session_id } => format!("session {session_id} was stopped while starting"),
            Self::TaskAborted { source } => source.to_string(),
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} {}: {source}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn helpers_build_variants_with_sources() {
        let io_err = SessionError::io("write_playlist", "playlist.txt", io::Error::other("io"));
        assert!(matches!(io_err, SessionError::Io { .. }));
        assert!(io_err.source().is_some());
        assert_eq!(io_err.kind(), "io");

        let missing = SessionError::not_found("missing.mp4", None);
        assert!(missing.source().is_none());
        assert_eq!(missing.kind(), "source_not_found");
    }

    #[test]
    fn messages_stay_constant() {
        let err = SessionError::InvalidReference {
            value: "https://example.com/nothing".to_string(),
            reason: "no_identifier",
        };
        assert_eq!(err.to_string(), "invalid source reference");
        assert!(err.detail().contains("no_identifier"));
    }
}
