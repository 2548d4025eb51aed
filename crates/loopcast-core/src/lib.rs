#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Stream session manager for the Loopcast relay.
//!
//! Layout: `model.rs` (domain types), `error.rs` (typed failures), `resolver/` (source
//! resolution and the Drive transfer), `playlist.rs` (concat-list descriptor),
//! `log_buffer.rs` (bounded recent-lines sink), `supervisor/` (relay command, process
//! lifecycle, output drain), `controller.rs` (single-session façade).

pub mod controller;
pub mod error;
pub mod log_buffer;
pub mod model;
pub mod playlist;
pub mod resolver;
pub mod supervisor;

pub use controller::SessionController;
pub use error::{SessionError, SessionResult};
pub use log_buffer::{DEFAULT_LOG_CAPACITY, LogBuffer, LogStream};
pub use model::{
    LogEntry, LogId, OutputShape, PlaylistDescriptor, ResolvedAsset, SessionConfig, SessionId,
    SessionSnapshot, SessionStatus, SourceKind, SourceReference, StreamKey,
};
pub use playlist::PlaylistBuilder;
pub use resolver::{SourceResolver, Transfer, TransferError, drive::DriveTransfer};
pub use supervisor::{ProcessSupervisor, RelayExit, RelayProcess, command::RelayCommand};
