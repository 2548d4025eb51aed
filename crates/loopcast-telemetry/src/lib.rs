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

//! Telemetry primitives shared across the Loopcast workspace.
//!
//! Layout: `init.rs` (subscriber installation, log format), `context.rs` (application
//! span guard, request context), `layers.rs` (tower-http tracing and request-id layers),
//! `error.rs` (typed failures).

pub mod context;
pub mod error;
pub mod init;
pub mod layers;

pub use context::{GlobalContextGuard, current_request_id, with_request_context};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{http_trace_layer, propagate_request_id_layer, set_request_id_layer};
