#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Loopcast host bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (settings, telemetry, service wiring, serve loop), `error.rs`
//! (application failures).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level error type.
pub mod error;

pub use bootstrap::{Services, build_services, run_app, serve_listener, serve_until};
pub use error::{AppError, AppResult};
