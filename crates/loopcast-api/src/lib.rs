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

//! HTTP control API for the Loopcast session controller.
//!
//! Layout: `models.rs` (request/response DTOs shared with the CLI), `state.rs` (handler
//! state), `error.rs` (server bootstrap failures), `http/` (router, handlers, problem
//! responses).

pub mod error;
pub mod http;
pub mod models;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::{
    HealthResponse, LogsResponse, PlaylistRequest, PlaylistResponse, ProblemDetails,
    SourceInput, StartSessionRequest,
};
