//! HTTP surface modules (router, handlers, problem responses).

/// Shared constants and header names.
pub mod constants;
/// Problem response helpers and error mapping.
pub(crate) mod errors;
/// Health endpoint.
pub(crate) mod health;
/// Relay log endpoints (snapshot and server-sent events).
pub(crate) mod logs;
/// Playlist preparation endpoint.
pub(crate) mod playlist;
/// Router construction and server host.
pub mod router;
/// Session start/stop/status endpoints.
pub(crate) mod session;
