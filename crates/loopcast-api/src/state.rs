//! Shared handler state.

use loopcast_core::{OutputShape, SessionConfig, SessionController, StreamKey};
use tokio_util::sync::CancellationToken;

pub(crate) struct ApiState {
    pub(crate) controller: SessionController,
    /// Cancelled when the server begins graceful shutdown; ends open log streams.
    pub(crate) shutdown: CancellationToken,
    ingest_template: String,
}

impl ApiState {
    pub(crate) const fn new(
        controller: SessionController,
        ingest_template: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            shutdown,
            ingest_template,
        }
    }

    pub(crate) fn session_config(&self, stream_key: String, shape: OutputShape) -> SessionConfig {
        SessionConfig::new(self.ingest_template.clone(), StreamKey::new(stream_key), shape)
    }
}
