//! Router construction and server host for the control API.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use loopcast_core::SessionController;
use loopcast_telemetry::{
    http_trace_layer, propagate_request_id_layer, set_request_id_layer, with_request_context,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::info;

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::health::health;
use crate::http::logs::{get_logs, stream_logs};
use crate::http::playlist::prepare_playlist;
use crate::http::session::{get_session, start_session, stop_session};
use crate::state::ApiState;

/// Axum router wrapper hosting the control API.
pub struct ApiServer {
    router: Router,
    shutdown: CancellationToken,
}

impl ApiServer {
    /// Construct the API over `controller`. Sessions push to `ingest_template` with the
    /// key supplied in each start request.
    #[must_use]
    pub fn new(controller: SessionController, ingest_template: impl Into<String>) -> Self {
        let shutdown = CancellationToken::new();
        let state = Arc::new(ApiState::new(
            controller,
            ingest_template.into(),
            shutdown.clone(),
        ));
        let layered = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(propagate_request_id_layer())
            .layer(http_trace_layer())
            .layer(middleware::from_fn(request_context));

        let router = Self::build_router().layer(layered).with_state(state);
        Self { router, shutdown }
    }

    fn build_router() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route(
                "/v1/session",
                get(get_session).post(start_session).delete(stop_session),
            )
            .route("/v1/session/logs", get(get_logs))
            .route("/v1/session/logs/stream", get(stream_logs))
            .route("/v1/playlist", post(prepare_playlist))
    }

    /// Router with state and layers applied.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind `addr` and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns `Bind` when the listener cannot be created and `Serve` when the server
    /// loop fails.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Once `shutdown` resolves, open log streams end so graceful shutdown does not wait
    /// on followers.
    ///
    /// # Errors
    ///
    /// Returns `Serve` when the server loop fails.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "control api listening");
        }
        let streams = self.shutdown;
        let shutdown = async move {
            shutdown.await;
            streams.cancel();
        };
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}

async fn request_context(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(HEADER_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    with_request_context(request_id, next.run(request)).await
}
