use std::future::Future;
use std::sync::Arc;

use loopcast_api::ApiServer;
use loopcast_config::RelaySettings;
use loopcast_core::{
    DriveTransfer, LogBuffer, PlaylistBuilder, ProcessSupervisor, SessionController,
    SourceResolver, Transfer,
};
use loopcast_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, init_logging};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const BUILD_SHA: &str = match option_env!("LOOPCAST_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Services wired from [`RelaySettings`].
pub struct Services {
    /// Session controller shared with the API.
    pub controller: SessionController,
    /// Control API bound to the controller.
    pub api: ApiServer,
}

/// Wire the controller and API from `settings`, transferring remote sources with `transfer`.
#[must_use]
pub fn build_services(settings: &RelaySettings, transfer: Arc<dyn Transfer>) -> Services {
    let controller = SessionController::new(
        SourceResolver::new(settings.media_dir.clone(), transfer),
        PlaylistBuilder::new(settings.playlist_path.clone()),
        ProcessSupervisor::new(settings.ffmpeg_program.clone()).with_stop_grace(settings.stop_grace),
        LogBuffer::with_capacity(settings.log_capacity),
    );
    let api = ApiServer::new(controller.clone(), settings.ingest_template.clone());
    Services { controller, api }
}

/// Entry point for the Loopcast host boot sequence.
///
/// Loads settings from the environment, installs logging, and serves the control API
/// until `SIGINT` or `SIGTERM`.
///
/// # Errors
///
/// Returns an error if settings are invalid, logging cannot be installed, the listener
/// cannot be bound, or the relay cannot be stopped on shutdown.
#[allow(clippy::future_not_send)]
pub async fn run_app() -> AppResult<()> {
    let settings =
        RelaySettings::from_env().map_err(|err| AppError::config("settings.from_env", err))?;

    let format = settings
        .log_format
        .as_deref()
        .and_then(LogFormat::parse)
        .unwrap_or_else(LogFormat::infer);
    init_logging(&LoggingConfig {
        level: &settings.log_level,
        format,
        build_sha: BUILD_SHA,
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("serve");

    log_settings(&settings);

    let shutdown = shutdown_signal()?;
    serve_until(&settings, shutdown).await
}

/// Serve the control API on `settings.socket_addr()` until `shutdown` resolves, then
/// stop any active relay session.
///
/// # Errors
///
/// Returns an error if the transfer client cannot be built, the listener cannot be
/// bound, serving fails, or the relay cannot be stopped.
pub async fn serve_until<F>(settings: &RelaySettings, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let transfer = DriveTransfer::new().map_err(|err| AppError::transfer("drive.new", err))?;
    let services = build_services(settings, Arc::new(transfer));

    let addr = settings.socket_addr();
    if !settings.is_loopback() {
        warn!(addr = %addr, "control api is reachable beyond loopback and has no authentication");
    }
    let listener = TcpListener::bind(addr).await.map_err(|source| {
        AppError::api_server("api_server.bind", loopcast_api::ApiServerError::Bind { addr, source })
    })?;

    serve_listener(services, listener, shutdown).await
}

/// Serve `services` on `listener` until `shutdown` resolves.
///
/// The relay is stopped as soon as `shutdown` resolves, before the server drains its
/// connections, so a connected log follower cannot hold the relay open.
///
/// # Errors
///
/// Returns an error if serving fails or the relay cannot be stopped.
pub async fn serve_listener<F>(services: Services, listener: TcpListener, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Services { controller, api } = services;
    let (stopped_tx, stopped_rx) = oneshot::channel();
    let stop_controller = controller.clone();
    let shutdown = async move {
        shutdown.await;
        info!("shutting down relay session");
        let _ = stopped_tx.send(stop_controller.shutdown().await);
    };

    let serve_result = api.serve_listener(listener, shutdown).await;
    info!("control api stopped");

    // The signal future never completed when serving failed on its own.
    let stopped = match stopped_rx.await {
        Ok(stopped) => stopped,
        Err(_) => controller.shutdown().await,
    };
    let final_snapshot = stopped.map_err(|err| AppError::session("controller.shutdown", err))?;
    info!(status = %final_snapshot.status, "relay session shut down");

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))
}

/// Summarize the loaded settings. Runs once logging is installed.
fn log_settings(settings: &RelaySettings) {
    info!(
        ffmpeg = %settings.ffmpeg_program,
        media_dir = %settings.media_dir.display(),
        playlist = %settings.playlist_path.display(),
        log_capacity = settings.log_capacity,
        stop_grace_secs = settings.stop_grace.as_secs(),
        addr = %settings.socket_addr(),
        "relay settings loaded"
    );
}

fn shutdown_signal() -> AppResult<impl Future<Output = ()> + Send + 'static> {
    let mut terminate =
        signal(SignalKind::terminate()).map_err(|err| AppError::io("signal.sigterm", err))?;
    Ok(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to listen for ctrl-c; shutting down");
                } else {
                    info!("interrupt received; shutting down");
                }
            }
            _ = terminate.recv() => info!("terminate signal received; shutting down"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcast_core::SessionStatus;
    use loopcast_test_support::mocks::RecordingTransfer;
    use std::io;
    use std::sync::{Mutex, PoisonError};

    #[test]
    fn services_follow_settings() {
        let settings = RelaySettings {
            log_capacity: 7,
            ..RelaySettings::default()
        };
        let services = build_services(&settings, Arc::new(RecordingTransfer::default()));
        assert_eq!(services.controller.logs().capacity(), 7);
        assert_eq!(services.controller.status(), SessionStatus::Idle);
    }

    #[derive(Clone, Default)]
    struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn settings_summary_reaches_installed_subscriber() {
        let output = CapturedOutput::default();
        let writer = output.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            log_settings(&RelaySettings::default());
        });

        let captured = output.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let text = String::from_utf8(captured).expect("utf-8 log output");
        assert!(text.contains("relay settings loaded"));
        assert!(text.contains("127.0.0.1:7070"));
    }

    #[test]
    fn build_sha_is_never_empty() {
        assert!(!BUILD_SHA.is_empty());
    }
}
