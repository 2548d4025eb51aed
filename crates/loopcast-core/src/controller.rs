//! Single-session controller.
//!
//! # Design
//! - All status writes happen under one lock, and every write is published on a `watch`
//!   channel so stop callers and observers see the same ordered sequence.
//! - The start sequence runs in its own task: a caller that disconnects mid-start does not
//!   strand the controller in `starting`.
//! - Exit monitors only finalize the session they were spawned for.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::log_buffer::{LogBuffer, LogStream};
use crate::model::{
    LogEntry, LogId, PlaylistDescriptor, SessionConfig, SessionId, SessionSnapshot,
    SessionStatus, SourceReference,
};
use crate::playlist::PlaylistBuilder;
use crate::resolver::SourceResolver;
use crate::supervisor::{ProcessSupervisor, RelayExit, RelayProcess};

/// Façade enforcing at most one active relay session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: SourceResolver,
    playlist: PlaylistBuilder,
    supervisor: ProcessSupervisor,
    logs: LogBuffer,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<SessionSnapshot>,
    queue: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct SessionState {
    snapshot: SessionSnapshot,
    cancel: Option<CancellationToken>,
    process: Option<RelayProcess>,
}

impl SessionController {
    /// Compose a controller from its collaborators.
    #[must_use]
    pub fn new(
        resolver: SourceResolver,
        playlist: PlaylistBuilder,
        supervisor: ProcessSupervisor,
        logs: LogBuffer,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                resolver,
                playlist,
                supervisor,
                logs,
                state: Mutex::new(SessionState::default()),
                status_tx,
                queue: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Resolve `sources`, build the playlist, and launch the relay.
    ///
    /// # Errors
    ///
    /// - `SessionAlreadyActive` when a session is starting, running, or stopping.
    /// - `EmptyPlaylist` when `sources` is empty.
    /// - `InvalidConfig` when the stream key or ingest template is blank.
    /// - Resolution and playlist errors; the previous status is restored.
    /// - `LaunchFailed`; the session ends `failed`.
    /// - `Cancelled` when a stop arrives before the relay is launched.
    #[instrument(name = "session.start", skip_all, fields(sources = sources.len(), shape = config.shape().as_str()))]
    pub async fn start_session(
        &self,
        sources: Vec<SourceReference>,
        config: SessionConfig,
    ) -> SessionResult<SessionSnapshot> {
        let (session_id, cancel, previous) = {
            let mut state = self.inner.lock();
            if state.snapshot.status.is_active() {
                return Err(SessionError::SessionAlreadyActive {
                    session_id: state.snapshot.session_id,
                    status: state.snapshot.status,
                });
            }
            if sources.is_empty() {
                return Err(SessionError::EmptyPlaylist);
            }
            validate_config(&config)?;

            let session_id = Uuid::new_v4();
            let cancel = CancellationToken::new();
            let previous = std::mem::replace(
                &mut state.snapshot,
                SessionSnapshot {
                    session_id: Some(session_id),
                    status: SessionStatus::Starting,
                    shape: Some(config.shape()),
                    sources: sources.clone(),
                    started_at: Some(Utc::now()),
                    ..SessionSnapshot::default()
                },
            );
            state.cancel = Some(cancel.clone());
            state.process = None;
            self.inner.publish(&state);
            (session_id, cancel, previous)
        };

        self.inner.logs.clear();
        self.inner.logs.append(format!(
            "session {session_id} starting with {} source(s)",
            sources.len()
        ));
        info!(%session_id, "session starting");

        let inner = Arc::clone(&self.inner);
        let start = tokio::spawn(async move {
            inner
                .run_start(session_id, sources, config, cancel, previous)
                .await
        });
        match start.await {
            Ok(result) => result,
            Err(source) => {
                self.inner
                    .abandon(session_id, "session start task did not complete");
                Err(SessionError::TaskAborted { source })
            }
        }
    }

    /// Resolve `sources` and rewrite the playlist without launching the relay.
    ///
    /// # Errors
    ///
    /// Returns `SessionAlreadyActive` while a session is active, `EmptyPlaylist` for an
    /// empty source list, and any resolution or playlist error.
    #[instrument(name = "session.prepare_playlist", skip_all, fields(sources = sources.len()))]
    pub async fn prepare_playlist(
        &self,
        sources: &[SourceReference],
    ) -> SessionResult<PlaylistDescriptor> {
        self.ensure_inactive()?;
        if sources.is_empty() {
            return Err(SessionError::EmptyPlaylist);
        }
        let descriptor = self.inner.prepare(sources).await?;
        info!(
            entries = descriptor.len(),
            path = %descriptor.location().display(),
            "playlist prepared"
        );
        Ok(descriptor)
    }

    /// Stop the active session and wait until it is no longer active.
    ///
    /// Idempotent: when no session is active the current snapshot is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `TerminationFailed` when the relay could not be signalled.
    #[instrument(name = "session.stop", skip_all)]
    pub async fn stop_session(&self) -> SessionResult<SessionSnapshot> {
        let mut status_rx = self.inner.status_tx.subscribe();
        let process = {
            let mut state = self.inner.lock();
            match state.snapshot.status {
                SessionStatus::Idle | SessionStatus::Stopped | SessionStatus::Failed => {
                    return Ok(state.snapshot.clone());
                }
                SessionStatus::Starting => {
                    if let Some(cancel) = state.cancel.take() {
                        cancel.cancel();
                    }
                    state.snapshot.status = SessionStatus::Stopping;
                    self.inner.publish(&state);
                    None
                }
                SessionStatus::Running => {
                    state.snapshot.status = SessionStatus::Stopping;
                    self.inner.publish(&state);
                    state.process.clone()
                }
                SessionStatus::Stopping => state.process.clone(),
            }
        };

        if let Some(process) = process {
            self.inner.logs.append("stop requested");
            if let Err(err) = process.terminate().await {
                warn!(pid = process.pid(), error = %err, "relay termination failed");
                self.inner.revert_stop(process.pid());
                return Err(err);
            }
        }

        let settled = status_rx
            .wait_for(|snapshot| !snapshot.status.is_active())
            .await
            .map(|snapshot| snapshot.clone());
        Ok(settled.unwrap_or_else(|_| self.snapshot()))
    }

    /// Stop any active session before the host exits.
    ///
    /// # Errors
    ///
    /// Returns `TerminationFailed` when the relay could not be signalled.
    pub async fn shutdown(&self) -> SessionResult<SessionSnapshot> {
        info!("session controller shutting down");
        self.stop_session().await
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.lock().snapshot.status
    }

    /// Observer view of the current or most recent session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().snapshot.clone()
    }

    /// Retained log lines, oldest first.
    #[must_use]
    pub fn recent_logs(&self) -> Vec<LogEntry> {
        self.inner.logs.snapshot()
    }

    /// Retained log lines newer than `since`.
    #[must_use]
    pub fn logs_since(&self, since: LogId) -> Vec<LogEntry> {
        self.inner.logs.since(since)
    }

    /// Follow new log lines, replaying retained lines newer than `since` first.
    #[must_use]
    pub fn subscribe_logs(&self, since: Option<LogId>) -> LogStream {
        self.inner.logs.subscribe(since)
    }

    /// Follow snapshot changes.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.status_tx.subscribe()
    }

    /// Log buffer shared with the supervisor.
    #[must_use]
    pub fn logs(&self) -> &LogBuffer {
        &self.inner.logs
    }

    fn ensure_inactive(&self) -> SessionResult<()> {
        let state = self.inner.lock();
        if state.snapshot.status.is_active() {
            return Err(SessionError::SessionAlreadyActive {
                session_id: state.snapshot.session_id,
                status: state.snapshot.status,
            });
        }
        Ok(())
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.status_tx.send_replace(state.snapshot.clone());
    }

    async fn prepare(&self, sources: &[SourceReference]) -> SessionResult<PlaylistDescriptor> {
        let _queue = self.queue.lock().await;
        let built = match self.resolver.resolve_all(sources).await {
            Ok(assets) => self.playlist.build(&assets).await,
            Err(err) => Err(err),
        };
        if built.is_err() {
            self.playlist.discard().await;
        }
        built
    }

    async fn run_start(
        self: Arc<Self>,
        session_id: SessionId,
        sources: Vec<SourceReference>,
        config: SessionConfig,
        cancel: CancellationToken,
        previous: SessionSnapshot,
    ) -> SessionResult<SessionSnapshot> {
        let prepared = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.prepare(&sources) => Some(result),
        };
        let descriptor = match prepared {
            None => return Err(self.cancelled(session_id)),
            Some(Err(err)) => return Err(self.restore(session_id, previous, err)),
            Some(Ok(descriptor)) => descriptor,
        };

        let mut state = self.lock();
        if cancel.is_cancelled() || state.snapshot.session_id != Some(session_id) {
            drop(state);
            return Err(self.cancelled(session_id));
        }

        match self.supervisor.launch(&descriptor, &config, &self.logs) {
            Ok(process) => {
                state.snapshot.status = SessionStatus::Running;
                state.snapshot.pid = Some(process.pid());
                state.cancel = None;
                state.process = Some(process.clone());
                self.publish(&state);
                let snapshot = state.snapshot.clone();
                drop(state);

                info!(%session_id, pid = process.pid(), "session running");
                let monitor = Arc::clone(&self);
                tokio::spawn(async move {
                    let exit = process.wait().await;
                    monitor.finish(session_id, &exit);
                });
                Ok(snapshot)
            }
            Err(err) => {
                let detail = err.detail();
                state.snapshot.status = SessionStatus::Failed;
                state.snapshot.stopped_at = Some(Utc::now());
                state.snapshot.failure = Some(detail.clone());
                state.cancel = None;
                self.publish(&state);
                drop(state);

                self.logs.append(format!("relay launch failed: {detail}"));
                warn!(%session_id, error = %err, detail = %detail, "relay launch failed");
                Err(err)
            }
        }
    }

    fn cancelled(&self, session_id: SessionId) -> SessionError {
        {
            let mut state = self.lock();
            if state.snapshot.session_id == Some(session_id) {
                state.snapshot.status = SessionStatus::Stopped;
                state.snapshot.stopped_at = Some(Utc::now());
                state.cancel = None;
                self.publish(&state);
            }
        }
        self.logs.append("session start cancelled");
        info!(%session_id, "session start cancelled");
        SessionError::Cancelled { session_id }
    }

    fn restore(
        &self,
        session_id: SessionId,
        previous: SessionSnapshot,
        err: SessionError,
    ) -> SessionError {
        let detail = err.detail();
        {
            let mut state = self.lock();
            if state.snapshot.session_id == Some(session_id) {
                state.snapshot = SessionSnapshot {
                    failure: Some(detail.clone()),
                    ..previous
                };
                state.cancel = None;
                self.publish(&state);
            }
        }
        self.logs.append(format!("session start failed: {detail}"));
        warn!(%session_id, error = %err, detail = %detail, "session start failed");
        err
    }

    fn abandon(&self, session_id: SessionId, reason: &str) {
        let mut state = self.lock();
        if state.snapshot.session_id == Some(session_id) && state.snapshot.status.is_active() {
            state.snapshot.status = SessionStatus::Failed;
            state.snapshot.stopped_at = Some(Utc::now());
            state.snapshot.failure = Some(reason.to_string());
            state.cancel = None;
            self.publish(&state);
        }
    }

    fn revert_stop(&self, pid: u32) {
        let mut state = self.lock();
        if state.snapshot.status == SessionStatus::Stopping && state.snapshot.pid == Some(pid) {
            state.snapshot.status = SessionStatus::Running;
            self.publish(&state);
        }
    }

    fn finish(&self, session_id: SessionId, exit: &RelayExit) {
        let mut state = self.lock();
        if state.snapshot.session_id != Some(session_id) {
            return;
        }
        let stop_requested = exit.requested || state.snapshot.status == SessionStatus::Stopping;
        let status = if stop_requested || exit.success() {
            SessionStatus::Stopped
        } else {
            SessionStatus::Failed
        };
        state.snapshot.status = status;
        state.snapshot.pid = None;
        state.snapshot.exit_code = exit.code;
        state.snapshot.stopped_at = Some(Utc::now());
        if status == SessionStatus::Failed {
            state.snapshot.failure = Some(format!("relay exited unexpectedly ({})", exit.describe()));
        }
        state.process = None;
        self.publish(&state);
        drop(state);

        info!(%session_id, status = %status, exit = %exit.describe(), "session finished");
    }
}

fn validate_config(config: &SessionConfig) -> SessionResult<()> {
    if config.stream_key().is_blank() {
        return Err(SessionError::InvalidConfig {
            field: "stream_key",
            reason: "must not be blank",
        });
    }
    if config.ingest_template().trim().is_empty() {
        return Err(SessionError::InvalidConfig {
            field: "ingest_template",
            reason: "must not be blank",
        });
    }
    Ok(())
}
