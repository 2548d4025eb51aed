//! Relay process supervision.
//!
//! # Design
//! - Exactly one child per [`RelayProcess`]; the child runs in its own process group so
//!   a stop reaches every process it forked.
//! - stdout and stderr share one pipe, so lines reach the log buffer in the order the
//!   relay wrote them.
//! - A single supervise task owns the `Child`: it waits for exit, delivers stop signals,
//!   and escalates to `SIGKILL` once the grace window has passed.

pub mod command;
mod drain;
mod lines;

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, warn};

use self::command::RelayCommand;
use self::drain::drain_output;
use crate::error::{SessionError, SessionResult};
use crate::log_buffer::LogBuffer;
use crate::model::{PlaylistDescriptor, SessionConfig};

/// Grace window between `SIGTERM` and `SIGKILL`.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);
/// Relay binary used when none is configured.
pub const DEFAULT_PROGRAM: &str = "ffmpeg";

const DRAIN_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);
const STOP_QUEUE: usize = 4;

type StopReply = oneshot::Sender<SessionResult<()>>;

/// How a relay process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayExit {
    /// Exit code when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal when the process was killed.
    pub signal: Option<i32>,
    /// `true` when a stop had been requested before the exit.
    pub requested: bool,
    /// Wait failure reported by the OS, if any.
    pub error: Option<String>,
}

impl RelayExit {
    fn from_status(status: ExitStatus, requested: bool) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
            requested,
            error: None,
        }
    }

    fn from_wait_error(err: &io::Error, requested: bool) -> Self {
        Self {
            code: None,
            signal: None,
            requested,
            error: Some(err.to_string()),
        }
    }

    fn lost() -> Self {
        Self {
            code: None,
            signal: None,
            requested: false,
            error: Some("supervisor task ended without reporting".to_string()),
        }
    }

    /// `true` for a zero exit code.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Short description such as `exit code 1` or `signal SIGTERM`.
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(error) = &self.error {
            return format!("wait failed: {error}");
        }
        if let Some(code) = self.code {
            return format!("exit code {code}");
        }
        match self.signal {
            Some(raw) => Signal::try_from(raw).map_or_else(
                |_| format!("signal {raw}"),
                |signal| format!("signal {}", signal.as_str()),
            ),
            None => "unknown status".to_string(),
        }
    }
}

/// Handle to a launched relay. Clones refer to the same process.
#[derive(Clone)]
pub struct RelayProcess {
    pid: u32,
    started_at: DateTime<Utc>,
    command: Arc<RelayCommand>,
    stop: mpsc::Sender<StopReply>,
    exit: watch::Receiver<Option<RelayExit>>,
}

impl RelayProcess {
    /// OS process id, which is also the process group id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Time the process was spawned.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Command the process was launched with.
    #[must_use]
    pub fn command(&self) -> &RelayCommand {
        &self.command
    }

    /// Exit outcome, if the process has already exited.
    #[must_use]
    pub fn try_exit(&self) -> Option<RelayExit> {
        self.exit.borrow().clone()
    }

    /// Ask the relay to stop. Returns once the signal has been delivered; use
    /// [`RelayProcess::wait`] to observe the exit.
    ///
    /// # Errors
    ///
    /// Returns `TerminationFailed` when the process group could not be signalled.
    pub async fn terminate(&self) -> SessionResult<()> {
        let (reply, outcome) = oneshot::channel();
        if self.stop.send(reply).await.is_err() {
            return Ok(());
        }
        outcome.await.unwrap_or(Ok(()))
    }

    /// Wait until the process has exited and its output has been drained.
    pub async fn wait(&self) -> RelayExit {
        let mut exit = self.exit.clone();
        let reported = exit
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| value.as_ref().cloned());
        reported
            .or_else(|| exit.borrow().clone())
            .unwrap_or_else(RelayExit::lost)
    }
}

impl std::fmt::Debug for RelayProcess {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RelayProcess")
            .field("pid", &self.pid)
            .field("started_at", &self.started_at)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

/// Launches and stops relay processes.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    program: String,
    stop_grace: Duration,
}

impl ProcessSupervisor {
    /// Supervisor running `program` with the default grace window.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Override the window between `SIGTERM` and `SIGKILL`.
    #[must_use]
    pub const fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    /// Relay binary.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Grace window between `SIGTERM` and `SIGKILL`.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    /// Deterministic relay invocation for `descriptor` and `config`.
    #[must_use]
    pub fn command(&self, descriptor: &PlaylistDescriptor, config: &SessionConfig) -> RelayCommand {
        RelayCommand::build(self.program.clone(), descriptor, config)
    }

    /// Spawn the relay and start draining its output into `logs`.
    ///
    /// Must be called from within a Tokio runtime; the drain and supervise tasks are
    /// spawned onto it.
    ///
    /// # Errors
    ///
    /// Returns `LaunchFailed` when the output pipe or the process cannot be created.
    pub fn launch(
        &self,
        descriptor: &PlaylistDescriptor,
        config: &SessionConfig,
        logs: &LogBuffer,
    ) -> SessionResult<RelayProcess> {
        let command = Arc::new(self.command(descriptor, config));
        let launch_failed = |source: io::Error| SessionError::LaunchFailed {
            program: self.program.clone(),
            source,
        };

        let (read_end, write_end) = output_pipe().map_err(launch_failed)?;
        let stderr_end = write_end.try_clone().map_err(launch_failed)?;

        let mut process = Command::new(command.program());
        process
            .args(command.os_args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(write_end))
            .stderr(Stdio::from(stderr_end))
            .process_group(0)
            .kill_on_drop(true);
        let spawned = process.spawn();
        // Release the parent's write ends so the drain sees EOF when the relay exits.
        drop(process);
        let mut child = spawned.map_err(launch_failed)?;

        let Some(pid) = child.id() else {
            let _ = child.start_kill();
            return Err(launch_failed(io::Error::other("relay exited before reporting a pid")));
        };
        let reader = pipe::Receiver::from_owned_fd(read_end).map_err(launch_failed)?;

        let started_at = Utc::now();
        logs.append(format!("launching relay: {command}"));
        info!(pid, command = %command, "relay launched");

        let drain = tokio::spawn(drain_output(reader, logs.clone(), Arc::clone(&command)));
        let (stop_tx, stop_rx) = mpsc::channel(STOP_QUEUE);
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(supervise(Supervised {
            child,
            pid,
            stop_grace: self.stop_grace,
            stop_rx,
            exit_tx,
            drain,
            logs: logs.clone(),
        }));

        Ok(RelayProcess {
            pid,
            started_at,
            command,
            stop: stop_tx,
            exit: exit_rx,
        })
    }

    /// Signal `process` to stop and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns `TerminationFailed` when the process group could not be signalled.
    pub async fn terminate(&self, process: &RelayProcess) -> SessionResult<RelayExit> {
        process.terminate().await?;
        Ok(process.wait().await)
    }
}

struct Supervised {
    child: Child,
    pid: u32,
    stop_grace: Duration,
    stop_rx: mpsc::Receiver<StopReply>,
    exit_tx: watch::Sender<Option<RelayExit>>,
    drain: JoinHandle<()>,
    logs: LogBuffer,
}

async fn supervise(mut task: Supervised) {
    let pid = task.pid;
    let mut requested = false;
    let mut stop_open = true;
    let mut kill_at: Option<Instant> = None;

    let status = loop {
        tokio::select! {
            status = task.child.wait() => break status,
            request = task.stop_rx.recv(), if stop_open => {
                let Some(reply) = request else {
                    stop_open = false;
                    continue;
                };
                let outcome = if requested {
                    Ok(())
                } else {
                    requested = true;
                    debug!(pid, "sending SIGTERM to relay process group");
                    deliver(&mut task.child, pid, Signal::SIGTERM)
                };
                if outcome.is_ok() && kill_at.is_none() {
                    kill_at = Some(Instant::now() + task.stop_grace);
                }
                let _ = reply.send(outcome);
            }
            () = sleep_until(kill_at.unwrap_or_else(Instant::now)), if kill_at.is_some() => {
                kill_at = None;
                warn!(pid, grace_secs = task.stop_grace.as_secs(), "relay ignored SIGTERM; killing");
                if let Err(err) = deliver(&mut task.child, pid, Signal::SIGKILL) {
                    warn!(pid, error = %err, "failed to kill relay process group");
                }
            }
        }
    };

    let exit = match status {
        Ok(status) => RelayExit::from_status(status, requested),
        Err(err) => RelayExit::from_wait_error(&err, requested),
    };

    if timeout(DRAIN_FLUSH_TIMEOUT, &mut task.drain).await.is_err() {
        warn!(pid, "relay output still open after exit; abandoning drain");
        task.drain.abort();
    }

    let description = exit.describe();
    task.logs.append(format!("relay stopped ({description})"));
    if exit.success() || exit.requested {
        info!(pid, exit = %description, requested = exit.requested, "relay exited");
    } else {
        warn!(pid, exit = %description, "relay exited unexpectedly");
    }
    task.exit_tx.send_replace(Some(exit));
}

/// Signal the relay's process group; falls back to killing the child directly.
fn deliver(child: &mut Child, pid: u32, signal: Signal) -> SessionResult<()> {
    let Ok(raw) = i32::try_from(pid) else {
        return Err(SessionError::TerminationFailed {
            pid,
            source: Errno::EINVAL,
        });
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => {
            warn!(pid, error = %source, "process group signal failed; killing child");
            child
                .start_kill()
                .map_err(|_| SessionError::TerminationFailed { pid, source })
        }
    }
}

/// Anonymous pipe with close-on-exec set on both ends.
fn output_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let (read_end, write_end) = nix::unistd::pipe().map_err(io::Error::from)?;
    for fd in [&read_end, &write_end] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).map_err(io::Error::from)?;
    }
    Ok((read_end, write_end))
}
