use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use loopcast_core::{
    LogBuffer, OutputShape, PlaylistBuilder, ProcessSupervisor, SessionConfig, SessionController,
    SessionError, SessionSnapshot, SessionStatus, SourceReference, SourceResolver, StreamKey,
};
use loopcast_test_support::fixtures::{
    RELAY_CRASH_LINE, RELAY_STARTED_LINE, RELAY_TERMINATING_LINE, fake_relays, share_link,
};
use loopcast_test_support::mocks::RecordingTransfer;
use tempfile::TempDir;
use tokio::time::{Instant, sleep, timeout};

const ID: &str = "1AbCdEfGhIjKlMnOpQ";
const WAIT: Duration = Duration::from_secs(10);
const INGEST: &str = "rtmp://a.rtmp.youtube.com/live2/{key}";

struct Harness {
    dir: TempDir,
    controller: SessionController,
    transfer: Arc<RecordingTransfer>,
}

impl Harness {
    fn new(program: String, grace: Duration) -> Result<Self> {
        let dir = TempDir::new()?;
        let transfer = Arc::new(RecordingTransfer::default());
        let controller = SessionController::new(
            SourceResolver::new(dir.path().join("media"), transfer.clone()),
            PlaylistBuilder::new(dir.path().join("playlist.txt")),
            ProcessSupervisor::new(program).with_stop_grace(grace),
            LogBuffer::with_capacity(25),
        );
        Ok(Self {
            dir,
            controller,
            transfer,
        })
    }

    fn looping() -> Result<Self> {
        Self::new(fake_relays()?.looping(), Duration::from_secs(5))
    }

    fn media_dir(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    fn lines(&self) -> Vec<String> {
        self.controller
            .recent_logs()
            .into_iter()
            .map(|entry| entry.line)
            .collect()
    }

    async fn wait_for_line(&self, needle: &str) -> Result<String> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(line) = self.lines().into_iter().find(|line| line.contains(needle)) {
                return Ok(line);
            }
            if Instant::now() >= deadline {
                bail!("log line containing {needle:?} never appeared: {:?}", self.lines());
            }
            sleep(Duration::from_millis(25)).await;
        }
    }

    async fn wait_for_status(&self, status: SessionStatus) -> Result<SessionSnapshot> {
        let mut updates = self.controller.subscribe_status();
        let snapshot = timeout(WAIT, updates.wait_for(|snapshot| snapshot.status == status))
            .await??
            .clone();
        Ok(snapshot)
    }
}

fn config(key: &str, shape: OutputShape) -> SessionConfig {
    SessionConfig::new(INGEST, StreamKey::new(key), shape)
}

#[tokio::test]
async fn remote_source_runs_until_stopped() -> Result<()> {
    let harness = Harness::looping()?;

    let running = harness
        .controller
        .start_session(
            vec![SourceReference::remote(share_link(ID))],
            config("K1", OutputShape::Normal),
        )
        .await?;
    assert_eq!(running.status, SessionStatus::Running);
    assert!(running.pid.is_some());
    assert!(running.session_id.is_some());
    assert_eq!(harness.transfer.calls(), vec![ID.to_string()]);

    harness.wait_for_line(RELAY_STARTED_LINE).await?;
    let launch = harness.wait_for_line("launching relay:").await?;
    assert!(launch.contains("-stream_loop -1"));
    assert!(launch.ends_with("live2/****"));
    harness.wait_for_line("frame=2 fps=30").await?;

    let stopped = timeout(WAIT, harness.controller.stop_session()).await??;
    assert_eq!(stopped.status, SessionStatus::Stopped);
    assert_eq!(stopped.session_id, running.session_id);
    assert_eq!(stopped.pid, None);
    assert_eq!(stopped.exit_code, Some(0));
    assert!(stopped.stopped_at.is_some());

    harness.wait_for_line(RELAY_TERMINATING_LINE).await?;
    let marker = harness.wait_for_line("relay stopped (").await?;
    assert_eq!(marker, "relay stopped (exit code 0)");
    Ok(())
}

#[tokio::test]
async fn stream_key_never_reaches_observers() -> Result<()> {
    let harness = Harness::looping()?;
    let secret = "zz-very-secret-key-zz";
    let source = harness.dir.path().join("intro.mp4");
    tokio::fs::write(&source, b"video").await?;

    let running = harness
        .controller
        .start_session(
            vec![SourceReference::local(source.display().to_string())],
            config(secret, OutputShape::Normal),
        )
        .await?;
    let args = harness.wait_for_line("args:").await?;
    assert!(args.contains("live2/****"));

    let stopped = timeout(WAIT, harness.controller.stop_session()).await??;
    for snapshot in [&running, &stopped] {
        assert!(!serde_json::to_string(snapshot)?.contains(secret));
    }
    assert!(harness.lines().iter().all(|line| !line.contains(secret)));
    Ok(())
}

#[tokio::test]
async fn shorts_mode_requests_scale_filter() -> Result<()> {
    let harness = Harness::looping()?;

    harness
        .controller
        .start_session(
            vec![SourceReference::remote(share_link(ID))],
            config("K1", OutputShape::Shorts),
        )
        .await?;
    let args = harness.wait_for_line("args:").await?;
    assert!(args.contains("-vf scale=720:1280"));
    assert_eq!(harness.controller.snapshot().shape, Some(OutputShape::Shorts));

    timeout(WAIT, harness.controller.stop_session()).await??;
    Ok(())
}

#[tokio::test]
async fn crash_marks_session_failed() -> Result<()> {
    let harness = Harness::new(fake_relays()?.crashing(), Duration::from_secs(5))?;

    harness
        .controller
        .start_session(
            vec![SourceReference::remote(share_link(ID))],
            config("K1", OutputShape::Normal),
        )
        .await?;

    let failed = harness.wait_for_status(SessionStatus::Failed).await?;
    assert_eq!(failed.exit_code, Some(3));
    assert!(failed.failure.as_deref().is_some_and(|reason| reason.contains("exit code 3")));
    harness.wait_for_line(RELAY_CRASH_LINE).await?;
    harness.wait_for_line("relay stopped (exit code 3)").await?;

    let after = timeout(WAIT, harness.controller.stop_session()).await??;
    assert_eq!(after.status, SessionStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn stubborn_relay_is_killed_after_grace() -> Result<()> {
    let harness = Harness::new(fake_relays()?.stubborn(), Duration::from_millis(200))?;

    harness
        .controller
        .start_session(
            vec![SourceReference::remote(share_link(ID))],
            config("K1", OutputShape::Normal),
        )
        .await?;
    harness.wait_for_line("ignoring SIGTERM").await?;

    let stopped = timeout(WAIT, harness.controller.stop_session()).await??;
    assert_eq!(stopped.status, SessionStatus::Stopped);
    assert_eq!(stopped.exit_code, None);
    harness.wait_for_line("relay stopped (signal SIGKILL)").await?;
    Ok(())
}

#[tokio::test]
async fn second_start_while_running_has_no_side_effects() -> Result<()> {
    let harness = Harness::looping()?;
    let link = SourceReference::remote(share_link(ID));

    harness
        .controller
        .start_session(vec![link.clone()], config("K1", OutputShape::Normal))
        .await?;
    harness.wait_for_line(RELAY_STARTED_LINE).await?;
    let before = harness.controller.snapshot();
    let logs_before = harness.controller.logs().last_id();

    let err = harness
        .controller
        .start_session(vec![link], config("K2", OutputShape::Shorts))
        .await
        .expect_err("second start must be rejected");
    assert!(matches!(
        err,
        SessionError::SessionAlreadyActive {
            status: SessionStatus::Running,
            ..
        }
    ));
    assert_eq!(harness.controller.snapshot(), before);
    assert!(harness.controller.logs().last_id() >= logs_before);
    assert!(harness.lines().iter().any(|line| line.contains(RELAY_STARTED_LINE)));

    timeout(WAIT, harness.controller.stop_session()).await??;
    Ok(())
}

#[tokio::test]
async fn concurrent_stops_share_one_exit() -> Result<()> {
    let harness = Harness::looping()?;
    harness
        .controller
        .start_session(
            vec![SourceReference::remote(share_link(ID))],
            config("K1", OutputShape::Normal),
        )
        .await?;
    harness.wait_for_line(RELAY_STARTED_LINE).await?;

    let (first, second) = tokio::join!(
        harness.controller.stop_session(),
        harness.controller.stop_session()
    );
    assert_eq!(first?.status, SessionStatus::Stopped);
    assert_eq!(second?.status, SessionStatus::Stopped);

    let again = timeout(WAIT, harness.controller.stop_session()).await??;
    assert_eq!(again.status, SessionStatus::Stopped);
    let markers = harness
        .lines()
        .iter()
        .filter(|line| line.starts_with("relay stopped ("))
        .count();
    assert_eq!(markers, 1);
    Ok(())
}

#[tokio::test]
async fn restart_reuses_resolved_assets_and_clears_logs() -> Result<()> {
    let harness = Harness::looping()?;
    let sources = vec![SourceReference::remote(share_link(ID))];

    let first = harness
        .controller
        .start_session(sources.clone(), config("K1", OutputShape::Normal))
        .await?;
    harness.wait_for_line(RELAY_STARTED_LINE).await?;
    timeout(WAIT, harness.controller.stop_session()).await??;
    harness.wait_for_line("relay stopped (").await?;

    let second = harness
        .controller
        .start_session(sources, config("K1", OutputShape::Normal))
        .await?;
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(harness.transfer.calls().len(), 1);
    assert!(harness.lines().iter().all(|line| !line.starts_with("relay stopped (")));

    timeout(WAIT, harness.controller.stop_session()).await??;
    Ok(())
}

#[tokio::test]
async fn malformed_reference_creates_no_files() -> Result<()> {
    let harness = Harness::looping()?;

    let err = harness
        .controller
        .start_session(
            vec![SourceReference::remote("https://drive.google.com/drive/my-drive")],
            config("K1", OutputShape::Normal),
        )
        .await
        .expect_err("malformed reference");
    assert!(matches!(err, SessionError::InvalidReference { .. }));
    assert_eq!(harness.controller.status(), SessionStatus::Idle);
    assert!(!harness.media_dir().exists());
    assert!(harness.transfer.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_sources_keep_controller_idle() -> Result<()> {
    let harness = Harness::looping()?;

    let err = harness
        .controller
        .start_session(Vec::new(), config("K1", OutputShape::Normal))
        .await
        .expect_err("empty sources");
    assert!(matches!(err, SessionError::EmptyPlaylist));
    assert_eq!(harness.controller.status(), SessionStatus::Idle);
    Ok(())
}
