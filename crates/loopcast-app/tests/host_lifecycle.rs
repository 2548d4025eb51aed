use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use loopcast_app::{AppResult, build_services, serve_listener};
use loopcast_config::RelaySettings;
use loopcast_core::{SessionController, SessionSnapshot, SessionStatus};
use loopcast_test_support::fixtures::{fake_relays, media_file};
use loopcast_test_support::mocks::RecordingTransfer;
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

struct Host {
    dir: TempDir,
    base: String,
    client: reqwest::Client,
    controller: SessionController,
    stop_tx: oneshot::Sender<()>,
    server: JoinHandle<AppResult<()>>,
}

impl Host {
    async fn start() -> Result<Self> {
        let dir = TempDir::new()?;
        let settings = RelaySettings {
            ffmpeg_program: fake_relays()?.looping(),
            media_dir: dir.path().join("media"),
            playlist_path: dir.path().join("playlist.txt"),
            stop_grace: Duration::from_secs(5),
            ..RelaySettings::default()
        };

        let services = build_services(&settings, Arc::new(RecordingTransfer::default()));
        let controller = services.controller.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_listener(services, listener, async move {
            let _ = stop_rx.await;
        }));

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self {
            dir,
            base,
            client,
            controller,
            stop_tx,
            server,
        })
    }

    async fn start_session(&self) -> Result<SessionSnapshot> {
        let clip = media_file(self.dir.path(), "intro.mp4")?;
        let response = self
            .client
            .post(format!("{}/v1/session", self.base))
            .json(&json!({ "sources": [clip.display().to_string()], "stream_key": "host-key" }))
            .send()
            .await?;
        assert_eq!(response.status().as_u16(), 201);
        Ok(response.json().await?)
    }

    async fn shut_down(self) -> Result<SessionController> {
        let _ = self.stop_tx.send(());
        timeout(WAIT, self.server).await???;
        Ok(self.controller)
    }
}

#[tokio::test]
async fn shutdown_stops_the_running_relay() -> Result<()> {
    let host = Host::start().await?;
    let health: serde_json::Value = host
        .client
        .get(format!("{}/health", host.base))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(health["status"], "ok");

    let started = host.start_session().await?;
    assert_eq!(started.status, SessionStatus::Running);

    let controller = host.shut_down().await?;
    let finished = controller.snapshot();
    assert_eq!(finished.status, SessionStatus::Stopped);
    assert_eq!(finished.session_id, started.session_id);
    assert!(finished.pid.is_none());
    Ok(())
}

#[tokio::test]
async fn connected_log_follower_does_not_block_shutdown() -> Result<()> {
    let host = Host::start().await?;
    let started = host.start_session().await?;

    let mut follower = host
        .client
        .get(format!("{}/v1/session/logs/stream", host.base))
        .send()
        .await?
        .error_for_status()?;
    let first = timeout(WAIT, follower.chunk()).await??;
    assert!(first.is_some(), "follower should receive retained lines");

    let controller = host.shut_down().await?;
    let finished = controller.snapshot();
    assert_eq!(finished.status, SessionStatus::Stopped);
    assert_eq!(finished.session_id, started.session_id);

    let drained = timeout(WAIT, async {
        while let Ok(Some(_)) = follower.chunk().await {}
    })
    .await;
    assert!(drained.is_ok(), "log stream should end with the server");
    Ok(())
}
