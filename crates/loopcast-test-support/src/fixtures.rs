//! Fake relay binaries and media files.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

/// Line printed by the looping relay before it starts its loop.
pub const RELAY_STARTED_LINE: &str = "fake relay started";
/// Line printed by the looping relay when it receives `SIGTERM`.
pub const RELAY_TERMINATING_LINE: &str = "fake relay terminating";
/// Line printed by the crashing relay before it exits with code 3.
pub const RELAY_CRASH_LINE: &str = "fake relay crashed";

const LOOPING: &str = r#"#!/bin/sh
trap 'echo "fake relay terminating"; exit 0' TERM
echo "fake relay started"
echo "args: $*"
printf 'frame=1 fps=0\rframe=2 fps=30\r'
echo
while true; do sleep 0.1; done
"#;

const CRASHING: &str = r#"#!/bin/sh
echo "fake relay crashed" >&2
exit 3
"#;

const STUBBORN: &str = r#"#!/bin/sh
trap '' TERM
echo "fake relay ignoring SIGTERM"
while true; do sleep 0.1; done
"#;

/// Executable shell scripts standing in for the relay binary.
#[derive(Debug)]
pub struct FakeRelays {
    _dir: TempDir,
    looping: PathBuf,
    crashing: PathBuf,
    stubborn: PathBuf,
}

impl FakeRelays {
    /// Relay that loops until `SIGTERM`, then exits 0.
    #[must_use]
    pub fn looping(&self) -> String {
        self.looping.display().to_string()
    }

    /// Relay that exits with code 3 immediately.
    #[must_use]
    pub fn crashing(&self) -> String {
        self.crashing.display().to_string()
    }

    /// Relay that ignores `SIGTERM` and must be killed.
    #[must_use]
    pub fn stubborn(&self) -> String {
        self.stubborn.display().to_string()
    }
}

static RELAYS: OnceLock<Result<FakeRelays, String>> = OnceLock::new();

/// Process-wide fake relays.
///
/// The scripts are written once, before any test in the process can spawn them, so no
/// exec races with a write handle still open in a concurrently forked child.
///
/// # Errors
///
/// Returns an error when the scripts cannot be written.
pub fn fake_relays() -> Result<&'static FakeRelays> {
    RELAYS
        .get_or_init(|| write_relays().map_err(|err| format!("{err:#}")))
        .as_ref()
        .map_err(|err| anyhow!("failed to prepare fake relays: {err}"))
}

fn write_relays() -> Result<FakeRelays> {
    let dir = TempDir::new().context("failed to create fake relay directory")?;
    let looping = write_script(dir.path(), "looping-relay", LOOPING)?;
    let crashing = write_script(dir.path(), "crashing-relay", CRASHING)?;
    let stubborn = write_script(dir.path(), "stubborn-relay", STUBBORN)?;
    Ok(FakeRelays {
        _dir: dir,
        looping,
        crashing,
        stubborn,
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to mark {} executable", path.display()))?;
    Ok(path)
}

/// Write a small placeholder media file named `name` under `dir`.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn media_file(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, b"not really a video").with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Share link in the path-segment form for `identifier`.
#[must_use]
pub fn share_link(identifier: &str) -> String {
    format!("https://drive.google.com/file/d/{identifier}/view?usp=sharing")
}
