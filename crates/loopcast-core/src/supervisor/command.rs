//! Relay command construction.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::model::{OutputShape, PlaylistDescriptor, REDACTED, SessionConfig};

const INPUT_ARGS: &[&str] = &["-re", "-stream_loop", "-1", "-f", "concat", "-safe", "0"];
const VIDEO_ARGS: &[&str] = &[
    "-c:v",
    "libx264",
    "-preset",
    "veryfast",
    "-b:v",
    "2500k",
    "-maxrate",
    "2500k",
    "-bufsize",
    "5000k",
    "-g",
    "60",
    "-keyint_min",
    "60",
];
const AUDIO_ARGS: &[&str] = &["-c:a", "aac", "-b:a", "128k"];
const SHORTS_FILTER: &str = "scale=720:1280";
const OUTPUT_FORMAT: &[&str] = &["-f", "flv"];

/// Fully assembled relay invocation.
///
/// The argument vector contains the clear-text ingest URL; `Display` and `Debug` print
/// the redacted form instead.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayCommand {
    program: String,
    args: Vec<String>,
    secret: String,
}

impl RelayCommand {
    /// Build the invocation for `descriptor` and `config`.
    #[must_use]
    pub fn build(program: impl Into<String>, descriptor: &PlaylistDescriptor, config: &SessionConfig) -> Self {
        let mut args: Vec<String> = INPUT_ARGS.iter().map(ToString::to_string).collect();
        args.push("-i".to_string());
        args.push(path_arg(descriptor.location()));
        args.extend(VIDEO_ARGS.iter().map(ToString::to_string));
        args.extend(AUDIO_ARGS.iter().map(ToString::to_string));
        if config.shape() == OutputShape::Shorts {
            args.push("-vf".to_string());
            args.push(SHORTS_FILTER.to_string());
        }
        args.extend(OUTPUT_FORMAT.iter().map(ToString::to_string));
        args.push(config.ingest_url());

        Self {
            program: program.into(),
            args,
            secret: config.stream_key().expose().to_string(),
        }
    }

    /// Executable name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the OS, including the clear-text ingest URL.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn os_args(&self) -> impl Iterator<Item = OsString> + '_ {
        self.args.iter().map(OsString::from)
    }

    /// Arguments with the ingest URL masked.
    #[must_use]
    pub fn redacted_args(&self) -> Vec<String> {
        self.args.iter().map(|arg| self.redact(arg)).collect()
    }

    /// Mask every occurrence of the stream key inside `text`.
    pub(crate) fn redact(&self, text: &str) -> String {
        if self.secret.is_empty() || !text.contains(&self.secret) {
            return text.to_string();
        }
        text.replace(&self.secret, REDACTED)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.program)?;
        for arg in self.redacted_args() {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for RelayCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RelayCommand")
            .field("program", &self.program)
            .field("args", &self.redacted_args())
            .field("secret", &REDACTED)
            .finish()
    }
}
