//! `LOOPCAST_*` environment lookup.
//!
//! # Design
//! - Lookup is injected so tests never touch the process environment.
//! - Unset or empty variables fall back to `defaults.rs`; set values are validated.


use crate::error::ConfigResult;
use crate::model::RelaySettings;
use crate::{defaults, validate};

/// Prefix shared by every settings variable.
pub const ENV_PREFIX: &str = "LOOPCAST_";

/// Environment variable names.
pub mod env_keys {
    /// Relay binary.
    pub const FFMPEG: &str = "LOOPCAST_FFMPEG";
    /// Media directory.
    pub const MEDIA_DIR: &str = "LOOPCAST_MEDIA_DIR";
    /// Playlist descriptor path.
    pub const PLAYLIST: &str = "LOOPCAST_PLAYLIST";
    /// Ingest endpoint template.
    pub const INGEST_TEMPLATE: &str = "LOOPCAST_INGEST_TEMPLATE";
    /// Retained log lines.
    pub const LOG_CAPACITY: &str = "LOOPCAST_LOG_CAPACITY";
    /// Stop grace window in seconds.
    pub const STOP_GRACE_SECS: &str = "LOOPCAST_STOP_GRACE_SECS";
    /// Control API bind address.
    pub const BIND_ADDR: &str = "LOOPCAST_BIND_ADDR";
    /// Control API port.
    pub const HTTP_PORT: &str = "LOOPCAST_HTTP_PORT";
    /// Log format (`json` or `pretty`).
    pub const LOG_FORMAT: &str = "LOOPCAST_LOG_FORMAT";
    /// Log level directive.
    pub const LOG_LEVEL: &str = "LOOPCAST_LOG_LEVEL";
}

impl RelaySettings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` naming the first variable that failed validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` naming the first variable that failed validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut settings = Self::default();

        if let Some(raw) = get(env_keys::FFMPEG) {
            settings.ffmpeg_program = validate::non_empty(env_keys::FFMPEG, &raw)?;
        }
        if let Some(raw) = get(env_keys::MEDIA_DIR) {
            settings.media_dir = validate::non_empty(env_keys::MEDIA_DIR, &raw)?.into();
        }
        if let Some(raw) = get(env_keys::PLAYLIST) {
            settings.playlist_path = validate::non_empty(env_keys::PLAYLIST, &raw)?.into();
        }
        if let Some(raw) = get(env_keys::INGEST_TEMPLATE) {
            settings.ingest_template = validate::ingest_template(env_keys::INGEST_TEMPLATE, &raw)?;
        }
        if let Some(raw) = get(env_keys::LOG_CAPACITY) {
            settings.log_capacity =
                validate::parse_capacity(env_keys::LOG_CAPACITY, &raw, defaults::MAX_LOG_CAPACITY)?;
        }
        if let Some(raw) = get(env_keys::STOP_GRACE_SECS) {
            settings.stop_grace = validate::parse_secs(
                env_keys::STOP_GRACE_SECS,
                &raw,
                defaults::MAX_STOP_GRACE_SECS,
            )?;
        }
        if let Some(raw) = get(env_keys::BIND_ADDR) {
            settings.bind_addr = validate::parse_ip(env_keys::BIND_ADDR, &raw)?;
        }
        if let Some(raw) = get(env_keys::HTTP_PORT) {
            settings.http_port = validate::parse_port(env_keys::HTTP_PORT, &raw)?;
        }
        if let Some(raw) = get(env_keys::LOG_FORMAT) {
            settings.log_format = Some(validate::log_format(env_keys::LOG_FORMAT, &raw)?);
        }
        if let Some(raw) = get(env_keys::LOG_LEVEL) {
            settings.log_level = raw.trim().to_string();
        }

        Ok(settings)
    }
}
