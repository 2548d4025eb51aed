//! Validation helpers and parsing utilities for settings values.

use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

const INGEST_SCHEMES: &[&str] = &["rtmp", "rtmps"];

/// Reject empty or whitespace-only values.
///
/// # Errors
///
/// Returns `InvalidField` with reason `empty`.
pub fn non_empty(field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, "empty", raw));
    }
    Ok(trimmed.to_string())
}

/// Parse an unsigned integer constrained to `range`.
///
/// # Errors
///
/// Returns `InvalidField` with reason `not_a_number` or `out_of_range`.
pub fn parse_bounded(field: &'static str, raw: &str, range: RangeInclusive<u64>) -> ConfigResult<u64> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "not_a_number", raw))?;
    if !range.contains(&value) {
        return Err(ConfigError::invalid(field, "out_of_range", raw));
    }
    Ok(value)
}

/// Parse a log capacity between 1 and `max`.
///
/// # Errors
///
/// Returns `InvalidField` when the value is not a number or out of range.
pub fn parse_capacity(field: &'static str, raw: &str, max: usize) -> ConfigResult<usize> {
    let max = u64::try_from(max).unwrap_or(u64::MAX);
    let value = parse_bounded(field, raw, 1..=max)?;
    usize::try_from(value).map_err(|_| ConfigError::invalid(field, "out_of_range", raw))
}

/// Parse a whole number of seconds up to `max_secs`.
///
/// # Errors
///
/// Returns `InvalidField` when the value is not a number or out of range.
pub fn parse_secs(field: &'static str, raw: &str, max_secs: u64) -> ConfigResult<Duration> {
    parse_bounded(field, raw, 0..=max_secs).map(Duration::from_secs)
}

/// Parse a non-zero TCP port.
///
/// # Errors
///
/// Returns `InvalidField` when the value is not a port number or is zero.
pub fn parse_port(field: &'static str, raw: &str) -> ConfigResult<u16> {
    let value = parse_bounded(field, raw, 1..=u64::from(u16::MAX))?;
    u16::try_from(value).map_err(|_| ConfigError::invalid(field, "out_of_range", raw))
}

/// Parse an IPv4 or IPv6 address.
///
/// # Errors
///
/// Returns `InvalidField` with reason `invalid_ip`.
pub fn parse_ip(field: &'static str, raw: &str) -> ConfigResult<IpAddr> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "invalid_ip", raw))
}

/// Validate an RTMP ingest template.
///
/// The template must be an `rtmp://` or `rtmps://` URL with a host. The `{key}`
/// placeholder is optional; without it the key is appended as the last path segment.
///
/// # Errors
///
/// Returns `InvalidField` with reason `invalid_url`, `unsupported_scheme`, or
/// `missing_host`.
pub fn ingest_template(field: &'static str, raw: &str) -> ConfigResult<String> {
    let template = non_empty(field, raw)?;
    let probe = template.replace("{key}", "probe");
    let url = Url::parse(&probe).map_err(|_| ConfigError::invalid(field, "invalid_url", raw))?;
    if !INGEST_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::invalid(field, "unsupported_scheme", raw));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::invalid(field, "missing_host", raw));
    }
    Ok(template)
}

/// Validate a log format name (`json` or `pretty`).
///
/// # Errors
///
/// Returns `InvalidField` with reason `unknown_format`.
pub fn log_format(field: &'static str, raw: &str) -> ConfigResult<String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "json" | "pretty" => Ok(normalized),
        _ => Err(ConfigError::invalid(field, "unknown_format", raw)),
    }
}
