//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port, delay, jitter, limits)
//! - Check that regexes compile and plugin names exist
//! - Check header names/values and the proxy fallback URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MockConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::{HeaderName, HeaderValue};
use regex::Regex;
use std::fmt;

use crate::config::schema::MockConfig;
use crate::http::plugins::BUILTIN_TRANSFORMS;

/// Longest delay accepted for `delay_ms`.
pub const MAX_DELAY_MS: u64 = 120_000;

/// Largest accepted `delay_jitter`.
pub const MAX_DELAY_JITTER: f64 = 3.0;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &MockConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
    if config.delay_ms > MAX_DELAY_MS {
        errors.push(ValidationError::new(
            "delay_ms",
            format!("must be at most {MAX_DELAY_MS}"),
        ));
    }
    if !is_valid_jitter(config.delay_jitter) {
        errors.push(ValidationError::new(
            "delay_jitter",
            format!("must be between 0 and {MAX_DELAY_JITTER}"),
        ));
    } else if !delay_fits_timeout(
        config.delay_ms,
        config.delay_jitter,
        config.limits.request_timeout_secs,
    ) {
        errors.push(ValidationError::new(
            "delay_ms",
            "delay plus jitter must finish within limits.request_timeout_secs",
        ));
    }
    if let Err(message) = check_fallback(&config.proxy_fallback) {
        errors.push(ValidationError::new("proxy_fallback", message));
    }
    if let Err(e) = Regex::new(&config.ignore) {
        errors.push(ValidationError::new("ignore", e.to_string()));
    }

    for (i, plugin) in config.plugins.iter().enumerate() {
        if let Err(e) = Regex::new(&plugin.pattern) {
            errors.push(ValidationError::new(format!("plugins[{i}].pattern"), e.to_string()));
        }
        if !BUILTIN_TRANSFORMS.contains(&plugin.transform.as_str()) {
            errors.push(ValidationError::new(
                format!("plugins[{i}].transform"),
                format!("unknown transform `{}`", plugin.transform),
            ));
        }
    }

    for (i, (name, value)) in config.extra_headers.iter().enumerate() {
        if HeaderName::try_from(name.as_str()).is_err() {
            errors.push(ValidationError::new(
                format!("extra_headers[{i}]"),
                format!("invalid header name `{name}`"),
            ));
        }
        if HeaderValue::try_from(value.as_str()).is_err() {
            errors.push(ValidationError::new(
                format!("extra_headers[{i}]"),
                "invalid header value",
            ));
        }
    }

    for (i, cookie) in config.cookies.iter().enumerate() {
        if HeaderValue::try_from(cookie.value.as_str()).is_err() {
            errors.push(ValidationError::new(
                format!("cookies[{i}]"),
                format!("invalid cookie value for `{}`", cookie.label),
            ));
        }
    }

    let limits = &config.limits;
    for (field, value) in [
        ("limits.max_uri_length", limits.max_uri_length as u64),
        ("limits.max_body_bytes", limits.max_body_bytes as u64),
        ("limits.proxy_body_bytes", limits.proxy_body_bytes as u64),
        ("limits.request_timeout_secs", limits.request_timeout_secs),
        ("limits.long_poll_timeout_ms", limits.long_poll_timeout_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be non-zero"));
        }
    }
    if limits.long_poll_timeout_ms >= limits.request_timeout_secs.saturating_mul(1000) {
        errors.push(ValidationError::new(
            "limits.long_poll_timeout_ms",
            "must be shorter than limits.request_timeout_secs",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid_jitter(jitter: f64) -> bool {
    (0.0..=MAX_DELAY_JITTER).contains(&jitter)
}

/// True when the longest jittered delay still ends before the request timeout.
pub fn delay_fits_timeout(delay_ms: u64, jitter: f64, request_timeout_secs: u64) -> bool {
    let longest = delay_ms as f64 * (1.0 + jitter.max(0.0));
    longest < request_timeout_secs.saturating_mul(1000) as f64
}

/// Empty disables the fallback; anything else must be an http(s) URL.
pub fn check_fallback(fallback: &str) -> Result<Option<url::Url>, String> {
    if fallback.is_empty() {
        return Ok(None);
    }
    let url = url::Url::parse(fallback).map_err(|e| format!("invalid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(Some(url)),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}
