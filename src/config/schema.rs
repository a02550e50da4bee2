//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mock server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration for the mock server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockConfig {
    /// Directory holding the mock fixtures.
    pub mocks_dir: PathBuf,

    /// Optional directory of static assets.
    pub static_dir: Option<PathBuf>,

    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Delay applied to delayed routes, in milliseconds.
    pub delay_ms: u64,

    /// Random extra delay as a fraction of `delay_ms` (0.0 to 3.0).
    pub delay_jitter: f64,

    /// Origin that unmatched or proxied requests are relayed to.
    pub proxy_fallback: String,

    /// Save relayed responses as new mock files.
    pub collect_proxied: bool,

    /// Pretty-print collected JSON bodies.
    pub format_collected_json: bool,

    /// Cookie label → `Set-Cookie` value. The first entry is selected at startup.
    pub cookies: Vec<CookieConfig>,

    /// Headers added to every mock response.
    pub extra_headers: Vec<(String, String)>,

    /// Extension → MIME type overrides.
    pub extra_mimes: BTreeMap<String, String>,

    /// Fixture transforms, first matching pattern wins.
    pub plugins: Vec<PluginConfig>,

    /// CORS settings.
    pub cors: CorsConfig,

    /// Files whose relative path matches are never registered.
    pub ignore: String,

    /// Watch the mocks and static directories for changes.
    pub watch: bool,

    /// Request limits and timeouts.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            mocks_dir: PathBuf::from("mocks"),
            static_dir: None,
            listener: ListenerConfig::default(),
            delay_ms: 1200,
            delay_jitter: 0.0,
            proxy_fallback: String::new(),
            collect_proxied: false,
            format_collected_json: true,
            cookies: Vec::new(),
            extra_headers: Vec::new(),
            extra_mimes: BTreeMap::new(),
            plugins: Vec::new(),
            cors: CorsConfig::default(),
            ignore: r"(\.DS_Store|~)$".to_string(),
            watch: true,
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2020,
        }
    }
}

/// A selectable cookie.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CookieConfig {
    pub label: String,
    pub value: String,
}

/// Fixture transform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginConfig {
    /// Regex tested against the fixture's relative path.
    pub pattern: String,

    /// Built-in transform name (`raw` or `template`).
    pub transform: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Initial value of the runtime CORS toggle.
    pub allowed: bool,
    /// Allowed origins; `*` allows any.
    pub origins: Vec<String>,
    pub methods: Vec<String>,
    pub headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed: true,
            origins: vec!["*".to_string()],
            methods: ["GET", "PUT", "DELETE", "POST", "PATCH", "HEAD", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            headers: Vec::new(),
            expose_headers: Vec::new(),
            credentials: true,
            max_age_secs: 0,
        }
    }
}

/// Request limits and timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Longest accepted request URI, in bytes.
    pub max_uri_length: usize,

    /// Largest control API request body, in bytes.
    pub max_body_bytes: usize,

    /// Largest request body relayed to the proxy fallback, in bytes.
    pub proxy_body_bytes: usize,

    /// Total time for one request/response, in seconds.
    pub request_timeout_secs: u64,

    /// How long a sync-version long poll is held open, in milliseconds.
    pub long_poll_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_uri_length: 2048,
            max_body_bytes: 200 * 1024,
            proxy_body_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 180,
            long_poll_timeout_ms: 8000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `compact`.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
