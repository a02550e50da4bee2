//! Settings that the control API can change while the server runs.

use serde::Serialize;
use url::Url;

use crate::config::schema::MockConfig;
use crate::config::validation::check_fallback;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub delay_ms: u64,
    pub delay_jitter: f64,
    #[serde(serialize_with = "serialize_fallback")]
    pub proxy_fallback: Option<Url>,
    pub collect_proxied: bool,
    pub cors_allowed: bool,
}

impl RuntimeSettings {
    /// Seed from a validated config.
    pub fn from_config(config: &MockConfig) -> Self {
        Self {
            delay_ms: config.delay_ms,
            delay_jitter: config.delay_jitter,
            proxy_fallback: check_fallback(&config.proxy_fallback).ok().flatten(),
            collect_proxied: config.collect_proxied,
            cors_allowed: config.cors.allowed,
        }
    }
}

fn serialize_fallback<S: serde::Serializer>(url: &Option<Url>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(url.as_ref().map(|u| u.as_str().trim_end_matches('/')).unwrap_or(""))
}
