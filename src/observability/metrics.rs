//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define mock server metrics (requests, latency, registry size)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `mockroute_requests_total` (counter): requests by method, status, source
//! - `mockroute_request_duration_seconds` (histogram): latency distribution
//! - `mockroute_registry_brokers` (gauge): brokers currently registered
//! - `mockroute_sync_version` (gauge): current sync version
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - `source` is one of `mock`, `static`, `proxy`, `none`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Mock,
    Static,
    Proxy,
    None,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Mock => "mock",
            Source::Static => "static",
            Source::Proxy => "proxy",
            Source::None => "none",
        }
    }
}

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, source: Source, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("source", source.as_str().to_string()),
    ];
    counter!("mockroute_requests_total", &labels).increment(1);
    histogram!("mockroute_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_registry_size(brokers: usize) {
    gauge!("mockroute_registry_brokers").set(brokers as f64);
}

pub fn record_sync_version(version: u64) {
    gauge!("mockroute_sync_version").set(version as f64);
}
