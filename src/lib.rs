//! Local mock HTTP server library.
//!
//! Serves fixtures whose route identity is encoded in their filenames,
//! with per-route switches for the active fixture, delay, synthetic 500
//! and proxy fallback, all driven through a control API.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mocks;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod statics;
pub mod watcher;

pub use config::schema::MockConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
