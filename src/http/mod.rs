//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, shared state)
//!     → request.rs (request ID, URI guard)
//!     → middleware/cors.rs (runtime-toggled CORS)
//!     → /mockroute/* → admin control API
//!     → anything else → dispatch.rs
//!         → statics / mocks (plugins.rs, cookies.rs, delay.rs)
//!         → proxy fallback
//!     → response.rs (error mapping)
//!     → Send to client
//! ```

pub mod cookies;
pub mod delay;
pub mod dispatch;
pub mod middleware;
pub mod plugins;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, StartupError, CONTROL_PREFIX};
