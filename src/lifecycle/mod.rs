//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http::server):
//!     Load config → Validate → Build registries → Start watcher → Bind listener
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT or Shutdown::trigger → Stop accepting → Drain → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then registries, then listeners
//! - Watcher event loop and server share one shutdown broadcast

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
