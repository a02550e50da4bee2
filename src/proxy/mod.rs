//! Proxy fallback subsystem.
//!
//! # Data Flow
//! ```text
//! Unmatched request, or matched broker in proxied state
//!     → relay.rs (forward method, headers, body to fallback origin)
//!     → response copied back verbatim (multi-value Set-Cookie kept)
//!     → collect.rs (optional: save as a new mock file)
//!         → watcher picks the file up like any other change
//! ```
//!
//! # Design Decisions
//! - No retries and no cancellation; a started relay completes or errors
//! - Collected files never overwrite: name clashes get a `(collected-N)` comment
//! - Redirects are passed through, not followed

pub mod collect;
pub mod relay;

pub use collect::{CollectError, Collector};
pub use relay::{ProxyRelay, RelayError, RelayRequest, RelayedResponse};
