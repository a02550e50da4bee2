//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Mock filename
//!     → mocks::filename (derive url mask)
//!     → matcher.rs (compile mask to anchored regex)
//!
//! Incoming Request (method, path)
//!     → mocks::registry (brokers for method, reverse mask order)
//!     → matcher.rs (first broker whose mask matches)
//!     → Return: matched broker or NoMatch
//! ```
//!
//! # Design Decisions
//! - Matchers compiled when a broker is created, immutable afterwards
//! - Deterministic: same registry state always resolves to the same broker
//! - Exact segments beat `[variable]` segments through key ordering

pub mod matcher;

pub use matcher::UrlMaskMatcher;
