//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MockConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! Runtime changes (delay, fallback, cors, ...):
//!     control API → RuntimeSettings (ArcSwap), seeded from MockConfig
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; mutable knobs live in RuntimeSettings
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod runtime;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use runtime::RuntimeSettings;
pub use schema::{CookieConfig, CorsConfig, LimitsConfig, ListenerConfig, MockConfig, ObservabilityConfig, PluginConfig};
