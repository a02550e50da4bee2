//! Mock fixture subsystem.
//!
//! # Data Flow
//! ```text
//! mocks directory
//!     → filename.rs (parse convention: mask, method, status, ext, comments)
//!     → registry.rs (method → url mask → broker)
//!     → broker.rs (candidates, selection, delay/proxy/500 modifiers)
//!
//! On filesystem change:
//!     watcher → registry.register / unregister / init
//!     → sync version bumped for long-polling dashboards
//! ```
//!
//! # Design Decisions
//! - A file that does not parse never enters the registry
//! - Brokers never exist without at least one candidate
//! - The synthetic 500 lives in memory only; nothing is written to disk

pub mod broker;
pub mod filename;
pub mod registry;

pub use broker::{BrokerError, BrokerSnapshot, MockBroker, Selection};
pub use filename::{FilenameDescriptor, FilenameError};
pub use registry::{BrokerRegistry, RegisterOrigin, RegistrySnapshot};
