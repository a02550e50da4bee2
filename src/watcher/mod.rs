//! Filesystem watching subsystem.
//!
//! # Data Flow
//! ```text
//! notify (background thread)
//!     → fs.rs callback (classify: mocks or static tree)
//!     → unbounded channel
//!     → apply_events task (single consumer)
//!         path is a directory → registry.init()
//!         path is a file      → registry.register()
//!         path is gone        → registry.unregister()
//!     → sync_version.rs (bump once per actual change, wake long polls)
//! ```

pub mod fs;
pub mod sync_version;

pub use fs::{apply_event, apply_events, FsEvent, MockWatcher, WatchRoot, WatchTargets, WatcherError};
pub use sync_version::SyncVersion;
