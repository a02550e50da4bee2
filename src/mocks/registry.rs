//! Broker registry.
//!
//! # Responsibilities
//! - Own every broker, keyed by method then url mask
//! - Build itself from a recursive listing of the mocks directory
//! - Apply single-file add/remove events from the watcher
//! - Resolve an incoming `(method, path)` to a broker
//!
//! # Design Decisions
//! - Masks are kept in a `BTreeMap` and resolved in *reverse* key order.
//!   `[` sorts before lowercase letters, so `/user/profile` is tried before
//!   `/user/[id]` no matter which file arrived first
//! - Invalid filenames are logged and skipped, never fatal
//! - Pure in-memory state; callers wrap it in a lock

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::mocks::broker::{BrokerError, BrokerSnapshot, MockBroker};
use crate::mocks::filename::parse_filename;

/// Where a registration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOrigin {
    /// Full directory scan; default selection is applied once the scan ends.
    Scan,
    /// Live filesystem event.
    Watcher,
}

/// `method -> url mask -> snapshot`.
pub type RegistrySnapshot = BTreeMap<String, BTreeMap<String, BrokerSnapshot>>;

#[derive(Debug)]
pub struct BrokerRegistry {
    mocks_dir: PathBuf,
    ignore: Option<Regex>,
    brokers: BTreeMap<String, BTreeMap<String, MockBroker>>,
}

impl BrokerRegistry {
    /// Create an empty registry for `mocks_dir`. Call [`init`](Self::init) to populate it.
    pub fn new(mocks_dir: impl Into<PathBuf>, ignore: Option<Regex>) -> Self {
        Self {
            mocks_dir: mocks_dir.into(),
            ignore,
            brokers: BTreeMap::new(),
        }
    }

    pub fn mocks_dir(&self) -> &Path {
        &self.mocks_dir
    }

    /// Drop all state and rebuild from the mocks directory.
    ///
    /// Returns the number of brokers created.
    pub fn init(&mut self) -> usize {
        self.brokers.clear();

        let files = list_files(&self.mocks_dir, self.ignore.as_ref());
        for file in &files {
            self.register(file, RegisterOrigin::Scan);
        }
        for broker in self.brokers.values_mut().flat_map(|b| b.values_mut()) {
            broker.select_default();
        }

        let count = self.broker_count();
        tracing::info!(
            mocks_dir = %self.mocks_dir.display(),
            files = files.len(),
            brokers = count,
            "Mock registry built"
        );
        count
    }

    /// Register a file (relative to the mocks directory).
    ///
    /// Returns true when the registry changed.
    pub fn register(&mut self, file: &str, origin: RegisterOrigin) -> bool {
        if self.is_ignored(file) {
            return false;
        }
        let descriptor = match parse_filename(file) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "Skipping mock with invalid filename");
                return false;
            }
        };

        if let Some(broker) = self.broker_by_route_mut(&descriptor.method, &descriptor.url_mask) {
            return broker.register(file);
        }

        let mut broker = match MockBroker::new(file) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "Skipping mock");
                return false;
            }
        };
        if origin == RegisterOrigin::Watcher {
            broker.select_default();
        }
        self.brokers
            .entry(descriptor.method)
            .or_default()
            .insert(descriptor.url_mask, broker);
        true
    }

    /// Remove a file. Empty brokers and method buckets are dropped.
    ///
    /// Returns true when the registry changed.
    pub fn unregister(&mut self, file: &str) -> bool {
        let Ok(descriptor) = parse_filename(file) else {
            return false;
        };
        let Some(by_mask) = self.brokers.get_mut(&descriptor.method) else {
            return false;
        };
        let Some(broker) = by_mask.get_mut(&descriptor.url_mask) else {
            return false;
        };
        if !broker.unregister(file) {
            return false;
        }

        if broker.is_empty() {
            by_mask.remove(&descriptor.url_mask);
        }
        if by_mask.is_empty() {
            self.brokers.remove(&descriptor.method);
        }
        true
    }

    /// Find the broker serving `path` for `method`.
    pub fn resolve(&self, method: &str, path: &str) -> Option<&MockBroker> {
        self.brokers
            .get(method)?
            .values()
            .rev()
            .find(|b| b.matches(path))
    }

    /// Broker registered exactly under `(method, url_mask)`.
    pub fn broker_by_route(&self, method: &str, url_mask: &str) -> Option<&MockBroker> {
        self.brokers.get(method)?.get(url_mask)
    }

    pub fn broker_by_route_mut(&mut self, method: &str, url_mask: &str) -> Option<&mut MockBroker> {
        self.brokers.get_mut(method)?.get_mut(url_mask)
    }

    /// Broker that owns `file` as a candidate.
    pub fn broker_by_file_mut(&mut self, file: &str) -> Option<&mut MockBroker> {
        let descriptor = parse_filename(file).ok()?;
        self.broker_by_route_mut(&descriptor.method, &descriptor.url_mask)
            .filter(|b| b.has_mock(file))
    }

    /// Select `file` on the broker that owns it.
    pub fn select_file(&mut self, file: &str) -> Result<(), BrokerError> {
        self.broker_by_file_mut(file)
            .ok_or_else(|| BrokerError::UnknownMock(file.to_string()))?
            .select_file(file)
    }

    /// Every comment across all candidates, first occurrence order, no duplicates.
    pub fn extract_all_comments(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.brokers()
            .flat_map(|b| b.comments())
            .filter(|c| seen.insert(c.clone()))
            .collect()
    }

    /// Apply [`MockBroker::set_by_matching_comment`] to every broker.
    pub fn set_mocks_matching_comment(&mut self, comment: &str) {
        for broker in self.brokers.values_mut().flat_map(|b| b.values_mut()) {
            broker.set_by_matching_comment(comment);
        }
    }

    pub fn brokers(&self) -> impl Iterator<Item = &MockBroker> {
        self.brokers.values().flat_map(|b| b.values())
    }

    pub fn broker_count(&self) -> usize {
        self.brokers.values().map(BTreeMap::len).sum()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.brokers
            .iter()
            .map(|(method, by_mask)| {
                let brokers = by_mask
                    .iter()
                    .map(|(mask, broker)| (mask.clone(), broker.snapshot()))
                    .collect();
                (method.clone(), brokers)
            })
            .collect()
    }

    /// Path of `file` relative to the mocks directory, `/`-separated.
    pub fn relative_name(&self, path: &Path) -> Option<String> {
        relative_name(&self.mocks_dir, path)
    }

    fn is_ignored(&self, file: &str) -> bool {
        self.ignore.as_ref().is_some_and(|re| re.is_match(file))
    }
}

/// Sorted, `/`-separated relative paths of every regular file under `dir`.
///
/// Entries that vanish mid-walk are skipped.
pub fn list_files(dir: &Path, ignore: Option<&Regex>) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| relative_name(dir, e.path()))
        .filter(|name| !ignore.is_some_and(|re| re.is_match(name)))
        .collect();
    files.sort();
    files
}

pub fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
