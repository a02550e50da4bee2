//! Mock and static directory watcher.
//!
//! `notify` delivers events on its own thread; they are forwarded into an
//! unbounded channel and applied by a single consumer task, so each
//! registry mutation happens under one write lock and no dispatch ever
//! sees a half-applied change.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::mocks::{BrokerRegistry, RegisterOrigin};
use crate::observability::metrics;
use crate::statics::StaticRegistry;
use crate::watcher::sync_version::SyncVersion;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to watch `{path}`: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Which watched tree an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRoot {
    Mocks,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub root: WatchRoot,
    pub path: PathBuf,
}

/// A watcher over the mocks directory and, optionally, the static directory.
///
/// Can be stopped and restarted at runtime; the event channel outlives it.
pub struct MockWatcher {
    mocks_dir: PathBuf,
    static_dir: Option<PathBuf>,
    event_tx: mpsc::UnboundedSender<FsEvent>,
    active: Mutex<Option<RecommendedWatcher>>,
}

impl MockWatcher {
    /// Create a stopped watcher.
    ///
    /// Returns the watcher and the receiver that [`apply_events`] consumes.
    pub fn new(
        mocks_dir: &Path,
        static_dir: Option<&Path>,
    ) -> (Self, mpsc::UnboundedReceiver<FsEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                mocks_dir: mocks_dir.to_path_buf(),
                static_dir: static_dir.map(Path::to_path_buf),
                event_tx,
                active: Mutex::new(None),
            },
            event_rx,
        )
    }

    /// Start watching. A no-op if already running.
    pub fn start(&self) -> Result<(), WatcherError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.is_some() {
            return Ok(());
        }

        let tx = self.event_tx.clone();
        let mocks_dir = self.mocks_dir.clone();
        let static_dir = self.static_dir.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_access() {
                        return;
                    }
                    for path in event.paths {
                        let root = if static_dir.as_ref().is_some_and(|d| path.starts_with(d)) {
                            WatchRoot::Static
                        } else if path.starts_with(&mocks_dir) {
                            WatchRoot::Mocks
                        } else {
                            continue;
                        };
                        let _ = tx.send(FsEvent { root, path });
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )
        .map_err(|source| WatcherError::Watch {
            path: self.mocks_dir.clone(),
            source,
        })?;

        let roots = std::iter::once(&self.mocks_dir).chain(self.static_dir.as_ref());
        for dir in roots {
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(|source| WatcherError::Watch {
                    path: dir.clone(),
                    source,
                })?;
        }

        tracing::info!(mocks_dir = ?self.mocks_dir, static_dir = ?self.static_dir, "Mock watcher started");
        *active = Some(watcher);
        Ok(())
    }

    /// Stop watching. Dropping the `notify` watcher unsubscribes it.
    pub fn stop(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.take().is_some() {
            tracing::info!("Mock watcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// State that filesystem events mutate.
#[derive(Clone)]
pub struct WatchTargets {
    pub registry: Arc<RwLock<BrokerRegistry>>,
    pub statics: Arc<RwLock<StaticRegistry>>,
    pub sync: SyncVersion,
}

/// Apply one event. Returns true if a registry changed (and the sync version was bumped).
pub async fn apply_event(targets: &WatchTargets, event: &FsEvent) -> bool {
    let metadata = tokio::fs::metadata(&event.path).await.ok();
    let is_dir = metadata.as_ref().is_some_and(|m| m.is_dir());
    let is_file = metadata.as_ref().is_some_and(|m| m.is_file());

    let changed = match event.root {
        WatchRoot::Mocks => {
            let mut registry = targets.registry.write().await;
            let changed = if is_dir {
                registry.init();
                true
            } else {
                match registry.relative_name(&event.path) {
                    Some(file) if is_file => registry.register(&file, RegisterOrigin::Watcher),
                    Some(file) => registry.unregister(&file),
                    None => false,
                }
            };
            metrics::record_registry_size(registry.broker_count());
            changed
        }
        WatchRoot::Static => {
            let mut statics = targets.statics.write().await;
            if is_dir {
                statics.init();
                true
            } else {
                match statics.relative_name(&event.path) {
                    Some(file) if is_file => statics.register(&file),
                    Some(file) => statics.unregister(&file),
                    None => false,
                }
            }
        }
    };

    if changed {
        let version = targets.sync.increment();
        tracing::debug!(path = ?event.path, version, "Registry updated from filesystem");
    }
    changed
}

/// Consume watcher events until shutdown or until every sender is gone.
pub async fn apply_events(
    mut events: mpsc::UnboundedReceiver<FsEvent>,
    targets: WatchTargets,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    apply_event(&targets, &event).await;
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Watcher event loop exited");
}
