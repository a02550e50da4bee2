//! Registry change counter for long-polling dashboards.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::observability::metrics;

/// Monotonic counter bumped once per registry mutation.
///
/// Waiters get woken on every bump and return; to hear about the next
/// change they poll again.
#[derive(Debug, Clone)]
pub struct SyncVersion {
    tx: Arc<watch::Sender<u64>>,
}

impl SyncVersion {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Bump the version and wake every waiter. Returns the new version.
    pub fn increment(&self) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|v| {
            *v += 1;
            next = *v;
        });
        metrics::record_sync_version(next);
        next
    }

    /// Return at once if `known` is stale, otherwise wait up to `timeout`
    /// for the next bump. Yields the version current at return time.
    pub async fn wait_for_change(&self, known: u64, timeout: Duration) -> u64 {
        let mut rx = self.tx.subscribe();
        let current = *rx.borrow_and_update();
        if current != known {
            return current;
        }
        // timing out just reports the unchanged value
        let _ = tokio::time::timeout(timeout, rx.changed()).await;
        let latest = *rx.borrow();
        latest
    }
}

impl Default for SyncVersion {
    fn default() -> Self {
        Self::new()
    }
}
