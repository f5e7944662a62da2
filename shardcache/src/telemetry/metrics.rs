//! Atomic discovery counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::DiscoverySnapshot;

/// Discovery metrics for one named client.
///
/// `servers` is a gauge holding the size of the last successfully applied
/// server set. The rest are monotonically increasing counters.
#[derive(Debug)]
pub struct DiscoveryMetrics {
    name: String,
    servers: AtomicU64,
    resolutions_succeeded: AtomicU64,
    resolutions_failed: AtomicU64,
    membership_changes: AtomicU64,
}

impl DiscoveryMetrics {
    /// Creates zeroed metrics labelled with the client `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            servers: AtomicU64::new(0),
            resolutions_succeeded: AtomicU64::new(0),
            resolutions_failed: AtomicU64::new(0),
            membership_changes: AtomicU64::new(0),
        }
    }

    /// The client name these metrics are labelled with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records a resolution whose result was applied to the selector.
    pub fn resolution_succeeded(&self, servers: usize) {
        self.servers.store(servers as u64, Ordering::Relaxed);
        self.resolutions_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed resolution. The server gauge is left untouched.
    pub fn resolution_failed(&self) {
        self.resolutions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records that an applied server set differed from the previous one.
    pub fn membership_changed(&self) {
        self.membership_changes.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of currently discovered servers.
    pub fn servers(&self) -> u64 {
        self.servers.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time copy of all values.
    pub fn snapshot(&self) -> DiscoverySnapshot {
        DiscoverySnapshot {
            name: self.name.clone(),
            servers: self.servers.load(Ordering::Relaxed),
            resolutions_succeeded: self.resolutions_succeeded.load(Ordering::Relaxed),
            resolutions_failed: self.resolutions_failed.load(Ordering::Relaxed),
            membership_changes: self.membership_changes.load(Ordering::Relaxed),
        }
    }
}
