//! Point-in-time copy of discovery metrics.

use std::fmt;

use serde::Serialize;

/// Plain copy of [`DiscoveryMetrics`](super::DiscoveryMetrics) values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverySnapshot {
    /// Client name.
    pub name: String,
    /// Servers in the active set.
    pub servers: u64,
    /// Resolutions applied to the selector.
    pub resolutions_succeeded: u64,
    /// Resolutions that failed and left the previous set in place.
    pub resolutions_failed: u64,
    /// Applied resolutions that changed membership.
    pub membership_changes: u64,
}

impl fmt::Display for DiscoverySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} servers ({} resolutions ok, {} failed, {} membership changes)",
            self.name,
            self.servers,
            self.resolutions_succeeded,
            self.resolutions_failed,
            self.membership_changes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_display() {
        let snapshot = DiscoverySnapshot {
            name: "chunks".to_string(),
            servers: 3,
            resolutions_succeeded: 10,
            resolutions_failed: 1,
            membership_changes: 2,
        };
        let display = snapshot.to_string();
        assert!(display.starts_with("chunks: 3 servers"));
        assert!(display.contains("1 failed"));
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = DiscoverySnapshot {
            name: "chunks".to_string(),
            servers: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["servers"], 3);
        assert_eq!(json["name"], "chunks");
    }
}
