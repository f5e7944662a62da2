//! Key → server selection.
//!
//! A [`ServerSelector`] holds the active [`ServerSet`] and maps cache keys onto
//! it. Two strategies share the contract:
//!
//! - [`ModuloSelector`]: CRC-32 of the key modulo the server count. Compatible
//!   with the classic memcached client layout, but a membership change remaps
//!   most keys.
//! - [`JumpHashSelector`]: jump consistent hash over the server count. Adding a
//!   server at the end of the sorted list moves only about `1/n` of the keys.
//!
//! # Architecture
//!
//! ```text
//!  discovery tick                         request path (many readers)
//!  ──────────────                         ───────────────────────────
//!  ServerSet::from_unsorted(..)           pick_server("user123")
//!          │                                      │
//!          ▼                                      ▼
//!  set_servers(set) ──► RwLock<Arc<ServerSet>> ◄── load snapshot
//!                         (pointer swap only)      hash(key) → index
//! ```
//!
//! Both selectors replace the list on `set_servers`; nothing is merged.

mod jump;
mod modulo;
mod server_set;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use jump::{jump_hash, JumpHashSelector};
pub use modulo::ModuloSelector;
pub use server_set::{ServerAddr, ServerSet};

pub(crate) use server_set::{split_host_port, SharedServerSet};

/// Errors returned by server selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// `pick_server` was called while the server set is empty.
    #[error("no memcached servers available")]
    NoServers,

    /// A server address does not have a `host:port` shape.
    #[error("invalid server address: {0:?}")]
    InvalidAddress(String),
}

/// Maps cache keys onto the current server set.
///
/// `pick_server` may run concurrently with itself and with `set_servers`. A
/// reader always sees either the complete old set or the complete new one.
pub trait ServerSelector: Send + Sync {
    /// Replaces the active server set.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InvalidAddress`] if any address is malformed,
    /// in which case the previous set stays active.
    fn set_servers(&self, servers: ServerSet) -> Result<(), SelectorError>;

    /// Picks the server responsible for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::NoServers`] if the active set is empty.
    fn pick_server(&self, key: &str) -> Result<ServerAddr, SelectorError>;

    /// Returns a snapshot of the active server set.
    fn servers(&self) -> Arc<ServerSet>;

    /// The strategy this selector implements.
    fn strategy(&self) -> SelectionStrategy;
}

/// Closed set of selection strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// Hash modulo server count.
    #[default]
    Modulo,
    /// Jump consistent hash.
    Consistent,
}

impl SelectionStrategy {
    /// Creates an empty selector for this strategy.
    pub fn build(self) -> Arc<dyn ServerSelector> {
        match self {
            SelectionStrategy::Modulo => Arc::new(ModuloSelector::new()),
            SelectionStrategy::Consistent => Arc::new(JumpHashSelector::new()),
        }
    }

    /// Name used in configuration files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::Modulo => "modulo",
            SelectionStrategy::Consistent => "consistent",
        }
    }

    /// Parses a configuration value. Accepts `jump` as an alias for
    /// `consistent`.
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "modulo" => Some(SelectionStrategy::Modulo),
            "consistent" | "jump" => Some(SelectionStrategy::Consistent),
            _ => None,
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_config_str() {
        assert_eq!(
            SelectionStrategy::from_config_str("Modulo"),
            Some(SelectionStrategy::Modulo)
        );
        assert_eq!(
            SelectionStrategy::from_config_str(" consistent "),
            Some(SelectionStrategy::Consistent)
        );
        assert_eq!(
            SelectionStrategy::from_config_str("jump"),
            Some(SelectionStrategy::Consistent)
        );
        assert_eq!(SelectionStrategy::from_config_str("ring"), None);
    }

    #[test]
    fn test_build_matches_strategy() {
        for strategy in [SelectionStrategy::Modulo, SelectionStrategy::Consistent] {
            let selector = strategy.build();
            assert_eq!(selector.strategy(), strategy);
            assert!(selector.servers().is_empty());
        }
    }

    #[test]
    fn test_empty_set_has_no_servers() {
        for strategy in [SelectionStrategy::Modulo, SelectionStrategy::Consistent] {
            let selector = strategy.build();
            assert_eq!(selector.pick_server("user123"), Err(SelectorError::NoServers));

            selector
                .set_servers(ServerSet::from_unsorted(["a:1"]))
                .unwrap();
            selector.set_servers(ServerSet::empty()).unwrap();
            assert_eq!(selector.pick_server("user123"), Err(SelectorError::NoServers));
        }
    }

    #[test]
    fn test_invalid_address_keeps_previous_set() {
        for strategy in [SelectionStrategy::Modulo, SelectionStrategy::Consistent] {
            let selector = strategy.build();
            selector
                .set_servers(ServerSet::from_unsorted(["a:1", "b:1"]))
                .unwrap();

            let err = selector
                .set_servers(ServerSet::from_unsorted(["c:1", "not-an-address"]))
                .unwrap_err();
            assert_eq!(err, SelectorError::InvalidAddress("not-an-address".into()));
            assert_eq!(*selector.servers(), ServerSet::from_unsorted(["a:1", "b:1"]));
        }
    }

    #[test]
    fn test_concurrent_readers_see_whole_sets() {
        let selector = SelectionStrategy::Consistent.build();
        let small = ServerSet::from_unsorted(["a:1", "b:1"]);
        let large = ServerSet::from_unsorted(["a:1", "b:1", "c:1", "d:1"]);
        selector.set_servers(small.clone()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let selector = &selector;
                let (small, large) = (&small, &large);
                scope.spawn(move || {
                    for i in 0..2_000 {
                        let snapshot = selector.servers();
                        assert!(*snapshot == *small || *snapshot == *large);
                        let server = selector.pick_server(&format!("key-{i}")).unwrap();
                        assert!(large.contains(&server));
                    }
                });
            }
            for i in 0..500 {
                let next = if i % 2 == 0 { large.clone() } else { small.clone() };
                selector.set_servers(next).unwrap();
            }
        });
    }
}
