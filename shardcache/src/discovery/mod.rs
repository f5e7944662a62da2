//! Server discovery.
//!
//! Keeps a selector's server set in line with what DNS (or a static list)
//! says the cache fleet currently is.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          DiscoveryLoop                            │
//! │                                                                   │
//! │  start() ──► update() once, synchronously                         │
//! │          └─► spawn tick task ──┐                                  │
//! │                                ▼                                  │
//! │   every interval:  Resolver::resolve()                            │
//! │                        │ Ok            │ Err                      │
//! │                        ▼               ▼                          │
//! │             ServerSet::from_unsorted   warn!, keep previous set   │
//! │                        │                                          │
//! │                        ▼                                          │
//! │             ServerSelector::set_servers + metrics gauge           │
//! │                                                                   │
//! │  stop() ──► cancel token ──► await task exit                      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Resolvers:
//!
//! - [`StaticResolver`]: a fixed list, no network.
//! - [`SrvResolver`]: SRV lookup of `_<service>._tcp.<hostname>`.
//! - [`AddressListResolver`]: mixed `host:port` / `dns+` / `dnssrv+` /
//!   `dnssrvnoa+` entries, see [`AddressSpec`].
//!
//! SRV priority and weight are ignored everywhere: every endpoint gets an
//! equal share of keys.

mod address;
mod daemon;
pub(crate) mod dns;
mod resolver;
mod updater;

use std::fmt;

use thiserror::Error;

use crate::selector::SelectorError;

pub use address::AddressSpec;
pub use daemon::{DiscoveryLoop, LoopState};
pub use dns::{DnsLookup, HickoryLookup, SrvTarget};
pub use resolver::{build_resolver, AddressListResolver, Resolver, SrvResolver, StaticResolver};
pub use updater::{MembershipHook, ServerListUpdater};

/// Errors produced by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The lookup mechanism failed (network error, NXDOMAIN, ...).
    #[error("failed to resolve {target}: {message}")]
    Resolution { target: String, message: String },

    /// The resolved server set could not be applied to the selector.
    #[error("failed to apply server set: {0}")]
    Apply(#[from] SelectorError),

    /// `start` was called on a loop that is not idle.
    #[error("discovery loop cannot be started from state {0}")]
    NotRestartable(LoopState),
}

impl DiscoveryError {
    /// Builds a [`DiscoveryError::Resolution`] for `target`.
    pub fn resolution(target: impl Into<String>, err: impl fmt::Display) -> Self {
        DiscoveryError::Resolution {
            target: target.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = DiscoveryError::resolution("_memcached._tcp.m", "NXDOMAIN");
        assert_eq!(err.to_string(), "failed to resolve _memcached._tcp.m: NXDOMAIN");
    }

    #[test]
    fn test_apply_error_from_selector() {
        let err: DiscoveryError = SelectorError::InvalidAddress("x".to_string()).into();
        assert!(matches!(err, DiscoveryError::Apply(_)));
    }
}
