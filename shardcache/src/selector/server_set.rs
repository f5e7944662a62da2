//! Server addresses and the ordered, immutable server set.
//!
//! A [`ServerSet`] is always sorted and free of duplicates. Every client
//! process that resolves the same membership (DNS may hand records back in
//! any order) therefore builds an identical list, which is what lets
//! independent processes agree on the key → server mapping.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::SelectorError;

/// An opaque cache server endpoint, normally `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerAddr(String);

impl ServerAddr {
    /// Wraps an address string without validating it.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the address and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Checks that the address has a `host:port` shape.
    ///
    /// IPv6 hosts must be bracketed (`[::1]:11211`).
    pub fn validate(&self) -> Result<(), SelectorError> {
        split_host_port(&self.0)
            .map(|_| ())
            .ok_or_else(|| SelectorError::InvalidAddress(self.0.clone()))
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServerAddr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerAddr {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl From<String> for ServerAddr {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

/// Splits `host:port`, returning `None` unless the host is non-empty and the
/// port is a valid `u16`.
pub(crate) fn split_host_port(addr: &str) -> Option<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;

    let bare = match host.strip_prefix('[') {
        Some(inner) => inner.strip_suffix(']')?,
        // Unbracketed IPv6 is ambiguous
        None if host.contains(':') => return None,
        None => host,
    };

    if bare.is_empty() || bare.chars().any(|c| c.is_whitespace() || c == '/') {
        return None;
    }
    Some((host, port))
}

/// Sorted, de-duplicated list of cache servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServerSet {
    servers: Vec<ServerAddr>,
}

impl ServerSet {
    /// Creates an empty server set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a set from addresses in any order.
    pub fn from_unsorted<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerAddr>,
    {
        let mut servers: Vec<ServerAddr> = addrs.into_iter().map(Into::into).collect();
        servers.sort_unstable();
        servers.dedup();
        Self { servers }
    }

    /// Number of servers in the set.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns `true` if the set has no servers.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Returns the server at `index` in sorted order.
    pub fn get(&self, index: usize) -> Option<&ServerAddr> {
        self.servers.get(index)
    }

    /// Iterates the servers in sorted order.
    pub fn iter(&self) -> std::slice::Iter<'_, ServerAddr> {
        self.servers.iter()
    }

    /// Returns the servers as a sorted slice.
    pub fn as_slice(&self) -> &[ServerAddr] {
        &self.servers
    }

    /// Returns `true` if `addr` is a member.
    pub fn contains(&self, addr: &ServerAddr) -> bool {
        self.servers.binary_search(addr).is_ok()
    }

    /// Validates every address in the set.
    pub fn validate(&self) -> Result<(), SelectorError> {
        self.servers.iter().try_for_each(ServerAddr::validate)
    }

    /// Counts `(added, removed)` servers going from `self` to `next`.
    pub fn diff(&self, next: &ServerSet) -> (usize, usize) {
        let added = next.iter().filter(|addr| !self.contains(addr)).count();
        let removed = self.iter().filter(|addr| !next.contains(addr)).count();
        (added, removed)
    }
}

impl<S: Into<ServerAddr>> FromIterator<S> for ServerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_unsorted(iter)
    }
}

impl<'a> IntoIterator for &'a ServerSet {
    type Item = &'a ServerAddr;
    type IntoIter = std::slice::Iter<'a, ServerAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.iter()
    }
}

impl fmt::Display for ServerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, addr) in self.servers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(addr.as_str())?;
        }
        f.write_str("]")
    }
}

/// The active server set shared between the discovery writer and request
/// readers.
///
/// The writer publishes a fully built snapshot; readers clone the `Arc` and
/// keep using whichever snapshot they loaded.
#[derive(Debug, Default)]
pub(crate) struct SharedServerSet {
    current: RwLock<Arc<ServerSet>>,
}

impl SharedServerSet {
    pub(crate) fn load(&self) -> Arc<ServerSet> {
        Arc::clone(&self.current.read())
    }

    pub(crate) fn store(&self, servers: ServerSet) {
        let next = Arc::new(servers);
        *self.current.write() = next;
    }
}
