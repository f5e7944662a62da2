//! Memcached wire access.
//!
//! The client never talks to sockets directly; it goes through the
//! [`Transport`] trait so tests can substitute an in-memory server and
//! production uses [`TcpTransport`].
//!
//! Only the two text protocol commands the client needs are implemented:
//!
//! ```text
//! get <key>*\r\n
//!   ◄── VALUE <key> <flags> <bytes>\r\n<data>\r\n ... END\r\n
//!
//! set <key> <flags> <exptime> <bytes>\r\n<data>\r\n
//!   ◄── STORED | NOT_STORED | ERROR | CLIENT_ERROR <msg> | SERVER_ERROR <msg>
//! ```

mod codec;
mod tcp;

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::selector::{ServerAddr, ServerSet};
use crate::BoxFuture;

pub use tcp::TcpTransport;

/// Longest key memcached accepts, in bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest value accepted in a `VALUE` reply (memcached's default item size).
pub const MAX_VALUE_LENGTH: usize = 1024 * 1024;

/// Errors from a single server exchange.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Key is empty, too long, or contains whitespace/control characters.
    #[error("malformed key {0:?}")]
    MalformedKey(String),

    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The exchange did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// `SERVER_ERROR` reply.
    #[error("server error: {0}")]
    Server(String),

    /// `CLIENT_ERROR` reply.
    #[error("client error: {0}")]
    Client(String),

    /// Bare `ERROR` reply (unknown command).
    #[error("server rejected command")]
    UnknownCommand,

    /// A reply line that fits no known shape.
    #[error("unexpected response {0:?}")]
    UnexpectedResponse(String),

    /// `NOT_STORED` reply to a `set`.
    #[error("item not stored")]
    NotStored,
}

impl ProtocolError {
    /// Whether the connection is still in a known state after this error.
    pub fn is_resumable(&self) -> bool {
        matches!(self, ProtocolError::NotStored | ProtocolError::MalformedKey(_))
    }
}

/// One cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Cache key.
    pub key: String,
    /// Stored bytes.
    pub value: Vec<u8>,
    /// Opaque client flags stored with the value.
    pub flags: u32,
    /// Expiration in seconds (relative) or a Unix timestamp; 0 never expires.
    pub expiration: u32,
}

impl Item {
    /// Creates an item with zero flags that never expires.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            flags: 0,
            expiration: 0,
        }
    }

    /// Set the client flags.
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the expiration.
    pub fn with_expiration(mut self, expiration: u32) -> Self {
        self.expiration = expiration;
        self
    }
}

/// Returns `true` if memcached accepts `key`.
pub fn legal_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key.bytes().all(|b| b > b' ' && b != 0x7f)
}

/// Checks `key`, returning [`ProtocolError::MalformedKey`] if memcached
/// would reject it.
pub fn check_key(key: &str) -> Result<(), ProtocolError> {
    if legal_key(key) {
        Ok(())
    } else {
        Err(ProtocolError::MalformedKey(key.to_string()))
    }
}

/// Request/response exchange with one server.
pub trait Transport: Send + Sync {
    /// Fetches `keys` from `server`. Misses are absent from the map.
    fn get_multi<'a>(
        &'a self,
        server: &'a ServerAddr,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, Item>, ProtocolError>>;

    /// Stores `item` on `server` unconditionally.
    fn set<'a>(&'a self, server: &'a ServerAddr, item: &'a Item)
        -> BoxFuture<'a, Result<(), ProtocolError>>;

    /// Drops per-server state (pooled connections) for servers not in `active`.
    fn retain_servers(&self, _active: &ServerSet) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// In-memory servers keyed by address, recording which server saw
    /// which request.
    #[derive(Default)]
    pub(crate) struct MemoryTransport {
        pub(crate) stores: Mutex<HashMap<ServerAddr, HashMap<String, Item>>>,
        pub(crate) requests: Mutex<Vec<(ServerAddr, Vec<String>)>>,
        pub(crate) down: Mutex<Vec<ServerAddr>>,
        pub(crate) retained: Mutex<Vec<ServerSet>>,
    }

    impl MemoryTransport {
        pub(crate) fn stored_on(&self, server: &str) -> Vec<String> {
            let mut keys: Vec<String> = self
                .stores
                .lock()
                .get(&ServerAddr::from(server))
                .map(|store| store.keys().cloned().collect())
                .unwrap_or_default();
            keys.sort();
            keys
        }

        fn check_up(&self, server: &ServerAddr) -> Result<(), ProtocolError> {
            if self.down.lock().contains(server) {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused").into())
            } else {
                Ok(())
            }
        }
    }

    impl Transport for MemoryTransport {
        fn get_multi<'a>(
            &'a self,
            server: &'a ServerAddr,
            keys: &'a [String],
        ) -> BoxFuture<'a, Result<HashMap<String, Item>, ProtocolError>> {
            Box::pin(async move {
                self.check_up(server)?;
                self.requests.lock().push((server.clone(), keys.to_vec()));
                let stores = self.stores.lock();
                let store = stores.get(server);
                Ok(keys
                    .iter()
                    .filter_map(|key| store.and_then(|s| s.get(key)).cloned())
                    .map(|item| (item.key.clone(), item))
                    .collect())
            })
        }

        fn set<'a>(
            &'a self,
            server: &'a ServerAddr,
            item: &'a Item,
        ) -> BoxFuture<'a, Result<(), ProtocolError>> {
            Box::pin(async move {
                self.check_up(server)?;
                self.requests.lock().push((server.clone(), vec![item.key.clone()]));
                self.stores
                    .lock()
                    .entry(server.clone())
                    .or_default()
                    .insert(item.key.clone(), item.clone());
                Ok(())
            })
        }

        fn retain_servers(&self, active: &ServerSet) {
            self.retained.lock().push(active.clone());
        }
    }

    #[test]
    fn test_legal_key() {
        assert!(legal_key("user123"));
        assert!(legal_key(&"k".repeat(MAX_KEY_LENGTH)));
        assert!(!legal_key(&"k".repeat(MAX_KEY_LENGTH + 1)));
        assert!(!legal_key(""));
        assert!(!legal_key("has space"));
        assert!(!legal_key("tab\there"));
        assert!(!legal_key("new\nline"));
        assert!(!legal_key("del\x7f"));
    }

    #[test]
    fn test_resumable_errors() {
        assert!(ProtocolError::NotStored.is_resumable());
        assert!(!ProtocolError::Timeout(Duration::from_millis(100)).is_resumable());
        assert!(!ProtocolError::UnexpectedResponse("?".into()).is_resumable());
    }

    #[test]
    fn test_item_builder() {
        let item = Item::new("k", b"v".to_vec()).with_flags(7).with_expiration(60);
        assert_eq!(item.flags, 7);
        assert_eq!(item.expiration, 60);
        assert_eq!(item.value, b"v");
    }
}
