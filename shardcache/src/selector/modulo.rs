//! Hash-modulo server selection.

use std::sync::Arc;

use super::{SelectionStrategy, SelectorError, ServerAddr, ServerSelector, ServerSet, SharedServerSet};

/// Only this many leading key bytes feed the checksum. Legal memcached keys
/// are at most 250 bytes, so this never truncates a valid key.
const CHECKSUM_KEY_LIMIT: usize = 256;

/// Selects `servers[crc32(key) % n]`.
///
/// The CRC-32 (IEEE) layout matches the classic memcached client list, so a
/// mixed fleet of clients agrees on placement as long as they share the same
/// sorted server list. Any change in `n` remaps most keys; use
/// [`JumpHashSelector`](super::JumpHashSelector) when membership churns.
#[derive(Debug, Default)]
pub struct ModuloSelector {
    servers: SharedServerSet,
}

impl ModuloSelector {
    /// Creates a selector with no servers.
    pub fn new() -> Self {
        Self::default()
    }
}

fn key_checksum(key: &str) -> u32 {
    let bytes = key.as_bytes();
    crc32fast::hash(&bytes[..bytes.len().min(CHECKSUM_KEY_LIMIT)])
}

impl ServerSelector for ModuloSelector {
    fn set_servers(&self, servers: ServerSet) -> Result<(), SelectorError> {
        servers.validate()?;
        self.servers.store(servers);
        Ok(())
    }

    fn pick_server(&self, key: &str) -> Result<ServerAddr, SelectorError> {
        let servers = self.servers.load();
        let index = match servers.len() {
            0 => return Err(SelectorError::NoServers),
            1 => 0,
            n => (key_checksum(key) % n as u32) as usize,
        };
        servers.get(index).cloned().ok_or(SelectorError::NoServers)
    }

    fn servers(&self) -> Arc<ServerSet> {
        self.servers.load()
    }

    fn strategy(&self) -> SelectionStrategy {
        SelectionStrategy::Modulo
    }
}
