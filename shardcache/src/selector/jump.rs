//! Jump consistent hash server selection.
//!
//! Implements the Lamping & Veach jump consistent hash over the sorted server
//! list. For a key hash `h`, `jump_hash(h, n + 1)` is either
//! `jump_hash(h, n)` or `n`: growing the list by one server only moves keys
//! onto the new last bucket, about `1 / (n + 1)` of them.
//!
//! Buckets are positions in the sorted [`ServerSet`]. A new server that sorts
//! last behaves as above; one that sorts into the middle shifts the positions
//! after it and moves more keys.

use std::sync::Arc;

use xxhash_rust::xxh64::xxh64;

use super::{SelectionStrategy, SelectorError, ServerAddr, ServerSelector, ServerSet, SharedServerSet};

const JUMP_MULTIPLIER: u64 = 2_862_933_555_777_941_757;

/// Maps a 64-bit key hash onto a bucket in `[0, num_buckets)`.
///
/// Returns `None` when `num_buckets` is zero.
pub fn jump_hash(mut key: u64, num_buckets: usize) -> Option<usize> {
    if num_buckets == 0 {
        return None;
    }

    let buckets = num_buckets as i64;
    let mut bucket: i64 = -1;
    let mut next: i64 = 0;
    while next < buckets {
        bucket = next;
        key = key.wrapping_mul(JUMP_MULTIPLIER).wrapping_add(1);
        next = ((bucket + 1) as f64 * ((1u64 << 31) as f64 / ((key >> 33) + 1) as f64)) as i64;
    }
    Some(bucket as usize)
}

/// Selects servers with [`jump_hash`] over the XXH64 (seed 0) hash of the key.
#[derive(Debug, Default)]
pub struct JumpHashSelector {
    servers: SharedServerSet,
}

impl JumpHashSelector {
    /// Creates a selector with no servers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServerSelector for JumpHashSelector {
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
            n => jump_hash(xxh64(key.as_bytes(), 0), n).ok_or(SelectorError::NoServers)?,
        };
        servers.get(index).cloned().ok_or(SelectorError::NoServers)
    }

    fn servers(&self) -> Arc<ServerSet> {
        self.servers.load()
    }

    fn strategy(&self) -> SelectionStrategy {
        SelectionStrategy::Consistent
    }
}
