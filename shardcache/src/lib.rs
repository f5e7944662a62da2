//! # shardcache
//!
//! A self-maintaining memcached client: the set of cache servers is
//! rediscovered from DNS on a fixed period and every key is routed to one
//! server by a pluggable selection strategy.
//!
//! ## Architecture
//!
//! ```text
//!  get_multi / set
//!        │
//!        ▼
//!  legal_key ──► ServerSelector::pick_server ──► Transport ──► memcached
//!                        ▲
//!                        │ set_servers (whole-set swap)
//!                        │
//!  DiscoveryLoop ──► ServerListUpdater ◄── Resolver ◄── DNS / static list
//! ```
//!
//! ## Modules
//!
//! - [`selector`]: key → server mapping (modulo and jump consistent hash)
//! - [`discovery`]: resolvers and the periodic refresh loop
//! - [`protocol`]: memcached text protocol over pooled TCP connections
//! - [`client`]: the [`CacheClient`] facade tying the pieces together
//! - [`config`]: [`ClientConfig`] and INI loading
//! - [`telemetry`]: discovery counters
//! - [`logging`]: tracing subscriber setup for binaries

use std::future::Future;
use std::pin::Pin;

pub mod client;
pub mod config;
pub mod discovery;
pub mod logging;
pub mod protocol;
pub mod selector;
pub mod telemetry;

pub use client::{CacheClient, ClientError, MemcachedClient};
pub use config::ClientConfig;
pub use selector::{SelectionStrategy, ServerAddr, ServerSelector, ServerSet};

/// Version of the shardcache library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Boxed future returned by the dyn-compatible async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
