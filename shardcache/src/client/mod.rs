//! The self-maintaining cache client.
//!
//! [`CacheClient`] owns a selector, the discovery loop feeding it and a
//! transport. Construction resolves the server list once before returning;
//! after that the list refreshes in the background until [`CacheClient::stop`].
//!
//! ```ignore
//! use shardcache::{CacheClient, ClientConfig};
//! use shardcache::protocol::Item;
//!
//! let config = ClientConfig::default().with_hostname("memcached.default.svc.cluster.local");
//! let client = CacheClient::new(&config, "chunks").await?;
//!
//! client.set(&Item::new("user123", b"alice".to_vec())).await?;
//! let item = client.get("user123").await?;
//!
//! client.stop().await;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ClientConfig, ConfigError};
use crate::discovery::{
    build_resolver, DiscoveryError, DiscoveryLoop, DnsLookup, HickoryLookup, LoopState, Resolver,
    ServerListUpdater,
};
use crate::protocol::{legal_key, Item, ProtocolError, TcpTransport, Transport};
use crate::selector::{SelectionStrategy, SelectorError, ServerAddr, ServerSelector, ServerSet};
use crate::telemetry::{DiscoveryMetrics, DiscoverySnapshot};
use crate::BoxFuture;

/// Errors returned to cache callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No server could be picked (the server set is empty).
    #[error("cache unavailable: {0}")]
    Unavailable(#[from] SelectorError),

    /// The client configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Discovery could not be started.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The key is rejected before routing.
    #[error("malformed key {0:?}")]
    MalformedKey(String),

    /// The exchange with `server` failed.
    #[error("request to {server} failed: {source}")]
    Protocol {
        server: ServerAddr,
        #[source]
        source: ProtocolError,
    },
}

/// Cache operations, for callers that want to substitute the client.
pub trait MemcachedClient: Send + Sync {
    /// Fetches `keys`. Misses are absent from the map.
    fn get_multi<'a>(
        &'a self,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, Item>, ClientError>>;

    /// Stores `item`.
    fn set<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<(), ClientError>>;
}

/// Memcached client whose server list maintains itself.
pub struct CacheClient {
    name: String,
    selector: Arc<dyn ServerSelector>,
    transport: Arc<dyn Transport>,
    metrics: Arc<DiscoveryMetrics>,
    discovery: DiscoveryLoop,
}

impl CacheClient {
    /// Creates a client using system DNS and TCP connections.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for an invalid configuration. A failed
    /// initial resolution is logged, not returned.
    pub async fn new(config: &ClientConfig, name: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_components(
            config,
            name,
            Arc::new(HickoryLookup::from_system_conf()),
            Arc::new(TcpTransport::from_config(config)),
        )
        .await
    }

    /// Creates a client with an explicit DNS lookup and transport.
    pub async fn with_components(
        config: &ClientConfig,
        name: impl Into<String>,
        lookup: Arc<dyn DnsLookup>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let source = config.discovery_source()?;
        let resolver = build_resolver(&source, lookup);
        Self::from_resolver(name, resolver, config.strategy, config.update_interval, transport).await
    }

    /// Creates a client around any resolver.
    pub async fn from_resolver(
        name: impl Into<String>,
        resolver: Arc<dyn Resolver>,
        strategy: SelectionStrategy,
        update_interval: Duration,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        if update_interval.is_zero() {
            return Err(ConfigError::ZeroInterval.into());
        }

        let name = name.into();
        let selector = strategy.build();
        let metrics = Arc::new(DiscoveryMetrics::new(name.clone()));
        let pool = Arc::clone(&transport);
        let updater = ServerListUpdater::new(
            name.clone(),
            resolver,
            Arc::clone(&selector),
            Arc::clone(&metrics),
        )
        .with_membership_hook(move |servers| pool.retain_servers(servers));

        let discovery = DiscoveryLoop::new(Arc::new(updater), update_interval);
        discovery.start().await?;

        info!(
            name = %name,
            strategy = %strategy,
            servers = selector.servers().len(),
            "Cache client ready"
        );

        Ok(Self {
            name,
            selector,
            transport,
            metrics,
            discovery,
        })
    }

    /// Client name used in logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The selection strategy in use.
    pub fn strategy(&self) -> SelectionStrategy {
        self.selector.strategy()
    }

    /// The server `key` currently maps to.
    pub fn pick_server(&self, key: &str) -> Result<ServerAddr, ClientError> {
        Ok(self.selector.pick_server(key)?)
    }

    /// Snapshot of the active server set.
    pub fn servers(&self) -> Arc<ServerSet> {
        self.selector.servers()
    }

    /// Discovery counters.
    pub fn metrics(&self) -> DiscoverySnapshot {
        self.metrics.snapshot()
    }

    /// Lifecycle state of the discovery loop.
    pub fn discovery_state(&self) -> LoopState {
        self.discovery.state()
    }

    /// Fetches `keys`, one request per owning server, all in flight at once.
    ///
    /// Misses are absent from the result. If any server fails, the first
    /// failure (in server order) is returned.
    pub async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Item>, ClientError> {
        let mut by_server: BTreeMap<ServerAddr, Vec<String>> = BTreeMap::new();
        for key in keys {
            if !legal_key(key) {
                return Err(ClientError::MalformedKey(key.clone()));
            }
            let server = self.selector.pick_server(key)?;
            by_server.entry(server).or_default().push(key.clone());
        }

        let requests = by_server.iter().map(|(server, keys)| async move {
            self.transport
                .get_multi(server, keys)
                .await
                .map_err(|source| ClientError::Protocol {
                    server: server.clone(),
                    source,
                })
        });

        let mut items = HashMap::with_capacity(keys.len());
        for result in join_all(requests).await {
            items.extend(result?);
        }
        debug!(name = %self.name, requested = keys.len(), hits = items.len(), "get_multi");
        Ok(items)
    }

    /// Fetches one key. `None` on a miss.
    pub async fn get(&self, key: &str) -> Result<Option<Item>, ClientError> {
        let keys = [key.to_string()];
        let mut items = self.get_multi(&keys).await?;
        Ok(items.remove(key))
    }

    /// Stores `item` on the server its key maps to.
    pub async fn set(&self, item: &Item) -> Result<(), ClientError> {
        if !legal_key(&item.key) {
            return Err(ClientError::MalformedKey(item.key.clone()));
        }
        let server = self.selector.pick_server(&item.key)?;
        self.transport
            .set(&server, item)
            .await
            .map_err(|source| ClientError::Protocol { server, source })
    }

    /// Stops discovery and waits for the background task to exit.
    ///
    /// The client keeps serving requests against the last server set.
    pub async fn stop(&self) {
        self.discovery.stop().await;
    }
}

impl MemcachedClient for CacheClient {
    fn get_multi<'a>(
        &'a self,
        keys: &'a [String],
    ) -> BoxFuture<'a, Result<HashMap<String, Item>, ClientError>> {
        Box::pin(CacheClient::get_multi(self, keys))
    }

    fn set<'a>(&'a self, item: &'a Item) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(CacheClient::set(self, item))
    }
}
