//! Resolvers: configured source → unordered server addresses.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::{AddressSpec, DiscoveryError, DnsLookup};
use crate::config::DiscoverySource;
use crate::selector::ServerAddr;
use crate::BoxFuture;

/// Produces the current list of server addresses.
///
/// The result is unordered and may contain duplicates; callers build a
/// [`ServerSet`](crate::selector::ServerSet) from it. An empty result is a
/// success.
pub trait Resolver: Send + Sync {
    /// Resolves the configured source once.
    fn resolve(&self) -> BoxFuture<'_, Result<Vec<ServerAddr>, DiscoveryError>>;

    /// Short description of the source for log lines.
    fn describe(&self) -> String;
}

/// Builds the resolver for a validated discovery source.
pub fn build_resolver(source: &DiscoverySource, lookup: Arc<dyn DnsLookup>) -> Arc<dyn Resolver> {
    match source {
        DiscoverySource::Static(addrs) => Arc::new(StaticResolver::new(addrs.clone())),
        DiscoverySource::Srv { service, hostname } => {
            Arc::new(SrvResolver::new(service.clone(), hostname.clone(), lookup))
        }
        DiscoverySource::AddressList(specs) => {
            Arc::new(AddressListResolver::new(specs.clone(), lookup))
        }
    }
}

fn socket_addr(ip: IpAddr, port: u16) -> ServerAddr {
    // SocketAddr brackets IPv6 hosts
    ServerAddr::new(SocketAddr::new(ip, port).to_string())
}

// =============================================================================
// Static
// =============================================================================

/// Returns a fixed address list verbatim.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    addresses: Vec<ServerAddr>,
}

impl StaticResolver {
    /// Creates a resolver for a fixed list.
    pub fn new(addresses: Vec<ServerAddr>) -> Self {
        Self { addresses }
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self) -> BoxFuture<'_, Result<Vec<ServerAddr>, DiscoveryError>> {
        let addresses = self.addresses.clone();
        Box::pin(async move { Ok(addresses) })
    }

    fn describe(&self) -> String {
        format!("static list of {}", self.addresses.len())
    }
}

// =============================================================================
// SRV
// =============================================================================

/// Resolves `_<service>._tcp.<hostname>` SRV records to `target:port`.
pub struct SrvResolver {
    record: String,
    lookup: Arc<dyn DnsLookup>,
}

impl SrvResolver {
    /// Creates a resolver for the given service and domain.
    pub fn new(service: String, hostname: String, lookup: Arc<dyn DnsLookup>) -> Self {
        Self {
            record: format!("_{}._tcp.{}", service, hostname),
            lookup,
        }
    }

    /// The SRV record name that gets queried.
    pub fn record(&self) -> &str {
        &self.record
    }
}

impl Resolver for SrvResolver {
    fn resolve(&self) -> BoxFuture<'_, Result<Vec<ServerAddr>, DiscoveryError>> {
        Box::pin(async move {
            let targets = self.lookup.lookup_srv(&self.record).await?;
            trace!(record = %self.record, ?targets, "SRV answer");
            Ok(targets
                .into_iter()
                .map(|srv| ServerAddr::new(format!("{}:{}", srv.target, srv.port)))
                .collect())
        })
    }

    fn describe(&self) -> String {
        format!("SRV {}", self.record)
    }
}

// =============================================================================
// Address list
// =============================================================================

/// Resolves a mixed address list, entry by entry.
///
/// The last good result of every DNS-backed entry is remembered. When an
/// entry's lookup fails and a previous result exists, the stale result is
/// used and a warning logged; when no previous result exists the whole
/// resolution fails.
pub struct AddressListResolver {
    entries: Vec<AddressSpec>,
    lookup: Arc<dyn DnsLookup>,
    last_good: Mutex<Vec<Option<Vec<ServerAddr>>>>,
}

impl AddressListResolver {
    /// Creates a resolver for the given entries.
    pub fn new(entries: Vec<AddressSpec>, lookup: Arc<dyn DnsLookup>) -> Self {
        let last_good = Mutex::new(vec![None; entries.len()]);
        Self {
            entries,
            lookup,
            last_good,
        }
    }

    async fn resolve_entry(&self, spec: &AddressSpec) -> Result<Vec<ServerAddr>, DiscoveryError> {
        match spec {
            AddressSpec::Static(addr) => Ok(vec![addr.clone()]),
            AddressSpec::Dns { host, port } => {
                let ips = self.lookup.lookup_ip(host).await?;
                Ok(ips.into_iter().map(|ip| socket_addr(ip, *port)).collect())
            }
            AddressSpec::Srv {
                name,
                resolve_targets: false,
            } => {
                let targets = self.lookup.lookup_srv(name).await?;
                Ok(targets
                    .into_iter()
                    .map(|srv| ServerAddr::new(format!("{}:{}", srv.target, srv.port)))
                    .collect())
            }
            AddressSpec::Srv {
                name,
                resolve_targets: true,
            } => {
                let targets = self.lookup.lookup_srv(name).await?;
                let mut addrs = Vec::with_capacity(targets.len());
                for srv in targets {
                    let ips = self.lookup.lookup_ip(&srv.target).await?;
                    addrs.extend(ips.into_iter().map(|ip| socket_addr(ip, srv.port)));
                }
                Ok(addrs)
            }
        }
    }
}

impl Resolver for AddressListResolver {
    fn resolve(&self) -> BoxFuture<'_, Result<Vec<ServerAddr>, DiscoveryError>> {
        Box::pin(async move {
            let results = join_all(self.entries.iter().map(|spec| self.resolve_entry(spec))).await;

            let mut last_good = self.last_good.lock();
            let mut addrs = Vec::new();
            for (index, (spec, result)) in self.entries.iter().zip(results).enumerate() {
                match result {
                    Ok(resolved) => {
                        debug!(entry = %spec, count = resolved.len(), "Resolved address entry");
                        addrs.extend(resolved.iter().cloned());
                        last_good[index] = Some(resolved);
                    }
                    Err(e) => match &last_good[index] {
                        Some(stale) => {
                            warn!(entry = %spec, error = %e, "Address lookup failed, reusing previous result");
                            addrs.extend(stale.iter().cloned());
                        }
                        None => return Err(e),
                    },
                }
            }
            Ok(addrs)
        })
    }

    fn describe(&self) -> String {
        let entries: Vec<String> = self.entries.iter().map(ToString::to_string).collect();
        format!("address list [{}]", entries.join(", "))
    }
}
