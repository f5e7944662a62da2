//! DNS lookup abstraction for testability.
//!
//! Resolvers talk to DNS only through [`DnsLookup`], so tests can inject a
//! mock and production uses [`HickoryLookup`].

use std::net::IpAddr;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use tracing::warn;

use super::DiscoveryError;
use crate::BoxFuture;

/// One SRV record.
///
/// Priority and weight are carried for logging only; resolvers treat every
/// target as equally eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvTarget {
    /// Target host name, without the trailing root dot.
    pub target: String,
    /// Target port.
    pub port: u16,
    /// Record priority (ignored).
    pub priority: u16,
    /// Record weight (ignored).
    pub weight: u16,
}

/// DNS operations used by discovery.
pub trait DnsLookup: Send + Sync {
    /// Looks up SRV records for a full record name such as
    /// `_memcached._tcp.memcached.default.svc.cluster.local`.
    fn lookup_srv<'a>(&'a self, name: &'a str)
        -> BoxFuture<'a, Result<Vec<SrvTarget>, DiscoveryError>>;

    /// Looks up A and AAAA records for `host`.
    fn lookup_ip<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, DiscoveryError>>;
}

/// [`DnsLookup`] backed by the hickory async resolver.
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// Creates a lookup using the system resolver configuration
    /// (`/etc/resolv.conf` on Unix), falling back to hickory's defaults if it
    /// cannot be read.
    pub fn from_system_conf() -> Self {
        match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => Self { resolver },
            Err(e) => {
                warn!(error = %e, "Failed to read system DNS configuration, using defaults");
                Self::with_config(ResolverConfig::default(), ResolverOpts::default())
            }
        }
    }

    /// Creates a lookup with an explicit resolver configuration.
    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

/// NOERROR with an empty answer is a valid empty membership, not a failure.
fn is_empty_answer(e: &ResolveError) -> bool {
    matches!(
        e.kind(),
        ResolveErrorKind::NoRecordsFound { response_code, .. } if *response_code == ResponseCode::NoError
    )
}

impl DnsLookup for HickoryLookup {
    fn lookup_srv<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<SrvTarget>, DiscoveryError>> {
        Box::pin(async move {
            let lookup = match self.resolver.srv_lookup(name).await {
                Ok(lookup) => lookup,
                Err(e) if is_empty_answer(&e) => return Ok(Vec::new()),
                Err(e) => return Err(DiscoveryError::resolution(name, e)),
            };

            Ok(lookup
                .iter()
                .map(|srv| SrvTarget {
                    target: srv.target().to_utf8().trim_end_matches('.').to_string(),
                    port: srv.port(),
                    priority: srv.priority(),
                    weight: srv.weight(),
                })
                .collect())
        })
    }

    fn lookup_ip<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, DiscoveryError>> {
        Box::pin(async move {
            match self.resolver.lookup_ip(host).await {
                Ok(lookup) => Ok(lookup.iter().collect()),
                Err(e) if is_empty_answer(&e) => Ok(Vec::new()),
                Err(e) => Err(DiscoveryError::resolution(host, e)),
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    /// Scripted DNS answers. Names without an entry fail like NXDOMAIN.
    #[derive(Default)]
    pub(crate) struct MockLookup {
        srv: Mutex<HashMap<String, Vec<SrvTarget>>>,
        ip: Mutex<HashMap<String, Vec<IpAddr>>>,
        pub(crate) calls: AtomicUsize,
    }

    impl MockLookup {
        pub(crate) fn set_srv(&self, name: &str, targets: &[(&str, u16)]) {
            let records = targets
                .iter()
                .enumerate()
                .map(|(i, (target, port))| SrvTarget {
                    target: target.to_string(),
                    port: *port,
                    priority: i as u16,
                    weight: 100 - i as u16,
                })
                .collect();
            self.srv.lock().insert(name.to_string(), records);
        }

        pub(crate) fn set_ip(&self, host: &str, ips: &[&str]) {
            let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
            self.ip.lock().insert(host.to_string(), ips);
        }

        pub(crate) fn remove(&self, name: &str) {
            self.srv.lock().remove(name);
            self.ip.lock().remove(name);
        }
    }

    impl DnsLookup for MockLookup {
        fn lookup_srv<'a>(
            &'a self,
            name: &'a str,
        ) -> BoxFuture<'a, Result<Vec<SrvTarget>, DiscoveryError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self
                .srv
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| DiscoveryError::resolution(name, "NXDOMAIN"));
            Box::pin(async move { result })
        }

        fn lookup_ip<'a>(
            &'a self,
            host: &'a str,
        ) -> BoxFuture<'a, Result<Vec<IpAddr>, DiscoveryError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self
                .ip
                .lock()
                .get(host)
                .cloned()
                .ok_or_else(|| DiscoveryError::resolution(host, "NXDOMAIN"));
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn test_mock_lookup_answers_and_fails() {
        let mock = MockLookup::default();
        mock.set_srv("_memcached._tcp.m", &[("m-0.m", 11211)]);

        let targets = mock.lookup_srv("_memcached._tcp.m").await.unwrap();
        assert_eq!(targets[0].target, "m-0.m");
        assert!(mock.lookup_ip("m-0.m").await.is_err());
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
    }
}
