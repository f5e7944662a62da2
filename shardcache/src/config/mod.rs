//! Client configuration.
//!
//! [`ClientConfig`] carries every setting one named cache client needs. It can
//! be built in code with the `with_*` methods or loaded from an INI section
//! (see [`ClientConfig::from_ini_file`]).
//!
//! ```
//! use std::time::Duration;
//! use shardcache::config::{ClientConfig, DiscoverySource};
//! use shardcache::selector::SelectionStrategy;
//!
//! let config = ClientConfig::default()
//!     .with_addresses("b:11211,a:11211")
//!     .with_strategy(SelectionStrategy::Consistent)
//!     .with_update_interval(Duration::from_secs(30));
//!
//! assert!(matches!(config.discovery_source(), Ok(DiscoverySource::Static(_))));
//! ```

mod file;

use std::time::Duration;

use thiserror::Error;

use crate::discovery::AddressSpec;
use crate::selector::{SelectionStrategy, ServerAddr};

// ==================== Defaults ====================

/// Default SRV service name.
pub const DEFAULT_SERVICE: &str = "memcached";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default number of idle connections kept per server.
pub const DEFAULT_MAX_IDLE_CONNS: usize = 16;

/// Default period between discovery ticks.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Errors raised while building or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Neither a hostname nor an address list is set.
    #[error("no discovery source configured: set either a hostname or an address list")]
    NoDiscoverySource,

    /// Both a hostname and an address list are set.
    #[error("conflicting discovery sources: hostname {hostname:?} and an address list are both set")]
    ConflictingSources { hostname: String },

    /// An address list entry is not `host:port` or a recognized DNS form.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    /// The update interval is zero.
    #[error("update interval must be greater than zero")]
    ZeroInterval,

    /// A configuration value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    /// The configuration file could not be read or parsed.
    #[error("failed to read config file: {0}")]
    File(String),

    /// The requested section is missing from the configuration file.
    #[error("config section [{0}] not found")]
    MissingSection(String),
}

/// Where the server list comes from, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    /// Fixed `host:port` list. Never touches the network.
    Static(Vec<ServerAddr>),

    /// SRV lookup of `_<service>._tcp.<hostname>`.
    Srv { service: String, hostname: String },

    /// Address list containing at least one DNS-backed entry.
    AddressList(Vec<AddressSpec>),
}

/// Configuration for one named cache client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Domain for the SRV lookup. `None` or empty disables SRV discovery.
    pub hostname: Option<String>,

    /// SRV service name (default: `memcached`).
    pub service: String,

    /// Comma-separated address list (`host:port`, `dns+`, `dnssrv+`,
    /// `dnssrvnoa+`).
    pub addresses: String,

    /// Per-request timeout (default: 100ms).
    pub timeout: Duration,

    /// Idle connections kept per server (default: 16).
    pub max_idle_conns: usize,

    /// Period between discovery ticks (default: 1 minute).
    pub update_interval: Duration,

    /// Key → server strategy (default: modulo).
    pub strategy: SelectionStrategy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            service: DEFAULT_SERVICE.to_string(),
            addresses: String::new(),
            timeout: DEFAULT_TIMEOUT,
            max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            strategy: SelectionStrategy::default(),
        }
    }
}

impl ClientConfig {
    /// Set the SRV domain.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the SRV service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the comma-separated address list.
    pub fn with_addresses(mut self, addresses: impl Into<String>) -> Self {
        self.addresses = addresses.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the idle connection limit per server.
    pub fn with_max_idle_conns(mut self, max_idle_conns: usize) -> Self {
        self.max_idle_conns = max_idle_conns;
        self
    }

    /// Set the discovery period.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Set the selection strategy.
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Non-empty address list entries, trimmed.
    fn address_entries(&self) -> Vec<&str> {
        self.addresses
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect()
    }

    fn srv_hostname(&self) -> Option<&str> {
        self.hostname
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
    }

    /// Validates the configuration and returns the discovery source.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroInterval`] if `update_interval` is zero
    /// - [`ConfigError::ConflictingSources`] if a hostname and addresses are both set
    /// - [`ConfigError::NoDiscoverySource`] if neither is set
    /// - [`ConfigError::InvalidAddress`] for a malformed address entry
    /// - [`ConfigError::InvalidValue`] for an empty SRV service name
    pub fn discovery_source(&self) -> Result<DiscoverySource, ConfigError> {
        if self.update_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        let entries = self.address_entries();
        match (self.srv_hostname(), entries.is_empty()) {
            (Some(hostname), false) => Err(ConfigError::ConflictingSources {
                hostname: hostname.to_string(),
            }),
            (None, true) => Err(ConfigError::NoDiscoverySource),
            (Some(hostname), true) => {
                let service = self.service.trim();
                if service.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: "service".to_string(),
                        value: self.service.clone(),
                    });
                }
                Ok(DiscoverySource::Srv {
                    service: service.to_string(),
                    hostname: hostname.to_string(),
                })
            }
            (None, false) => {
                let specs = entries
                    .into_iter()
                    .map(AddressSpec::parse)
                    .collect::<Result<Vec<_>, _>>()?;

                let statics: Option<Vec<ServerAddr>> = specs
                    .iter()
                    .map(|spec| match spec {
                        AddressSpec::Static(addr) => Some(addr.clone()),
                        _ => None,
                    })
                    .collect();

                Ok(match statics {
                    Some(addrs) => DiscoverySource::Static(addrs),
                    None => DiscoverySource::AddressList(specs),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.service, "memcached");
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.max_idle_conns, 16);
        assert_eq!(config.update_interval, Duration::from_secs(60));
        assert_eq!(config.strategy, SelectionStrategy::Modulo);
    }

    #[test]
    fn test_static_source() {
        let config = ClientConfig::default().with_addresses(" b:1, a:1 ,,c:1 ");
        assert_eq!(
            config.discovery_source(),
            Ok(DiscoverySource::Static(vec![
                ServerAddr::from("b:1"),
                ServerAddr::from("a:1"),
                ServerAddr::from("c:1"),
            ]))
        );
    }

    #[test]
    fn test_srv_source() {
        let config = ClientConfig::default().with_hostname("memcached.default.svc.cluster.local");
        assert_eq!(
            config.discovery_source(),
            Ok(DiscoverySource::Srv {
                service: "memcached".to_string(),
                hostname: "memcached.default.svc.cluster.local".to_string(),
            })
        );
    }

    #[test]
    fn test_mixed_list_is_address_list() {
        let config = ClientConfig::default().with_addresses("a:1,dns+memcached:11211");
        match config.discovery_source() {
            Ok(DiscoverySource::AddressList(specs)) => assert_eq!(specs.len(), 2),
            other => panic!("expected address list, got {other:?}"),
        }
    }

    #[test]
    fn test_no_source() {
        let config = ClientConfig::default().with_addresses(" , ");
        assert_eq!(config.discovery_source(), Err(ConfigError::NoDiscoverySource));

        let config = ClientConfig::default().with_hostname("  ");
        assert_eq!(config.discovery_source(), Err(ConfigError::NoDiscoverySource));
    }

    #[test]
    fn test_conflicting_sources() {
        let config = ClientConfig::default()
            .with_hostname("memcached")
            .with_addresses("a:1");
        assert!(matches!(
            config.discovery_source(),
            Err(ConfigError::ConflictingSources { .. })
        ));
    }

    #[test]
    fn test_zero_interval() {
        let config = ClientConfig::default()
            .with_addresses("a:1")
            .with_update_interval(Duration::ZERO);
        assert_eq!(config.discovery_source(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn test_invalid_address() {
        let config = ClientConfig::default().with_addresses("a:1,nope");
        assert_eq!(
            config.discovery_source(),
            Err(ConfigError::InvalidAddress("nope".to_string()))
        );
    }

    #[test]
    fn test_empty_service() {
        let config = ClientConfig::default()
            .with_hostname("memcached")
            .with_service(" ");
        assert!(matches!(
            config.discovery_source(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "service"
        ));
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::InvalidValue {
            key: "timeout_ms".to_string(),
            value: "soon".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value \"soon\" for timeout_ms");
    }
}
