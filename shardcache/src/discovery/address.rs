//! Address list entries.
//!
//! Each comma-separated entry of the `addresses` setting is one of:
//!
//! | entry | meaning |
//! |---|---|
//! | `host:port` | static address, used verbatim |
//! | `dns+host:port` | A/AAAA lookup of `host`, every IP paired with `port` |
//! | `dnssrv+_svc._proto.domain` | SRV lookup, targets resolved to IPs |
//! | `dnssrvnoa+_svc._proto.domain` | SRV lookup, targets used as names |

use std::fmt;

use crate::config::ConfigError;
use crate::selector::{split_host_port, ServerAddr};

const DNS_PREFIX: &str = "dns+";
const DNS_SRV_PREFIX: &str = "dnssrv+";
const DNS_SRV_NO_A_PREFIX: &str = "dnssrvnoa+";

/// One parsed address list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    /// Fixed `host:port`.
    Static(ServerAddr),

    /// A/AAAA lookup of `host`.
    Dns { host: String, port: u16 },

    /// SRV lookup of `name`. With `resolve_targets`, each SRV target is looked
    /// up again and replaced by its IPs.
    Srv { name: String, resolve_targets: bool },
}

impl AddressSpec {
    /// Parses one trimmed, non-empty entry.
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidAddress(entry.to_string());

        // Longest prefix first: "dnssrvnoa+" also starts with "dnssrv"
        if let Some(name) = entry.strip_prefix(DNS_SRV_NO_A_PREFIX) {
            return srv_name(name)
                .map(|name| AddressSpec::Srv {
                    name,
                    resolve_targets: false,
                })
                .ok_or_else(invalid);
        }
        if let Some(name) = entry.strip_prefix(DNS_SRV_PREFIX) {
            return srv_name(name)
                .map(|name| AddressSpec::Srv {
                    name,
                    resolve_targets: true,
                })
                .ok_or_else(invalid);
        }
        if let Some(rest) = entry.strip_prefix(DNS_PREFIX) {
            let (host, port) = split_host_port(rest).ok_or_else(invalid)?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            return Ok(AddressSpec::Dns {
                host: host.to_string(),
                port,
            });
        }
        if entry.contains('+') {
            // Unknown provider prefix
            return Err(invalid());
        }

        let addr = ServerAddr::from(entry);
        addr.validate().map_err(|_| invalid())?;
        Ok(AddressSpec::Static(addr))
    }

    /// Returns `true` if resolving this entry needs a DNS lookup.
    pub fn needs_lookup(&self) -> bool {
        !matches!(self, AddressSpec::Static(_))
    }
}

fn srv_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) || name.contains(':') {
        None
    } else {
        Some(name.to_string())
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Static(addr) => write!(f, "{}", addr),
            AddressSpec::Dns { host, port } if host.contains(':') => {
                write!(f, "{}[{}]:{}", DNS_PREFIX, host, port)
            }
            AddressSpec::Dns { host, port } => write!(f, "{}{}:{}", DNS_PREFIX, host, port),
            AddressSpec::Srv {
                name,
                resolve_targets: true,
            } => write!(f, "{}{}", DNS_SRV_PREFIX, name),
            AddressSpec::Srv {
                name,
                resolve_targets: false,
            } => write!(f, "{}{}", DNS_SRV_NO_A_PREFIX, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static() {
        assert_eq!(
            AddressSpec::parse("memcached-0:11211"),
            Ok(AddressSpec::Static(ServerAddr::from("memcached-0:11211")))
        );
    }

    #[test]
    fn test_parse_dns() {
        assert_eq!(
            AddressSpec::parse("dns+memcached.svc:11211"),
            Ok(AddressSpec::Dns {
                host: "memcached.svc".to_string(),
                port: 11211,
            })
        );
    }

    #[test]
    fn test_parse_srv_variants() {
        assert_eq!(
            AddressSpec::parse("dnssrv+_memcached._tcp.memcached"),
            Ok(AddressSpec::Srv {
                name: "_memcached._tcp.memcached".to_string(),
                resolve_targets: true,
            })
        );
        assert_eq!(
            AddressSpec::parse("dnssrvnoa+_memcached._tcp.memcached"),
            Ok(AddressSpec::Srv {
                name: "_memcached._tcp.memcached".to_string(),
                resolve_targets: false,
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "dns+memcached",
            "dns+:11211",
            "dnssrv+",
            "dnssrvnoa+host:11211",
            "consul+memcached:11211",
            "memcached",
        ] {
            assert_eq!(
                AddressSpec::parse(bad),
                Err(ConfigError::InvalidAddress(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        for entry in [
            "a:1",
            "dns+memcached:11211",
            "dns+[::1]:11211",
            "dnssrv+_memcached._tcp.m",
            "dnssrvnoa+_memcached._tcp.m",
        ] {
            assert_eq!(AddressSpec::parse(entry).unwrap().to_string(), entry);
        }
    }

    #[test]
    fn test_needs_lookup() {
        assert!(!AddressSpec::parse("a:1").unwrap().needs_lookup());
        assert!(AddressSpec::parse("dns+a:1").unwrap().needs_lookup());
    }
}
