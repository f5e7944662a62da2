//! CLI error type.

use std::fmt;

use shardcache::config::ConfigError;
use shardcache::discovery::DiscoveryError;
use shardcache::ClientError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing configuration.
    Config(String),
    /// Server discovery failed.
    Discovery(DiscoveryError),
    /// A cache operation failed.
    Client(ClientError),
    /// The async runtime or a signal handler could not be set up.
    Runtime(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Discovery(e) => write!(f, "Discovery failed: {}", e),
            CliError::Client(e) => write!(f, "Cache operation failed: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Discovery(e) => Some(e),
            CliError::Client(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<DiscoveryError> for CliError {
    fn from(e: DiscoveryError) -> Self {
        CliError::Discovery(e)
    }
}

impl From<ClientError> for CliError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Config(e) => e.into(),
            other => CliError::Client(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_flatten() {
        let err: CliError = ClientError::Config(ConfigError::NoDiscoverySource).into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error: no discovery source"));
    }

    #[test]
    fn test_discovery_display() {
        let err: CliError = DiscoveryError::resolution("_memcached._tcp.m", "NXDOMAIN").into();
        assert_eq!(
            err.to_string(),
            "Discovery failed: failed to resolve _memcached._tcp.m: NXDOMAIN"
        );
    }
}
