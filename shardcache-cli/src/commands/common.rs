//! Options shared by every subcommand.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use shardcache::config::ClientConfig;
use shardcache::discovery::{build_resolver, HickoryLookup, Resolver};
use shardcache::selector::{SelectionStrategy, ServerSet};

use crate::error::CliError;

/// Section read from `--config` when `--section` is not given.
pub const DEFAULT_SECTION: &str = "memcached";

/// Selection strategy for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StrategyArg {
    /// CRC-32 of the key modulo the server count
    Modulo,
    /// Jump consistent hash
    Consistent,
}

impl From<StrategyArg> for SelectionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Modulo => SelectionStrategy::Modulo,
            StrategyArg::Consistent => SelectionStrategy::Consistent,
        }
    }
}

/// Discovery options. Flags override values from the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// INI file holding client sections
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Section of the config file to use [default: memcached]
    #[arg(long, global = true, value_name = "NAME")]
    pub section: Option<String>,

    /// Comma-separated address list (host:port, dns+, dnssrv+, dnssrvnoa+)
    #[arg(long, global = true, conflicts_with = "hostname")]
    pub addresses: Option<String>,

    /// Domain for the SRV lookup of _<service>._tcp.<hostname>
    #[arg(long, global = true)]
    pub hostname: Option<String>,

    /// SRV service name
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// Key to server selection strategy
    #[arg(long, global = true, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info", value_name = "FILTER")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl GlobalArgs {
    /// Client name: the config section, or the default section name.
    pub fn client_name(&self) -> &str {
        self.section.as_deref().unwrap_or(DEFAULT_SECTION)
    }

    /// Builds the client configuration: file section first, then flags.
    ///
    /// A discovery source given on the command line replaces the file's
    /// source entirely, so `--addresses` never conflicts with a `hostname`
    /// from the file.
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_ini_file(path, self.client_name())?,
            None => ClientConfig::default(),
        };

        if let Some(addresses) = &self.addresses {
            config.hostname = None;
            config.addresses = addresses.clone();
        }
        if let Some(hostname) = &self.hostname {
            config.addresses.clear();
            config.hostname = Some(hostname.clone());
        }
        if let Some(service) = &self.service {
            config.service = service.clone();
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        Ok(config)
    }
}

/// Builds a resolver backed by the system DNS configuration.
pub fn resolver_for(config: &ClientConfig) -> Result<Arc<dyn Resolver>, CliError> {
    let source = config.discovery_source()?;
    Ok(build_resolver(
        &source,
        Arc::new(HickoryLookup::from_system_conf()),
    ))
}

/// Resolves once and returns the sorted server set.
pub async fn resolve_once(resolver: &dyn Resolver) -> Result<ServerSet, CliError> {
    let addrs = resolver.resolve().await?;
    Ok(ServerSet::from_unsorted(addrs))
}
