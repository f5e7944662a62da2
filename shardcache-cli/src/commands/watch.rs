//! Watch command - run the discovery loop until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use shardcache::discovery::{DiscoveryLoop, ServerListUpdater};
use shardcache::telemetry::DiscoveryMetrics;

use super::common::{resolver_for, GlobalArgs};
use crate::error::CliError;

/// Run the watch command.
pub async fn run(global: &GlobalArgs, interval_secs: Option<u64>) -> Result<(), CliError> {
    let mut config = global.client_config()?;
    if let Some(secs) = interval_secs {
        config.update_interval = Duration::from_secs(secs);
    }
    let resolver = resolver_for(&config)?;

    let selector = config.strategy.build();
    let metrics = Arc::new(DiscoveryMetrics::new(global.client_name()));
    let updater = ServerListUpdater::new(
        global.client_name(),
        Arc::clone(&resolver),
        Arc::clone(&selector),
        Arc::clone(&metrics),
    );
    let discovery = DiscoveryLoop::new(Arc::new(updater), config.update_interval);

    println!("shardcache v{}", shardcache::VERSION);
    println!("Watching {} every {:?}", resolver.describe(), config.update_interval);
    println!("Press Ctrl+C to stop");
    println!();

    discovery.start().await?;
    println!("Initial servers: {}", selector.servers());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CliError::Runtime(format!("Failed to listen for Ctrl+C: {}", e)))?;

    println!();
    println!("Stopping discovery...");
    discovery.stop().await;

    println!("Final servers: {}", selector.servers());
    println!("{}", metrics.snapshot());
    Ok(())
}
