//! Resolve command - run discovery once and print the server set.

use serde_json::json;

use super::common::{resolve_once, resolver_for, GlobalArgs};
use crate::error::CliError;

/// Run the resolve command.
pub async fn run(global: &GlobalArgs, as_json: bool) -> Result<(), CliError> {
    let config = global.client_config()?;
    let resolver = resolver_for(&config)?;
    let servers = resolve_once(resolver.as_ref()).await?;

    if as_json {
        let output = json!({
            "name": global.client_name(),
            "source": resolver.describe(),
            "strategy": config.strategy,
            "servers": servers,
        });
        println!("{}", output);
        return Ok(());
    }

    println!("Source:   {}", resolver.describe());
    println!("Strategy: {}", config.strategy);
    println!("Servers:  {}", servers.len());
    for server in &servers {
        println!("  {}", server);
    }
    Ok(())
}
