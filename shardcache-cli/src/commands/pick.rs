//! Pick command - show which server each key maps to.

use super::common::{resolve_once, resolver_for, GlobalArgs};
use crate::error::CliError;

/// Run the pick command.
pub async fn run(global: &GlobalArgs, keys: &[String]) -> Result<(), CliError> {
    let config = global.client_config()?;
    let resolver = resolver_for(&config)?;
    let servers = resolve_once(resolver.as_ref()).await?;

    let selector = config.strategy.build();
    selector
        .set_servers(servers)
        .map_err(|e| CliError::Discovery(e.into()))?;

    let width = keys.iter().map(String::len).max().unwrap_or(0);
    for key in keys {
        match selector.pick_server(key) {
            Ok(server) => println!("{:<width$}  {}", key, server, width = width),
            Err(e) => println!("{:<width$}  ({})", key, e, width = width),
        }
    }
    Ok(())
}
