//! Live cache commands against the discovered servers.

use shardcache::protocol::Item;
use shardcache::CacheClient;

use super::common::GlobalArgs;
use crate::error::CliError;

/// Arguments for the set command.
pub struct SetArgs {
    pub key: String,
    pub value: String,
    pub flags: u32,
    pub ttl: u32,
}

/// Run the get command.
pub async fn get(global: &GlobalArgs, keys: &[String]) -> Result<(), CliError> {
    let config = global.client_config()?;
    let client = CacheClient::new(&config, global.client_name()).await?;

    let result = client.get_multi(keys).await;
    client.stop().await;
    let items = result?;

    for key in keys {
        match items.get(key) {
            Some(item) => println!(
                "{} = {} (flags {})",
                key,
                String::from_utf8_lossy(&item.value),
                item.flags
            ),
            None => println!("{} (miss)", key),
        }
    }
    Ok(())
}

/// Run the set command.
pub async fn set(global: &GlobalArgs, args: SetArgs) -> Result<(), CliError> {
    let config = global.client_config()?;
    let client = CacheClient::new(&config, global.client_name()).await?;

    let item = Item::new(args.key, args.value.into_bytes())
        .with_flags(args.flags)
        .with_expiration(args.ttl);
    let server = client.pick_server(&item.key);
    let result = client.set(&item).await;
    client.stop().await;
    result?;

    match server {
        Ok(server) => println!("Stored {} on {}", item.key, server),
        Err(_) => println!("Stored {}", item.key),
    }
    Ok(())
}
