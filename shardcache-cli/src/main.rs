//! shardcache CLI - inspect and exercise memcached server discovery.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use tracing::debug;

use commands::cache::SetArgs;
use commands::common::GlobalArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "shardcache")]
#[command(version = shardcache::VERSION)]
#[command(about = "Self-maintaining memcached client", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the discovery source once and print the sorted server set
    Resolve {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show which server each key maps to
    Pick {
        /// Keys to route
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Fetch keys from the cache
    Get {
        /// Keys to fetch
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Store a value in the cache
    Set {
        /// Cache key
        key: String,

        /// Value to store
        value: String,

        /// Opaque client flags
        #[arg(long, default_value = "0")]
        flags: u32,

        /// Expiration in seconds (0 never expires)
        #[arg(long, default_value = "0")]
        ttl: u32,
    },

    /// Run the discovery loop and report membership changes until Ctrl+C
    Watch {
        /// Override the refresh interval
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Flushes file logs when dropped
    let log_guard = match &cli.global.log_file {
        Some(path) => shardcache::logging::init_file_logging(path, &cli.global.log_level)
            .map_err(|e| eprintln!("Warning: {}", e))
            .ok(),
        None => {
            if let Err(e) = shardcache::logging::init_logging(&cli.global.log_level) {
                eprintln!("Warning: {}", e);
            }
            None
        }
    };

    let result = run(cli);
    drop(log_guard);

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(format!("Failed to start async runtime: {}", e)))?;

    debug!(version = shardcache::VERSION, "shardcache starting");
    let global = cli.global;

    runtime.block_on(async {
        match cli.command {
            Commands::Resolve { json } => commands::resolve::run(&global, json).await,
            Commands::Pick { keys } => commands::pick::run(&global, &keys).await,
            Commands::Get { keys } => commands::cache::get(&global, &keys).await,
            Commands::Set {
                key,
                value,
                flags,
                ttl,
            } => {
                let args = SetArgs {
                    key,
                    value,
                    flags,
                    ttl,
                };
                commands::cache::set(&global, args).await
            }
            Commands::Watch { interval_secs } => commands::watch::run(&global, interval_secs).await,
        }
    })
}
