//! Cardwise - credit card data service
//!
//! Runs the HTTP server, or a single maintenance command when one is given.

use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use cardwise::cache::{DetailCache, FileStore};
use cardwise::cli::{Cli, Command};
use cardwise::config::Config;
use cardwise::server::{self, AppState};

/// Subdirectory of the cache dir holding per-card detail entries
const DETAIL_CACHE_DIR: &str = "details";

/// Logs go to stderr so command output on stdout stays machine-readable
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env()?;

    match cli.command() {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(&config).await?;
        }
        Command::Refresh => {
            let state = AppState::from_config(&config);
            print_json(&state.refresher.run().await?)?;
        }
        Command::Sync { offset } => {
            let state = AppState::from_config(&config);
            print_json(&state.sync.run(offset).await?)?;
        }
        Command::CacheInfo => {
            let state = AppState::from_config(&config);
            print_json(&state.service.cache_info().await)?;
        }
        Command::ClearCache => {
            let state = AppState::from_config(&config);
            state.service.cache().clear_card_cache().await;
            println!("Card cache cleared");
        }
        Command::Card { card_key, no_cache } => {
            let state = AppState::from_config(&config);
            let lookup = if no_cache {
                state.service.get_card(&card_key).await
            } else {
                let details = DetailCache::new(
                    Arc::new(FileStore::new(config.cache_dir.join(DETAIL_CACHE_DIR))),
                    config.detail_cache_duration,
                );
                state.service.get_card_cached(&details, &card_key).await
            };

            match lookup {
                Some(lookup) => print_json(&lookup)?,
                None => return Err(format!("Card not found: {}", card_key).into()),
            }
        }
    }

    Ok(())
}
