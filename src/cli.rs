//! Command-line interface parsing for Cardwise
//!
//! This module handles parsing of CLI arguments using clap. Without a
//! subcommand the binary runs the HTTP server; the other subcommands run one
//! maintenance operation and print its result as JSON.

use clap::{Parser, Subcommand};
use thiserror::Error;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The card key contains characters no card key uses
    #[error("Invalid card key: '{0}'. Card keys use letters, digits, '-' and '_'")]
    InvalidCardKey(String),
}

/// Cardwise - credit card data service
#[derive(Parser, Debug)]
#[command(name = "cardwise")]
#[command(about = "Credit card data service with a cached card API proxy")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operations available from the command line
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Port to listen on, overriding CARDWISE_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Refresh the card cache if it is older than the refresh threshold
    Refresh,
    /// Copy the card list into the catalog in batches
    Sync {
        /// Position in the card list to start from
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show whether the card cache exists and when it was written
    CacheInfo,
    /// Delete the card cache
    ClearCache,
    /// Show a single card, using the local detail cache
    Card {
        /// Card key, e.g. chase-sapphire-preferred
        #[arg(value_parser = parse_card_key)]
        card_key: String,
        /// Skip the detail cache and always ask the card API
        #[arg(long)]
        no_cache: bool,
    },
}

impl Cli {
    /// The command to run, defaulting to the server
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve { port: None })
    }
}

/// Validates a card key argument
///
/// # Returns
/// * `Ok(String)` with surrounding whitespace removed
/// * `Err(CliError::InvalidCardKey)` if the key is empty or has other characters
pub fn parse_card_key(s: &str) -> Result<String, CliError> {
    let key = s.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(key.to_string())
    } else {
        Err(CliError::InvalidCardKey(s.to_string()))
    }
}
