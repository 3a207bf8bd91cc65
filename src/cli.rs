//! Command-line interface for ygoprice
//!
//! This module handles parsing of CLI arguments using clap, applying flag
//! overrides on top of the loaded configuration, and opening the price cache.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

use crate::cache::{FileStore, PersistenceError, PriceCache};
use crate::config::{Config, ConfigError};
use crate::data::PriceClient;

/// Error types for CLI startup
#[derive(Debug, Error)]
pub enum CliError {
    /// No store directory configured and no platform data directory available
    #[error("Could not determine a data directory; pass --store-dir")]
    NoStoreDir,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The HTTP client could not be built
    #[error("Failed to set up HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// ygoprice - Cached Yu-Gi-Oh! card price lookups
#[derive(Parser, Debug)]
#[command(name = "ygoprice")]
#[command(about = "Cached Yu-Gi-Oh! card price lookups with change detection")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Days a cached price stays fresh
    #[arg(long, value_name = "DAYS", global = true)]
    pub expiry_days: Option<f64>,

    /// Directory for the persistent cache
    #[arg(long, value_name = "DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Base URL of the price service
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Look up the price of one card
    Price {
        /// Card name (case-sensitive)
        name: String,
    },

    /// Search by term/criterion pairs
    ///
    /// Examples:
    ///   ygoprice search -t "Dark Magician"
    ///   ygoprice search -t "Duelist Alliance" -b set -t Kuriboh -b name
    ///
    /// Valid criteria: name, set, attribute. Without any --by, every term is a name.
    Search {
        /// Search term (repeatable)
        #[arg(short = 't', long = "term", value_name = "TERM", required = true)]
        terms: Vec<String>,

        /// Criterion for the term at the same position (repeatable)
        #[arg(short = 'b', long = "by", value_name = "CRITERION")]
        criteria: Vec<String>,
    },

    /// Check whether a card's price changed since it was last recorded
    Changes {
        /// Card name (case-sensitive)
        name: String,
    },

    /// Show the stored results of an earlier search
    History {
        /// The search terms, in the order they were submitted
        #[arg(required = true)]
        terms: Vec<String>,
    },
}

impl Command {
    /// Criteria for a search, defaulting every term to a name lookup
    pub fn search_criteria(terms: &[String], criteria: &[String]) -> Vec<String> {
        if criteria.is_empty() {
            vec!["name".to_string(); terms.len()]
        } else {
            criteria.to_vec()
        }
    }
}

impl Cli {
    /// Loads the config file named by `--config`, or the default one
    pub fn load_config(&self) -> Result<Config, CliError> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        self.apply_overrides(&mut config);
        config.staleness_policy()?;
        Ok(config)
    }

    /// Applies command-line flags on top of a loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(days) = self.expiry_days {
            config.cache_expiry_days = days;
        }
        if let Some(ref dir) = self.store_dir {
            config.store_dir = Some(dir.clone());
        }
        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
        }
    }
}

/// Opens the file-backed price cache described by `config`
pub fn open_cache(config: &Config) -> Result<PriceCache, CliError> {
    let store_dir = config
        .store_dir
        .clone()
        .or_else(FileStore::default_dir)
        .ok_or(CliError::NoStoreDir)?;
    log::debug!("Using store directory {}", store_dir.display());

    let mut client = PriceClient::with_base_url(config.base_url.clone());
    if let Some(timeout) = config.request_timeout() {
        client = client.with_timeout(timeout)?;
    }

    let cache = PriceCache::new(
        Box::new(FileStore::open(store_dir)),
        client,
        config.staleness_policy()?,
    )?;
    Ok(cache)
}
