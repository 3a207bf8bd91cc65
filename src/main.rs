//! ygoprice - Cached Yu-Gi-Oh! card price lookups
//!
//! Looks up card prices through a local cache, runs batch searches, and
//! reports price changes since the last recorded lookup. Results are printed
//! to stdout as JSON.

use std::process;

use clap::Parser;
use serde_json::json;

use ygoprice::cli::{open_cache, Cli, Command};
use ygoprice::logging::init_logging;
use ygoprice::{check_price_change, PriceCache, SearchOrchestrator};

/// Runs one subcommand against the opened cache
async fn run(command: Command, mut cache: PriceCache) -> Result<(), Box<dyn std::error::Error>> {
    let output = match command {
        Command::Price { name } => {
            let lookup = cache.get_price(&name).await?;
            json!({
                "freshness": lookup.freshness,
                "record": lookup.record,
            })
        }
        Command::Search { terms, criteria } => {
            let criteria = Command::search_criteria(&terms, &criteria);
            let mut orchestrator = SearchOrchestrator::new(cache);
            let results = orchestrator.search(terms.as_slice(), criteria.as_slice()).await?;
            serde_json::to_value(results)?
        }
        Command::Changes { name } => match check_price_change(&mut cache, &name).await? {
            Some(record) => json!({ "changed": true, "record": record }),
            None => json!({ "changed": false }),
        },
        Command::History { terms } => match cache.last_search(terms.as_slice())? {
            Some(batch) => serde_json::to_value(batch)?,
            None => {
                eprintln!("No search recorded for these terms");
                serde_json::Value::Null
            }
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.load_config().and_then(|config| open_cache(&config)) {
        Ok(cache) => run(cli.command, cache).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
