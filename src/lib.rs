//! ygoprice library
//!
//! Cached price lookups for Yu-Gi-Oh! cards: a price client, a persistent
//! cache with staleness handling, batch search, and price change detection.

pub mod cache;
pub mod changes;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod search;

pub use cache::{CacheError, Freshness, PriceCache, PriceLookup, StalenessPolicy};
pub use changes::{check_price_change, ChangeError};
pub use data::{FetchError, PriceClient, PriceRecord, Prices, SearchCriterion, SearchResult};
pub use search::{SearchError, SearchOrchestrator};
