//! Cache module for persisting card prices and search history
//!
//! This module provides the persistent section store, the staleness policy,
//! and the `PriceCache` that ties them to the price client. Stale entries are
//! still served when a refresh fails, so lookups degrade instead of failing
//! while the remote service is unavailable.

mod manager;
pub mod staleness;
pub mod store;

pub use manager::{
    search_key, CacheError, PriceCache, PriceLookup, BASELINE_SECTION, CACHE_SECTION,
    SEARCH_SECTION,
};
pub use staleness::{is_stale, Freshness, StalenessPolicy};
pub use store::{FileStore, MemoryStore, PersistenceError, SectionStore};
