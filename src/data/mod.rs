//! Core data models for ygoprice
//!
//! This module contains the data types shared by the price client, the
//! persistent cache and the search orchestrator.

pub mod prices;

pub use prices::{FetchError, PriceClient};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Low, average and high market price of a card
///
/// Compared field by field with exact equality when detecting price changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prices {
    pub low: f64,
    pub average: f64,
    pub high: f64,
}

/// A price snapshot for one card as returned by a single successful fetch
///
/// A refresh always produces a new record; stored records are replaced
/// wholesale and never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Lookup identity (the card name as submitted, case-sensitive)
    pub card_identity: String,
    /// Prices extracted from the response
    pub prices: Prices,
    /// Unix timestamp (seconds) of the fetch that produced this record
    pub fetched_at: i64,
    /// Response body fields, kept verbatim
    #[serde(default)]
    pub raw_fields: Map<String, Value>,
}

impl PriceRecord {
    /// Returns true if any of low/average/high differs from `other`
    pub fn prices_differ(&self, other: &PriceRecord) -> bool {
        self.prices.low != other.prices.low
            || self.prices.average != other.prices.average
            || self.prices.high != other.prices.high
    }
}

/// Search strategy paired positionally with each search term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchCriterion {
    /// Direct lookup of a card by name
    ByName,
    /// Expand a set into its cards and look each one up by name
    BySet,
    /// Attribute lookup (passes through to a name lookup)
    ByAttribute,
}

impl SearchCriterion {
    /// Parses a criterion string
    ///
    /// Accepts exactly "name", "set" and "attribute". Returns `None` for
    /// anything else, including other casings and surrounding whitespace.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "name" => Some(SearchCriterion::ByName),
            "set" => Some(SearchCriterion::BySet),
            "attribute" => Some(SearchCriterion::ByAttribute),
            _ => None,
        }
    }

    /// Returns the canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchCriterion::ByName => "name",
            SearchCriterion::BySet => "set",
            SearchCriterion::ByAttribute => "attribute",
        }
    }
}

impl fmt::Display for SearchCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a search result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchResult {
    /// A price record served from cache or freshly fetched
    Found(PriceRecord),
    /// Neither the cache nor the remote service could provide a price
    Unavailable { term: String, reason: String },
}

impl SearchResult {
    /// Returns the price record if one was found
    pub fn record(&self) -> Option<&PriceRecord> {
        match self {
            SearchResult::Found(record) => Some(record),
            SearchResult::Unavailable { .. } => None,
        }
    }
}

/// The aggregated result of one `search` call, persisted as search history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBatch {
    /// Search terms in submission order
    pub terms: Vec<String>,
    /// Results in the order they were produced
    pub results: Vec<SearchResult>,
}
