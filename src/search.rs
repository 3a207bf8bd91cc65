//! Batch card search
//!
//! `SearchOrchestrator` resolves `(term, criterion)` pairs in order through
//! the `PriceCache` and records every batch as search history.

use thiserror::Error;

use crate::cache::{CacheError, PersistenceError, PriceCache};
use crate::data::{SearchBatch, SearchCriterion, SearchResult};

/// Errors that abort a whole search batch
#[derive(Debug, Error)]
pub enum SearchError {
    /// `terms` and `criteria` have different lengths
    #[error("Got {terms} search terms but {criteria} search criteria")]
    ArityMismatch { terms: usize, criteria: usize },

    /// A criterion other than name, set or attribute
    #[error("Invalid search criterion '{0}'. Choose 'name', 'set', or 'attribute'.")]
    InvalidCriterion(String),

    /// A fetched price or the batch itself could not be recorded
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Dispatches search terms to name, set and attribute lookups
pub struct SearchOrchestrator {
    cache: PriceCache,
}

impl SearchOrchestrator {
    pub fn new(cache: PriceCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    /// Searches for cards by multiple criteria
    ///
    /// # Arguments
    /// * `terms` - Search terms, paired positionally with `criteria`
    /// * `criteria` - "name", "set" or "attribute" for each term
    ///
    /// # Returns
    /// * `Ok(Vec<SearchResult>)` - Results in term order; a set term
    ///   contributes one result per card in listing order
    /// * `Err(SearchError::ArityMismatch)` - Before any lookup
    /// * `Err(SearchError::InvalidCriterion)` - Before any request for the
    ///   offending pair. Cache writes made for earlier pairs are kept and the
    ///   batch is not recorded.
    /// * `Err(SearchError::Persistence)` - A stored entry was corrupt or a
    ///   write failed, including recording the batch
    pub async fn search<T, C>(
        &mut self,
        terms: &[T],
        criteria: &[C],
    ) -> Result<Vec<SearchResult>, SearchError>
    where
        T: AsRef<str>,
        C: AsRef<str>,
    {
        if terms.len() != criteria.len() {
            return Err(SearchError::ArityMismatch {
                terms: terms.len(),
                criteria: criteria.len(),
            });
        }

        let mut results = Vec::new();
        for (term, criterion) in terms.iter().zip(criteria) {
            let term = term.as_ref();
            let criterion = SearchCriterion::from_str(criterion.as_ref())
                .ok_or_else(|| SearchError::InvalidCriterion(criterion.as_ref().to_string()))?;

            log::debug!("Searching '{}' by {}", term, criterion);
            match criterion {
                SearchCriterion::ByName => results.push(self.search_by_name(term).await?),
                SearchCriterion::BySet => results.extend(self.search_by_set(term).await?),
                SearchCriterion::ByAttribute => {
                    results.push(self.search_by_attribute(term).await?)
                }
            }
        }

        let batch = SearchBatch {
            terms: terms.iter().map(|t| t.as_ref().to_string()).collect(),
            results,
        };
        self.cache.record_search(&batch)?;

        Ok(batch.results)
    }

    /// Looks up one card, mapping fetch failures to `Unavailable`
    async fn search_by_name(&mut self, name: &str) -> Result<SearchResult, SearchError> {
        match self.cache.get_price(name).await {
            Ok(lookup) => Ok(SearchResult::Found(lookup.record)),
            Err(CacheError::Fetch(e)) => {
                log::warn!("No price available for {}: {}", name, e);
                Ok(SearchResult::Unavailable {
                    term: name.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(CacheError::Persistence(e)) => Err(e.into()),
        }
    }

    /// Expands a set into its cards and looks each one up by name
    ///
    /// A failed set listing contributes no results.
    async fn search_by_set(&mut self, set_name: &str) -> Result<Vec<SearchResult>, SearchError> {
        let cards = match self.cache.client().fetch_set_cards(set_name).await {
            Ok(cards) => cards,
            Err(e) => {
                log::warn!("Set listing for {} unavailable, skipping: {}", set_name, e);
                return Ok(Vec::new());
            }
        };

        log::info!("Set {} lists {} cards", set_name, cards.len());
        let mut results = Vec::with_capacity(cards.len());
        for card in &cards {
            results.push(self.search_by_name(card).await?);
        }
        Ok(results)
    }

    // No attribute index exists yet, so the term is looked up as a card name
    async fn search_by_attribute(&mut self, attribute: &str) -> Result<SearchResult, SearchError> {
        self.search_by_name(attribute).await
    }
}
