//! Price change detection against the stored baseline

use thiserror::Error;

use crate::cache::{CacheError, PersistenceError, PriceCache};
use crate::data::{FetchError, PriceRecord};

/// Errors that can occur while checking for a price change
#[derive(Debug, Error)]
pub enum ChangeError {
    /// The card has never been looked up, so there is nothing to compare against
    #[error("No baseline price recorded for '{0}'; look the card up first")]
    NoBaseline(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<CacheError> for ChangeError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Fetch(e) => ChangeError::Fetch(e),
            CacheError::Persistence(e) => ChangeError::Persistence(e),
        }
    }
}

/// Checks whether a card's price moved since the stored baseline
///
/// Always refetches, ignoring cache freshness. Returns `Some(new_record)` if
/// low, average or high differ exactly from the baseline, and the baseline
/// then holds the new record. Returns `None` otherwise with the baseline left
/// as it was.
pub async fn check_price_change(
    cache: &mut PriceCache,
    identity: &str,
) -> Result<Option<PriceRecord>, ChangeError> {
    let baseline = cache
        .baseline(identity)?
        .ok_or_else(|| ChangeError::NoBaseline(identity.to_string()))?;

    // Refetching mirrors the new record into the baseline table
    let current = cache.fetch_and_store(identity).await?;

    if current.prices_differ(&baseline) {
        log::info!(
            "Price change for {}: average {} -> {}",
            identity,
            baseline.prices.average,
            current.prices.average
        );
        Ok(Some(current))
    } else {
        log::debug!("No price change for {}", identity);
        cache.set_baseline(&baseline)?;
        Ok(None)
    }
}
