//! Price cache backed by a persistent section store
//!
//! Provides `PriceCache`, which serves card prices from disk while they are
//! fresh, refetches them when stale or missing, and mirrors every successful
//! fetch into the baseline table used for change detection.
//!
//! Entries are never evicted; the cache table grows with every distinct card
//! looked up.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use super::staleness::{Freshness, StalenessPolicy};
use super::store::{PersistenceError, SectionStore};
use crate::data::{FetchError, PriceClient, PriceRecord, SearchBatch};

/// Section holding the general-purpose cache entries
pub const CACHE_SECTION: &str = "card_cache";

/// Section holding the last known price per card
pub const BASELINE_SECTION: &str = "card_prices";

/// Section holding search history
pub const SEARCH_SECTION: &str = "card_searches";

const SEARCH_KEY_SEPARATOR: &str = "\u{1f}";

/// Errors that can occur during a cached price lookup
#[derive(Debug, Error)]
pub enum CacheError {
    /// No fresh data could be fetched and nothing usable was cached
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Data was fetched but could not be recorded, or stored data is unreadable
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result of a price lookup, including the entry's state before the call
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLookup {
    pub record: PriceRecord,
    /// `Fresh`: served from cache. `Missing`: fetched. `Stale`: refetched,
    /// or the old entry if the refetch failed.
    pub freshness: Freshness,
}

/// Builds the history key for an ordered list of search terms
///
/// Order-sensitive and injective: separators inside terms are escaped.
pub fn search_key<S: AsRef<str>>(terms: &[S]) -> String {
    let escaped: Vec<String> = terms
        .iter()
        .map(|term| {
            term.as_ref()
                .replace('\\', "\\\\")
                .replace(SEARCH_KEY_SEPARATOR, "\\u001f")
        })
        .collect();
    format!("{}:{}", terms.len(), escaped.join(SEARCH_KEY_SEPARATOR))
}

/// Cache store for card prices and search history
///
/// Single-writer: every write path takes `&mut self`, and writes are whole
/// record overwrites with no versioning. Share it across tasks only behind a
/// lock around the whole instance.
pub struct PriceCache {
    store: Box<dyn SectionStore + Send>,
    client: PriceClient,
    policy: StalenessPolicy,
}

impl PriceCache {
    /// Creates a cache over `store`, creating its three sections if absent
    pub fn new(
        mut store: Box<dyn SectionStore + Send>,
        client: PriceClient,
        policy: StalenessPolicy,
    ) -> Result<Self, PersistenceError> {
        for section in [CACHE_SECTION, BASELINE_SECTION, SEARCH_SECTION] {
            store.ensure_section(section)?;
        }
        Ok(Self {
            store,
            client,
            policy,
        })
    }

    pub fn client(&self) -> &PriceClient {
        &self.client
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        section: &str,
        key: &str,
    ) -> Result<Option<T>, PersistenceError> {
        match self.store.get(section, key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                PersistenceError::ReadCorrupt {
                    section: section.to_string(),
                    reason: format!("key '{}': {}", key, e),
                }
            }),
        }
    }

    fn write_json<T: Serialize>(
        &mut self,
        section: &str,
        key: &str,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(value).map_err(|e| PersistenceError::WriteFailed {
            section: section.to_string(),
            reason: format!("key '{}': {}", key, e),
        })?;
        self.store.set(section, key, &raw)
    }

    /// Returns the cached entry for a card without fetching
    pub fn cached(&self, identity: &str) -> Result<Option<PriceRecord>, PersistenceError> {
        self.read_json(CACHE_SECTION, identity)
    }

    /// Number of cards in the cache table
    pub fn len(&self) -> Result<usize, PersistenceError> {
        self.store.len(CACHE_SECTION)
    }

    pub fn is_empty(&self) -> Result<bool, PersistenceError> {
        Ok(self.len()? == 0)
    }

    /// Looks up a card's price, fetching if the cache entry is missing or stale
    ///
    /// # Returns
    /// * `Ok(PriceLookup)` - Fresh entry, newly fetched record, or the stale
    ///   entry when its refresh failed
    /// * `Err(CacheError::Fetch)` - Nothing cached and the fetch failed
    /// * `Err(CacheError::Persistence)` - A fetched record could not be stored
    pub async fn get_price(&mut self, identity: &str) -> Result<PriceLookup, CacheError> {
        self.get_price_at(identity, Utc::now().timestamp()).await
    }

    /// `get_price` against an explicit clock reading
    pub async fn get_price_at(
        &mut self,
        identity: &str,
        now: i64,
    ) -> Result<PriceLookup, CacheError> {
        let entry = self.cached(identity)?;
        let freshness = self.policy.freshness(now, entry.as_ref().map(|e| e.fetched_at));

        match (freshness, entry) {
            (Freshness::Fresh, Some(entry)) => {
                log::debug!("Cache hit for {}", identity);
                Ok(PriceLookup {
                    record: entry,
                    freshness,
                })
            }
            (Freshness::Stale, Some(entry)) => {
                log::info!(
                    "Cache entry for {} is stale (fetched at {}), refreshing",
                    identity,
                    entry.fetched_at
                );
                match self.fetch_and_store_at(identity, now).await {
                    Ok(record) => Ok(PriceLookup { record, freshness }),
                    Err(CacheError::Fetch(e)) => {
                        log::warn!(
                            "Refresh of {} failed, serving stale entry from {}: {}",
                            identity,
                            entry.fetched_at,
                            e
                        );
                        Ok(PriceLookup {
                            record: entry,
                            freshness,
                        })
                    }
                    Err(e) => Err(e),
                }
            }
            _ => {
                log::info!("Cache miss for {}, fetching", identity);
                let record = self.fetch_and_store_at(identity, now).await?;
                Ok(PriceLookup {
                    record,
                    freshness: Freshness::Missing,
                })
            }
        }
    }

    /// Fetches a card's price unconditionally and records it
    ///
    /// Overwrites the cache entry and the baseline with the new record. Both
    /// writes are flushed before this returns.
    pub async fn fetch_and_store(&mut self, identity: &str) -> Result<PriceRecord, CacheError> {
        self.fetch_and_store_at(identity, Utc::now().timestamp()).await
    }

    /// `fetch_and_store` stamping the record with `now`
    pub async fn fetch_and_store_at(
        &mut self,
        identity: &str,
        now: i64,
    ) -> Result<PriceRecord, CacheError> {
        let record = self.client.fetch_card_price(identity, now).await?;

        match self.cached(identity)? {
            Some(existing) if existing.fetched_at > record.fetched_at => {
                log::warn!(
                    "Not overwriting cache entry for {}: stored record is newer ({} > {})",
                    identity,
                    existing.fetched_at,
                    record.fetched_at
                );
            }
            _ => self.write_json(CACHE_SECTION, identity, &record)?,
        }
        self.write_json(BASELINE_SECTION, identity, &record)?;

        Ok(record)
    }

    /// Returns the last known price recorded for a card
    pub fn baseline(&self, identity: &str) -> Result<Option<PriceRecord>, PersistenceError> {
        self.read_json(BASELINE_SECTION, identity)
    }

    /// Overwrites the last known price for `record.card_identity`
    pub fn set_baseline(&mut self, record: &PriceRecord) -> Result<(), PersistenceError> {
        self.write_json(BASELINE_SECTION, &record.card_identity, record)
    }

    /// Stores a search batch under the key of its ordered terms
    pub fn record_search(&mut self, batch: &SearchBatch) -> Result<(), PersistenceError> {
        let key = search_key(&batch.terms);
        self.write_json(SEARCH_SECTION, &key, batch)
    }

    /// Returns the most recent batch stored for exactly these terms
    pub fn last_search<S: AsRef<str>>(
        &self,
        terms: &[S],
    ) -> Result<Option<SearchBatch>, PersistenceError> {
        self.read_json(SEARCH_SECTION, &search_key(terms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{FileStore, MemoryStore};
    use crate::data::{Prices, SearchResult};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: i64 = 1_760_000_000;
    const DAY: i64 = 86_400;

    /// Store that accepts reads but refuses every write after setup
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
        locked: bool,
    }

    impl SectionStore for ReadOnlyStore {
        fn ensure_section(&mut self, section: &str) -> Result<(), PersistenceError> {
            self.inner.ensure_section(section)
        }

        fn get(&self, section: &str, key: &str) -> Result<Option<String>, PersistenceError> {
            self.inner.get(section, key)
        }

        fn set(&mut self, section: &str, key: &str, value: &str) -> Result<(), PersistenceError> {
            if self.locked {
                return Err(PersistenceError::WriteFailed {
                    section: section.to_string(),
                    reason: "disk full".to_string(),
                });
            }
            self.inner.set(section, key, value)
        }

        fn len(&self, section: &str) -> Result<usize, PersistenceError> {
            self.inner.len(section)
        }
    }

    fn price_body(low: f64, average: f64, high: f64) -> serde_json::Value {
        json!({ "prices": { "low": low, "average": average, "high": high } })
    }

    async fn mount_price(server: &MockServer, card_path: &str, body: serde_json::Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(card_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(times)
            .mount(server)
            .await;
    }

    fn memory_cache(server: &MockServer, days: f64) -> PriceCache {
        PriceCache::new(
            Box::new(MemoryStore::new()),
            PriceClient::with_base_url(server.uri()),
            StalenessPolicy::new(days).unwrap(),
        )
        .unwrap()
    }

    fn record_at(identity: &str, fetched_at: i64, average: f64) -> PriceRecord {
        PriceRecord {
            card_identity: identity.to_string(),
            prices: Prices {
                low: 1.0,
                average,
                high: 3.0,
            },
            fetched_at,
            raw_fields: Default::default(),
        }
    }

    fn seed_entry(cache: &mut PriceCache, record: &PriceRecord) {
        cache
            .write_json(CACHE_SECTION, &record.card_identity, record)
            .unwrap();
    }

    #[test]
    fn test_search_key_is_order_sensitive() {
        let ab = search_key(&["A", "B"]);
        let ba = search_key(&["B", "A"]);
        assert_ne!(ab, ba);
        assert_eq!(ab, search_key(&["A".to_string(), "B".to_string()]));
    }

    #[test]
    fn test_search_key_is_injective_across_separators() {
        let joined = format!("A{}B", SEARCH_KEY_SEPARATOR);
        assert_ne!(search_key(&[joined.as_str()]), search_key(&["A", "B"]));
        assert_ne!(search_key::<&str>(&[]), search_key(&[""]));
        assert_ne!(search_key(&["a\\", "b"]), search_key(&["a", "\\b"]));
    }

    #[tokio::test]
    async fn test_missing_entry_is_fetched_and_mirrored() {
        let server = MockServer::start().await;
        mount_price(&server, "/price_for_card/Kuriboh", price_body(0.1, 0.2, 0.3), 1).await;
        let mut cache = memory_cache(&server, 1.0);

        let lookup = cache.get_price_at("Kuriboh", NOW).await.unwrap();

        assert_eq!(lookup.freshness, Freshness::Missing);
        assert_eq!(lookup.record.fetched_at, NOW);
        assert_eq!(cache.cached("Kuriboh").unwrap(), Some(lookup.record.clone()));
        assert_eq!(cache.baseline("Kuriboh").unwrap(), Some(lookup.record));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let server = MockServer::start().await;
        mount_price(&server, "/price_for_card/Kuriboh", price_body(0.1, 0.2, 0.3), 1).await;
        let mut cache = memory_cache(&server, 1.0);

        let first = cache.get_price_at("Kuriboh", NOW).await.unwrap();
        let second = cache.get_price_at("Kuriboh", NOW).await.unwrap();

        assert_eq!(second.freshness, Freshness::Fresh);
        assert_eq!(first.record, second.record);
        // MockServer verifies `expect(1)` on drop
    }

    #[tokio::test]
    async fn test_stale_entry_is_replaced_on_successful_refresh() {
        let server = MockServer::start().await;
        mount_price(&server, "/price_for_card/Kuriboh", price_body(1.0, 9.0, 3.0), 1).await;
        let mut cache = memory_cache(&server, 1.0);
        seed_entry(&mut cache, &record_at("Kuriboh", NOW - DAY - 1, 2.0));

        let lookup = cache.get_price_at("Kuriboh", NOW).await.unwrap();

        assert_eq!(lookup.freshness, Freshness::Stale);
        assert_eq!(lookup.record.prices.average, 9.0);
        assert_eq!(cache.cached("Kuriboh").unwrap().unwrap().fetched_at, NOW);
    }

    #[tokio::test]
    async fn test_entry_just_inside_window_is_not_refetched() {
        let server = MockServer::start().await;
        mount_price(&server, "/price_for_card/Kuriboh", price_body(1.0, 9.0, 3.0), 0).await;
        let mut cache = memory_cache(&server, 1.0);
        let seeded = record_at("Kuriboh", NOW - DAY + 1, 2.0);
        seed_entry(&mut cache, &seeded);

        let lookup = cache.get_price_at("Kuriboh", NOW).await.unwrap();

        assert_eq!(lookup.freshness, Freshness::Fresh);
        assert_eq!(lookup.record, seeded);
    }

    #[tokio::test]
    async fn test_stale_entry_survives_failed_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let mut cache = memory_cache(&server, 1.0);
        let seeded = record_at("Kuriboh", NOW - 10 * DAY, 2.0);
        seed_entry(&mut cache, &seeded);

        let lookup = cache.get_price_at("Kuriboh", NOW).await.unwrap();

        assert_eq!(lookup.freshness, Freshness::Stale);
        assert_eq!(lookup.record, seeded);
        assert_eq!(cache.cached("Kuriboh").unwrap(), Some(seeded));
    }

    #[tokio::test]
    async fn test_missing_entry_with_failed_fetch_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let mut cache = memory_cache(&server, 1.0);

        let err = cache.get_price_at("Nope", NOW).await.unwrap_err();

        assert!(matches!(
            err,
            CacheError::Fetch(FetchError::HttpStatus { status: 404, .. })
        ));
        assert!(cache.cached("Nope").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_persistence_error_not_fetch_error() {
        let server = MockServer::start().await;
        mount_price(&server, "/price_for_card/Kuriboh", price_body(0.1, 0.2, 0.3), 1).await;
        let mut store = ReadOnlyStore::default();
        for section in [CACHE_SECTION, BASELINE_SECTION, SEARCH_SECTION] {
            store.ensure_section(section).unwrap();
        }
        store.locked = true;
        let mut cache = PriceCache::new(
            Box::new(store),
            PriceClient::with_base_url(server.uri()),
            StalenessPolicy::default(),
        )
        .unwrap();

        let err = cache.get_price_at("Kuriboh", NOW).await.unwrap_err();

        assert!(matches!(
            err,
            CacheError::Persistence(PersistenceError::WriteFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_failure_during_stale_refresh_is_persistence_error() {
        let server = MockServer::start().await;
        mount_price(&server, "/price_for_card/Kuriboh", price_body(1.0, 9.0, 3.0), 1).await;
        let stale = record_at("Kuriboh", NOW - 10 * DAY, 2.0);
        let mut store = ReadOnlyStore::default();
        store
            .inner
            .set(CACHE_SECTION, "Kuriboh", &serde_json::to_string(&stale).unwrap())
            .unwrap();
        store.locked = true;
        let mut cache = PriceCache::new(
            Box::new(store),
            PriceClient::with_base_url(server.uri()),
            StalenessPolicy::default(),
        )
        .unwrap();

        let err = cache.get_price_at("Kuriboh", NOW).await.unwrap_err();

        assert!(matches!(
            err,
            CacheError::Persistence(PersistenceError::WriteFailed { .. })
        ));
        assert_eq!(cache.cached("Kuriboh").unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn test_non_finite_prices_are_not_cached() {
        let server = MockServer::start().await;
        let body = json!({ "prices": { "low": "NaN", "average": "inf", "high": 3.0 } });
        mount_price(&server, "/price_for_card/Kuriboh", body, 1).await;
        let mut cache = memory_cache(&server, 1.0);

        let err = cache.get_price_at("Kuriboh", NOW).await.unwrap_err();

        assert!(matches!(err, CacheError::Fetch(FetchError::Decode { .. })));
        assert!(cache.cached("Kuriboh").unwrap().is_none());
        assert!(cache.baseline("Kuriboh").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_older_fetch_does_not_overwrite_newer_entry() {
        let server = MockServer::start().await;
        mount_price(&server, "/price_for_card/Kuriboh", price_body(1.0, 5.0, 3.0), 1).await;
        let mut cache = memory_cache(&server, 1.0);
        let newer = record_at("Kuriboh", NOW + DAY, 2.0);
        seed_entry(&mut cache, &newer);

        let fetched = cache.fetch_and_store_at("Kuriboh", NOW).await.unwrap();

        assert_eq!(fetched.fetched_at, NOW);
        assert_eq!(cache.cached("Kuriboh").unwrap(), Some(newer));
        assert_eq!(cache.baseline("Kuriboh").unwrap(), Some(fetched));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_read_corrupt() {
        let server = MockServer::start().await;
        let mut store = MemoryStore::new();
        store.set(CACHE_SECTION, "Kuriboh", "{not json").unwrap();
        let mut cache = PriceCache::new(
            Box::new(store),
            PriceClient::with_base_url(server.uri()),
            StalenessPolicy::default(),
        )
        .unwrap();

        let err = cache.get_price_at("Kuriboh", NOW).await.unwrap_err();

        assert!(matches!(
            err,
            CacheError::Persistence(PersistenceError::ReadCorrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_record_roundtrips_through_file_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let server = MockServer::start().await;
        let body = json!({
            "prices": { "low": 0.07, "average": 1.23456789, "high": 1e3 },
            "rarity": "Secret Rare"
        });
        mount_price(&server, "/price_for_card/Dark%20Magician", body, 1).await;

        let mut cache = PriceCache::new(
            Box::new(FileStore::open(temp_dir.path().to_path_buf())),
            PriceClient::with_base_url(server.uri()),
            StalenessPolicy::default(),
        )
        .unwrap();
        let written = cache.get_price_at("Dark Magician", NOW).await.unwrap().record;

        let reopened = PriceCache::new(
            Box::new(FileStore::open(temp_dir.path().to_path_buf())),
            PriceClient::with_base_url(server.uri()),
            StalenessPolicy::default(),
        )
        .unwrap();
        let read_back = reopened.cached("Dark Magician").unwrap().unwrap();

        assert_eq!(read_back.prices, written.prices);
        assert_eq!(read_back.fetched_at, written.fetched_at);
        assert_eq!(read_back.raw_fields["rarity"], json!("Secret Rare"));
    }

    #[tokio::test]
    async fn test_search_history_roundtrip() {
        let server = MockServer::start().await;
        let mut cache = memory_cache(&server, 1.0);
        let batch = SearchBatch {
            terms: vec!["Dark Magician".to_string(), "LOB".to_string()],
            results: vec![SearchResult::Found(record_at("Dark Magician", NOW, 2.0))],
        };

        cache.record_search(&batch).unwrap();

        assert_eq!(
            cache.last_search(&["Dark Magician", "LOB"]).unwrap(),
            Some(batch)
        );
        assert!(cache.last_search(&["LOB", "Dark Magician"]).unwrap().is_none());
    }
}
