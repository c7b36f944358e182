//! Card read paths
//!
//! [`CardService`] answers card requests from the cache when it can, from the
//! live card API when the cache misses, and from the bundled fallback cards
//! when the API is down. Fallback data is returned to the caller but never
//! cached, and a failed fetch never touches the cache.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheManager, DetailCache};
use crate::data::{
    fallback_card_by_id, fallback_cards, recommend_cards, search_cards, CardQuery, CardRecord,
    CardSource,
};

/// Message attached to responses served from the fallback cards
pub const FALLBACK_ERROR: &str = "Card API unavailable, serving fallback data";

/// Response envelope for card list requests
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsResponse {
    pub success: bool,
    pub data: Vec<CardRecord>,
    /// Whether `data` came from the cache
    pub cached: bool,
    /// Unix millis of the data's fetch time
    pub cache_timestamp: i64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CardsResponse {
    /// Same envelope with `data` replaced
    fn with_data(self, data: Vec<CardRecord>) -> Self {
        Self { data, ..self }
    }
}

/// A single card and where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardLookup {
    pub card: CardRecord,
    /// Served from the local detail cache
    pub cached: bool,
    /// Served from the fallback cards
    pub fallback: bool,
}

/// Cache presence and age, independent of freshness
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub exists: bool,
    /// Unix millis the cache was written at
    pub timestamp: Option<i64>,
}

/// Serves card data with cache, live and fallback tiers
#[derive(Clone)]
pub struct CardService {
    cache: CacheManager,
    source: Arc<dyn CardSource>,
}

impl CardService {
    pub fn new(cache: CacheManager, source: Arc<dyn CardSource>) -> Self {
        Self { cache, source }
    }

    /// The card-set cache this service reads and writes
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Returns all cards
    ///
    /// # Behavior
    /// - Unless `force_refresh`, a fresh cache entry is returned as-is
    /// - Otherwise the card API is queried and a success overwrites the cache
    /// - If the API fails, the fallback cards are returned and the cache is
    ///   left untouched
    pub async fn get_all_cards(&self, force_refresh: bool) -> CardsResponse {
        if !force_refresh {
            if let Some(cached) = self.cache.get_cached_cards().await {
                debug!(count = cached.cards.len(), "Serving cards from cache");
                return CardsResponse {
                    success: true,
                    data: cached.cards,
                    cached: true,
                    cache_timestamp: cached.timestamp.timestamp_millis(),
                    fallback: false,
                    error: None,
                };
            }
        }

        match self.source.fetch_cards().await {
            Ok(cards) => {
                self.cache.set_cached_cards(&cards).await;
                CardsResponse {
                    success: true,
                    data: cards,
                    cached: false,
                    cache_timestamp: Utc::now().timestamp_millis(),
                    fallback: false,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Card fetch failed, serving fallback cards");
                CardsResponse {
                    success: true,
                    data: fallback_cards(),
                    cached: false,
                    cache_timestamp: Utc::now().timestamp_millis(),
                    fallback: true,
                    error: Some(FALLBACK_ERROR.to_string()),
                }
            }
        }
    }

    /// Returns one card, always asking the card API first
    ///
    /// Falls back to the bundled card with the same id. Returns `None` when
    /// neither has it.
    pub async fn get_card(&self, id: &str) -> Option<CardLookup> {
        match self.source.fetch_card(id).await {
            Ok(card) => Some(CardLookup {
                card,
                cached: false,
                fallback: false,
            }),
            Err(e) => {
                warn!(card = %id, error = %e, "Card detail fetch failed, trying fallback cards");
                fallback_card_by_id(id).map(|card| CardLookup {
                    card,
                    cached: false,
                    fallback: true,
                })
            }
        }
    }

    /// Returns one card through a per-card detail cache
    ///
    /// Only live results are cached.
    pub async fn get_card_cached(&self, details: &DetailCache, id: &str) -> Option<CardLookup> {
        let cache = details.entry(id);
        if let Some(cached) = cache.get_cached_cards().await {
            if let Some(card) = cached.cards.into_iter().find(|card| card.id == id) {
                return Some(CardLookup {
                    card,
                    cached: true,
                    fallback: false,
                });
            }
        }

        let lookup = self.get_card(id).await?;
        if !lookup.fallback {
            cache.set_cached_cards(std::slice::from_ref(&lookup.card)).await;
        }
        Some(lookup)
    }

    /// Reports whether a cache entry exists and when it was written
    pub async fn cache_info(&self) -> CacheInfo {
        let timestamp = self.cache.get_cache_timestamp().await;
        CacheInfo {
            exists: timestamp.is_some(),
            timestamp: timestamp.map(|t| t.timestamp_millis()),
        }
    }

    /// Returns the cards matching `query`, read through the normal tiers
    pub async fn search(&self, query: &CardQuery) -> CardsResponse {
        let response = self.get_all_cards(false).await;
        let matches = search_cards(&response.data, query);
        response.with_data(matches)
    }

    /// Returns the best `limit` cards for spending in `category`
    pub async fn recommend(&self, category: &str, limit: usize) -> CardsResponse {
        let response = self.get_all_cards(false).await;
        let ranked = recommend_cards(&response.data, category, limit);
        response.with_data(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryStore};
    use crate::data::source::testing::StubSource;
    use crate::data::tests::sample_card;
    use crate::data::CachedCardSet;
    use chrono::Duration;

    fn cards(n: usize) -> Vec<CardRecord> {
        (0..n)
            .map(|i| sample_card(&format!("card-{}", i), "dining", (i + 1) as f64, 0.0))
            .collect()
    }

    fn create_service(source: Arc<StubSource>) -> (CardService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheManager::new(store.clone(), "cards", Duration::hours(24));
        (CardService::new(cache, source), store)
    }

    async fn write_aged_entry(store: &MemoryStore, cards: Vec<CardRecord>, age: Duration) {
        let entry = CachedCardSet {
            timestamp: Utc::now() - age,
            cards,
        };
        store
            .write("cards", &serde_json::to_string(&entry).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cache_miss_fetches_and_caches() {
        let source = Arc::new(StubSource::serving(cards(5)));
        let (service, _store) = create_service(source.clone());

        let response = service.get_all_cards(false).await;

        assert!(response.success);
        assert!(!response.cached);
        assert!(!response.fallback);
        assert_eq!(response.data.len(), 5);
        let cached = service.cache().get_cached_cards().await.expect("Cache should be filled");
        assert_eq!(cached.cards, cards(5));
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_fetch() {
        let source = Arc::new(StubSource::serving(cards(2)));
        let (service, store) = create_service(source.clone());
        write_aged_entry(&store, cards(5), Duration::hours(1)).await;

        let response = service.get_all_cards(false).await;

        assert!(response.cached);
        assert_eq!(response.data.len(), 5);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_response_reports_stored_timestamp() {
        let source = Arc::new(StubSource::serving(cards(1)));
        let (service, _store) = create_service(source);
        service.cache().set_cached_cards(&cards(1)).await;
        let stored = service.cache().get_cache_timestamp().await.unwrap();

        let response = service.get_all_cards(false).await;

        assert_eq!(response.cache_timestamp, stored.timestamp_millis());
    }

    #[tokio::test]
    async fn test_forced_refresh_bypasses_cache() {
        let source = Arc::new(StubSource::serving(cards(2)));
        let (service, store) = create_service(source.clone());
        write_aged_entry(&store, cards(5), Duration::hours(1)).await;

        let response = service.get_all_cards(true).await;

        assert!(!response.cached);
        assert_eq!(response.data.len(), 2);
        assert_eq!(source.calls(), 1);
        assert_eq!(service.cache().get_cached_cards().await.unwrap().cards.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_cache_and_failed_fetch_serves_fallback_untouched() {
        let source = Arc::new(StubSource::failing());
        let (service, store) = create_service(source);
        write_aged_entry(&store, cards(5), Duration::hours(25)).await;
        let before = store.read("cards").await.unwrap();

        let response = service.get_all_cards(false).await;

        assert!(response.fallback);
        assert!(!response.cached);
        assert_eq!(response.error.as_deref(), Some(FALLBACK_ERROR));
        assert_eq!(response.data, fallback_cards());
        assert_eq!(store.read("cards").await.unwrap(), before, "Cache must be untouched");
    }

    #[tokio::test]
    async fn test_failed_fetch_on_empty_cache_does_not_cache_fallback() {
        let source = Arc::new(StubSource::failing());
        let (service, store) = create_service(source);

        let response = service.get_all_cards(true).await;

        assert!(response.fallback);
        assert!(store.read("cards").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_card_always_fetches_live() {
        let source = Arc::new(StubSource::serving(cards(3)));
        let (service, _store) = create_service(source.clone());
        service.cache().set_cached_cards(&cards(3)).await;

        let lookup = service.get_card("card-1").await.expect("Card should be found");

        assert_eq!(lookup.card.id, "card-1");
        assert!(!lookup.fallback);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_card_falls_back_by_id() {
        let source = Arc::new(StubSource::failing());
        let (service, _store) = create_service(source);

        let lookup = service.get_card("amex-gold").await.expect("Fallback card expected");
        assert!(lookup.fallback);
        assert_eq!(lookup.card.issuer, "American Express");

        assert!(service.get_card("unknown-card").await.is_none());
    }

    #[tokio::test]
    async fn test_get_card_cached_uses_detail_cache() {
        let source = Arc::new(StubSource::serving(cards(3)));
        let (service, store) = create_service(source.clone());
        let details = DetailCache::new(store.clone(), Duration::days(7));

        let first = service.get_card_cached(&details, "card-2").await.unwrap();
        let second = service.get_card_cached(&details, "card-2").await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.card.id, "card-2");
        assert_eq!(source.calls(), 1);
        assert!(store.read("card_card-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_card_cached_skips_caching_fallback() {
        let source = Arc::new(StubSource::failing());
        let (service, store) = create_service(source);
        let details = DetailCache::new(store.clone(), Duration::days(7));

        let lookup = service.get_card_cached(&details, "citi-double-cash").await.unwrap();

        assert!(lookup.fallback);
        assert!(store.read("card_citi-double-cash").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_info_reports_stale_entries() {
        let source = Arc::new(StubSource::serving(vec![]));
        let (service, store) = create_service(source);

        assert_eq!(
            service.cache_info().await,
            CacheInfo {
                exists: false,
                timestamp: None
            }
        );

        write_aged_entry(&store, cards(1), Duration::hours(30)).await;
        let info = service.cache_info().await;
        assert!(info.exists);
        assert!(info.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_recommend_ranks_served_cards() {
        let source = Arc::new(StubSource::serving(cards(4)));
        let (service, _store) = create_service(source);

        let response = service.recommend("dining", 2).await;

        let ids: Vec<&str> = response.data.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["card-3", "card-2"]);
    }

    #[tokio::test]
    async fn test_search_filters_fallback_data() {
        let source = Arc::new(StubSource::failing());
        let (service, _store) = create_service(source);

        let response = service
            .search(&CardQuery {
                issuer: Some("chase".to_string()),
                ..Default::default()
            })
            .await;

        assert!(response.fallback);
        assert_eq!(response.data.len(), 2);
    }

    #[test]
    fn test_envelope_omits_fallback_when_false() {
        let response = CardsResponse {
            success: true,
            data: vec![],
            cached: true,
            cache_timestamp: 42,
            fallback: false,
            error: None,
        };

        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["cacheTimestamp"], 42);
        assert!(json.get("fallback").is_none());
        assert!(json.get("error").is_none());
    }
}
