//! Cache manager for card sets
//!
//! Provides a `CacheManager` that stores whole card sets in a [`CacheStore`]
//! with the time they were fetched. Freshness is decided when reading; stale
//! entries stay in the store until they are overwritten or cleared.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::CacheStore;
use crate::data::{CachedCardSet, CardRecord};

/// Borrowed form of [`CachedCardSet`] used when writing
#[derive(Serialize)]
struct CacheEntryRef<'a> {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    cards: &'a [CardRecord],
}

/// Timestamp-only view of a persisted entry
#[derive(Deserialize)]
struct CacheStamp {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

/// Reads and writes one cached card set
///
/// Two managers over the same store with different keys and durations are
/// independent caches; the server card list (24 hours) and the per-card
/// detail cache (7 days) are both instances of this type.
#[derive(Clone)]
pub struct CacheManager {
    /// Backend holding the serialized entry
    store: Arc<dyn CacheStore>,
    /// Store key of the entry
    key: String,
    /// Maximum age at which the entry is still served
    duration: Duration,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("key", &self.key)
            .field("duration", &self.duration)
            .finish()
    }
}

impl CacheManager {
    /// Creates a manager for the entry `key` in `store`
    pub fn new(store: Arc<dyn CacheStore>, key: impl Into<String>, duration: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            duration,
        }
    }

    /// The freshness window of this cache
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether an entry cached at `timestamp` is still fresh at `now`
    pub fn is_fresh(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - timestamp < self.duration
    }

    /// Reads the raw entry, logging and discarding unreadable documents
    async fn read_raw(&self) -> Option<String> {
        match self.store.read(&self.key).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read card cache");
                None
            }
        }
    }

    /// Returns the cached card set if it exists, parses and is fresh
    ///
    /// Missing, unparseable and expired entries all read as `None`. An
    /// expired entry is left in place.
    pub async fn get_cached_cards(&self) -> Option<CachedCardSet> {
        let contents = self.read_raw().await?;
        let entry: CachedCardSet = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ignoring corrupt card cache");
                return None;
            }
        };

        if !self.is_fresh(entry.timestamp, Utc::now()) {
            debug!(key = %self.key, timestamp = %entry.timestamp, "Card cache expired");
            return None;
        }

        Some(entry)
    }

    /// Replaces the cached card set with `cards`, stamped with the current time
    ///
    /// Failures are logged and swallowed; callers just re-fetch next time.
    pub async fn set_cached_cards(&self, cards: &[CardRecord]) {
        let entry = CacheEntryRef {
            timestamp: Utc::now(),
            cards,
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to serialize card cache");
                return;
            }
        };

        match self.store.write(&self.key, &json).await {
            Ok(()) => debug!(key = %self.key, count = cards.len(), "Card cache written"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to write card cache"),
        }
    }

    /// Deletes the cached entry; clearing an empty cache is a no-op
    pub async fn clear_card_cache(&self) {
        if let Err(e) = self.store.remove(&self.key).await {
            warn!(key = %self.key, error = %e, "Failed to clear card cache");
        }
    }

    /// Returns when the entry was cached, whether or not it is still fresh
    pub async fn get_cache_timestamp(&self) -> Option<DateTime<Utc>> {
        let contents = self.read_raw().await?;
        serde_json::from_str::<CacheStamp>(&contents)
            .map(|stamp| stamp.timestamp)
            .ok()
    }
}

/// Per-card detail cache
///
/// Each card is stored as its own `card_<id>` entry in a shared store, so one
/// card expiring or being rewritten leaves the others alone.
#[derive(Clone)]
pub struct DetailCache {
    store: Arc<dyn CacheStore>,
    duration: Duration,
}

impl std::fmt::Debug for DetailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailCache")
            .field("duration", &self.duration)
            .finish()
    }
}

impl DetailCache {
    pub fn new(store: Arc<dyn CacheStore>, duration: Duration) -> Self {
        Self { store, duration }
    }

    /// The cache entry holding card `id`
    pub fn entry(&self, id: &str) -> CacheManager {
        CacheManager::new(Arc::clone(&self.store), format!("card_{}", id), self.duration)
    }
}
