//! Scheduled card cache refresh
//!
//! The orchestrator is invoked by an external scheduler (the cron endpoint or
//! the `refresh` command). It refreshes the card cache once the cached set is
//! older than the refresh threshold, which is shorter than the cache's own
//! freshness window, so readers keep getting cached data while the refresh
//! happens ahead of expiry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::CacheManager;
use crate::data::{CardSource, CardSourceError};

/// Result of a refresh invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RefreshOutcome {
    /// Cache is younger than the threshold; nothing was fetched
    #[serde(rename_all = "camelCase")]
    StillFresh {
        cached_at: DateTime<Utc>,
        age_seconds: i64,
    },
    /// Cache was replaced with a freshly fetched set
    Refreshed { count: usize },
    /// Another refresh in this process had not finished yet
    AlreadyRunning,
}

/// Resets the in-progress flag when a refresh ends, however it ends
struct RefreshGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Decides whether the card cache needs refreshing and performs the refresh
#[derive(Clone)]
pub struct RefreshOrchestrator {
    cache: CacheManager,
    source: Arc<dyn CardSource>,
    /// Age after which the cache is refreshed
    threshold: Duration,
    in_progress: Arc<AtomicBool>,
}

impl RefreshOrchestrator {
    /// Creates an orchestrator refreshing `cache` from `source`
    pub fn new(cache: CacheManager, source: Arc<dyn CardSource>, threshold: Duration) -> Self {
        Self {
            cache,
            source,
            threshold,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claims the in-progress flag, or returns `None` if a refresh is running
    fn try_begin(&self) -> Option<RefreshGuard> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                flag: Arc::clone(&self.in_progress),
            })
    }

    /// Runs one refresh cycle
    ///
    /// # Behavior
    /// - Cache younger than the threshold: nothing happens, `StillFresh`
    /// - Otherwise the cache is cleared, the full card list is fetched and
    ///   written back, `Refreshed`
    /// - Fetch failures propagate; the fallback dataset is never used here
    pub async fn run(&self) -> Result<RefreshOutcome, CardSourceError> {
        let Some(_guard) = self.try_begin() else {
            info!("Card refresh already in progress, skipping");
            return Ok(RefreshOutcome::AlreadyRunning);
        };

        let now = Utc::now();
        if let Some(cached_at) = self.cache.get_cache_timestamp().await {
            let age = now - cached_at;
            if age < self.threshold {
                info!(age_minutes = age.num_minutes(), "Card cache still fresh, skipping refresh");
                return Ok(RefreshOutcome::StillFresh {
                    cached_at,
                    age_seconds: age.num_seconds(),
                });
            }
        }

        info!("Refreshing card cache");
        self.cache.clear_card_cache().await;

        let cards = self.source.fetch_cards().await.map_err(|e| {
            warn!(error = %e, "Card refresh fetch failed");
            e
        })?;

        self.cache.set_cached_cards(&cards).await;
        info!(count = cards.len(), "Card cache refreshed");

        Ok(RefreshOutcome::Refreshed { count: cards.len() })
    }
}
