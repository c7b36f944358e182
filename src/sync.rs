//! Batched catalog sync
//!
//! Copies the remote card list into the catalog a batch at a time. Each run
//! processes at most `max_batches` batches and sleeps between batches to stay
//! under the card API's rate limit; callers resume from `next_offset`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::data::{CardRecord, CardSource, CardSourceError};

/// Errors that abort a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch card list: {0}")]
    Source(#[from] CardSourceError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Batch limits for a sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Cards per batch
    pub batch_size: usize,
    /// Upper bound on batches per run
    pub max_batches: usize,
    /// Pause between consecutive batches
    pub batch_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_batches: 5,
            batch_delay: Duration::from_millis(1000),
        }
    }
}

/// What a sync run did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub batches_processed: usize,
    /// Cards written to the catalog
    pub cards_synced: usize,
    /// Cards whose detail fetch failed and were stored from the list record
    pub failed: usize,
    /// Cards in the remote list
    pub total: usize,
    /// Where the next run should start, if cards remain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    pub complete: bool,
}

/// Syncs the remote card list into the catalog
#[derive(Clone)]
pub struct CatalogSync {
    source: Arc<dyn CardSource>,
    catalog: Catalog,
    config: SyncConfig,
}

impl CatalogSync {
    pub fn new(source: Arc<dyn CardSource>, catalog: Catalog, config: SyncConfig) -> Self {
        Self {
            source,
            catalog,
            config,
        }
    }

    /// Fetches details for one batch, keeping the list record when a detail fetch fails
    async fn fetch_batch(&self, batch: &[CardRecord]) -> (Vec<CardRecord>, usize) {
        let results = join_all(batch.iter().map(|card| self.source.fetch_card(&card.id))).await;

        let mut failed = 0;
        let cards = batch
            .iter()
            .zip(results)
            .map(|(listed, result)| match result {
                Ok(detail) => detail,
                Err(e) => {
                    warn!(card = %listed.id, error = %e, "Card detail fetch failed, storing list record");
                    failed += 1;
                    listed.clone()
                }
            })
            .collect();

        (cards, failed)
    }

    /// Runs one sync pass starting at `offset` in the remote list
    pub async fn run(&self, offset: usize) -> Result<SyncSummary, SyncError> {
        let cards = self.source.fetch_cards().await?;
        let total = cards.len();
        let batch_size = self.config.batch_size.max(1);

        let remaining = cards.get(offset..).unwrap_or_default();
        let mut summary = SyncSummary {
            batches_processed: 0,
            cards_synced: 0,
            failed: 0,
            total,
            next_offset: None,
            complete: false,
        };

        for (index, batch) in remaining
            .chunks(batch_size)
            .take(self.config.max_batches)
            .enumerate()
        {
            if index > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let (detailed, failed) = self.fetch_batch(batch).await;
            summary.cards_synced += self.catalog.upsert_cards(&detailed).await?;
            summary.failed += failed;
            summary.batches_processed += 1;

            info!(
                batch = index + 1,
                cards = detailed.len(),
                failed,
                "Catalog batch synced"
            );
        }

        let next = offset.saturating_add(summary.cards_synced);
        summary.complete = next >= total;
        if !summary.complete {
            summary.next_offset = Some(next);
        }

        info!(
            synced = summary.cards_synced,
            total,
            complete = summary.complete,
            "Catalog sync finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::data::source::testing::StubSource;
    use crate::data::tests::sample_card;

    fn cards(n: usize) -> Vec<CardRecord> {
        (0..n)
            .map(|i| sample_card(&format!("card-{:02}", i), "dining", 2.0, 0.0))
            .collect()
    }

    fn create_sync(source: StubSource, batch_size: usize, max_batches: usize) -> (CatalogSync, Catalog) {
        let catalog = Catalog::new(Arc::new(MemoryStore::new()));
        let config = SyncConfig {
            batch_size,
            max_batches,
            batch_delay: Duration::ZERO,
        };
        (CatalogSync::new(Arc::new(source), catalog.clone(), config), catalog)
    }

    #[tokio::test]
    async fn test_sync_all_cards_within_budget() {
        let (sync, catalog) = create_sync(StubSource::serving(cards(7)), 3, 5);

        let summary = sync.run(0).await.unwrap();

        assert_eq!(summary.batches_processed, 3);
        assert_eq!(summary.cards_synced, 7);
        assert!(summary.complete);
        assert!(summary.next_offset.is_none());
        assert_eq!(catalog.list_cards().await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_sync_stops_at_max_batches() {
        let (sync, catalog) = create_sync(StubSource::serving(cards(10)), 2, 3);

        let summary = sync.run(0).await.unwrap();

        assert_eq!(summary.batches_processed, 3);
        assert_eq!(summary.cards_synced, 6);
        assert!(!summary.complete);
        assert_eq!(summary.next_offset, Some(6));
        assert_eq!(catalog.list_cards().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_sync_resumes_from_offset() {
        let (sync, catalog) = create_sync(StubSource::serving(cards(10)), 2, 3);

        sync.run(0).await.unwrap();
        let summary = sync.run(6).await.unwrap();

        assert_eq!(summary.batches_processed, 2);
        assert!(summary.complete);
        assert_eq!(catalog.list_cards().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_offset_past_end_is_complete() {
        let (sync, _catalog) = create_sync(StubSource::serving(cards(3)), 2, 3);

        let summary = sync.run(50).await.unwrap();

        assert_eq!(summary.batches_processed, 0);
        assert!(summary.complete);
    }

    #[tokio::test]
    async fn test_failed_detail_keeps_list_record() {
        let source = StubSource::serving(cards(3)).with_failing_details(&["card-01"]);
        let (sync, catalog) = create_sync(source, 10, 1);

        let summary = sync.run(0).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cards_synced, 3);
        assert!(catalog.get_card("card-01").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_failure_aborts_sync() {
        let (sync, catalog) = create_sync(StubSource::failing(), 2, 3);

        let result = sync.run(0).await;

        assert!(matches!(result, Err(SyncError::Source(_))));
        assert!(catalog.list_cards().await.unwrap().is_empty());
    }
}
