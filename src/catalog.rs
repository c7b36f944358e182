//! Card catalog document collection
//!
//! Canonical card records synced from the card API, kept as a single
//! `catalog` document keyed by card id, plus a derived `search_index`
//! projection that is rebuilt on every upsert.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cache::CacheStore;
use crate::data::CardRecord;

const CATALOG_KEY: &str = "catalog";
const SEARCH_INDEX_KEY: &str = "search_index";

/// Errors raised by catalog reads and writes
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog storage failed: {0}")]
    Io(#[from] io::Error),

    #[error("Catalog document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A stored card and when it was last synced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub card: CardRecord,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub synced_at: DateTime<Utc>,
}

/// Search projection of a catalog card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    pub id: String,
    pub name: String,
    pub issuer: String,
    /// Lowercased words from the name, issuer and reward categories
    pub terms: BTreeSet<String>,
}

impl From<&CardRecord> for SearchIndexEntry {
    fn from(card: &CardRecord) -> Self {
        let terms = [card.name.as_str(), card.issuer.as_str()]
            .into_iter()
            .chain(card.reward_rates.keys().map(String::as_str))
            .flat_map(|text| text.split(|c: char| !c.is_alphanumeric()))
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .collect();

        Self {
            id: card.id.clone(),
            name: card.name.clone(),
            issuer: card.issuer.clone(),
            terms,
        }
    }
}

/// Card catalog stored in a [`CacheStore`]
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn CacheStore>,
    /// Serializes read-modify-write cycles within this process
    write_lock: Arc<Mutex<()>>,
}

impl Catalog {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, CatalogEntry>, CatalogError> {
        match self.store.read(CATALOG_KEY).await? {
            Some(contents) => Ok(serde_json::from_str(&contents)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Inserts or replaces `cards`, returning how many were written
    pub async fn upsert_cards(&self, cards: &[CardRecord]) -> Result<usize, CatalogError> {
        let _lock = self.write_lock.lock().await;
        let mut entries = self.load().await?;

        let synced_at = Utc::now();
        for card in cards {
            entries.insert(
                card.id.clone(),
                CatalogEntry {
                    card: card.clone(),
                    synced_at,
                },
            );
        }

        let index: Vec<SearchIndexEntry> = entries
            .values()
            .map(|entry| SearchIndexEntry::from(&entry.card))
            .collect();

        self.store
            .write(CATALOG_KEY, &serde_json::to_string(&entries)?)
            .await?;
        self.store
            .write(SEARCH_INDEX_KEY, &serde_json::to_string(&index)?)
            .await?;

        Ok(cards.len())
    }

    pub async fn get_card(&self, id: &str) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self.load().await?.remove(id))
    }

    /// All catalog entries ordered by card id
    pub async fn list_cards(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.load().await?.into_values().collect())
    }

    /// Looks up index entries containing every word of `text`
    pub async fn search(&self, text: &str) -> Result<Vec<SearchIndexEntry>, CatalogError> {
        let index: Vec<SearchIndexEntry> = match self.store.read(SEARCH_INDEX_KEY).await? {
            Some(contents) => serde_json::from_str(&contents)?,
            None => return Ok(Vec::new()),
        };

        let words: Vec<String> = text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        Ok(index
            .into_iter()
            .filter(|entry| {
                words
                    .iter()
                    .all(|word| entry.terms.iter().any(|term| term.starts_with(word.as_str())))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::data::tests::sample_card;

    fn create_catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let catalog = create_catalog();
        let card = sample_card("alpha", "dining", 3.0, 0.0);

        let written = catalog.upsert_cards(&[card.clone()]).await.unwrap();

        assert_eq!(written, 1);
        let entry = catalog.get_card("alpha").await.unwrap().expect("Card should exist");
        assert_eq!(entry.card, card);
        assert!(catalog.get_card("beta").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_entry() {
        let catalog = create_catalog();
        catalog
            .upsert_cards(&[sample_card("alpha", "dining", 3.0, 0.0)])
            .await
            .unwrap();

        let updated = sample_card("alpha", "dining", 5.0, 95.0);
        catalog.upsert_cards(&[updated.clone()]).await.unwrap();

        let entries = catalog.list_cards().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].card, updated);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let catalog = create_catalog();
        catalog
            .upsert_cards(&[
                sample_card("zeta", "dining", 1.0, 0.0),
                sample_card("alpha", "dining", 1.0, 0.0),
            ])
            .await
            .unwrap();

        let ids: Vec<String> = catalog
            .list_cards()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.card.id)
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_search_matches_word_prefixes() {
        let catalog = create_catalog();
        let mut travel = sample_card("voyager", "travel", 5.0, 95.0);
        travel.issuer = "Capital One".to_string();
        catalog
            .upsert_cards(&[travel, sample_card("diner", "dining", 3.0, 0.0)])
            .await
            .unwrap();

        let hits = catalog.search("capital trav").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "voyager");

        assert_eq!(catalog.search("").await.unwrap().len(), 2);
        assert!(catalog.search("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_on_empty_catalog() {
        let catalog = create_catalog();
        assert!(catalog.search("any").await.unwrap().is_empty());
    }

    #[test]
    fn test_search_index_terms() {
        let card = sample_card("alpha", "dining", 3.0, 0.0);
        let entry = SearchIndexEntry::from(&card);

        assert!(entry.terms.contains("alpha"));
        assert!(entry.terms.contains("card"));
        assert!(entry.terms.contains("test"));
        assert!(entry.terms.contains("dining"));
        assert!(entry.terms.contains("everything"));
    }
}
