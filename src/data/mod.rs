//! Core data models for Cardwise
//!
//! This module contains the card types shared by the cache, the remote card
//! source, the catalog and the HTTP layer, plus the small filtering and
//! ranking helpers used by the search and recommendation endpoints.

pub mod fallback;
pub mod source;

pub use fallback::{fallback_card_by_id, fallback_cards};
pub use source::{CardSource, CardSourceError, HttpCardSource};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reward category used as the base earn rate when a card has no specific rate
pub const BASE_CATEGORY: &str = "everything";

/// A single credit card product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    /// Stable issuer+product key, used as cache and catalog key
    pub id: String,
    /// Product name
    pub name: String,
    /// Issuing bank
    pub issuer: String,
    /// Earn rate per spending category (e.g. "dining" -> 3.0)
    #[serde(default)]
    pub reward_rates: BTreeMap<String, f64>,
    /// Annual fee in dollars
    #[serde(default)]
    pub annual_fee: f64,
    /// Card benefits
    #[serde(default)]
    pub perks: BTreeSet<String>,
    /// Welcome offer, if the card has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signup_bonus: Option<SignupBonus>,
    #[serde(default)]
    pub description: String,
}

/// Welcome offer attached to a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupBonus {
    /// Bonus size in units of `kind`
    pub amount: f64,
    pub kind: BonusKind,
    /// Spend needed to earn the bonus
    pub spend_requirement: f64,
    /// Window in months for meeting the spend requirement
    pub months: u32,
}

/// Unit a signup bonus is paid in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BonusKind {
    Points,
    Miles,
    Cash,
}

/// A complete card set as persisted by the cache
///
/// Serialized as `{"timestamp": <unix millis>, "cards": [...]}`. The set is
/// always written and replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCardSet {
    /// When the set was fetched and cached
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Cards in fetch order
    pub cards: Vec<CardRecord>,
}

impl CardRecord {
    /// Returns the earn rate for a category, falling back to the base rate
    ///
    /// Category names are matched case-insensitively. Cards without any
    /// matching or base rate earn 1.0.
    pub fn reward_rate(&self, category: &str) -> f64 {
        let category = category.to_lowercase();
        self.reward_rates
            .iter()
            .find(|(name, _)| name.to_lowercase() == category)
            .or_else(|| {
                self.reward_rates
                    .iter()
                    .find(|(name, _)| name.as_str() == BASE_CATEGORY)
            })
            .map(|(_, rate)| *rate)
            .unwrap_or(1.0)
    }

    /// Checks whether the card's name, issuer or description contains `text`
    pub fn matches_text(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.issuer.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

/// Filters applied by the card search endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardQuery {
    /// Free text matched against name, issuer and description
    pub q: Option<String>,
    /// Exact issuer match (case-insensitive)
    pub issuer: Option<String>,
    /// Upper bound on the annual fee
    pub max_annual_fee: Option<f64>,
}

/// Returns the cards matching every filter in `query`, preserving order
pub fn search_cards(cards: &[CardRecord], query: &CardQuery) -> Vec<CardRecord> {
    cards
        .iter()
        .filter(|card| query.q.as_deref().map_or(true, |q| card.matches_text(q)))
        .filter(|card| {
            query
                .issuer
                .as_deref()
                .map_or(true, |issuer| card.issuer.eq_ignore_ascii_case(issuer.trim()))
        })
        .filter(|card| query.max_annual_fee.map_or(true, |max| card.annual_fee <= max))
        .cloned()
        .collect()
}

/// Ranks cards by their earn rate in `category`, best first
///
/// Ties are broken by the lower annual fee, then by name so the ranking is
/// stable across calls.
pub fn recommend_cards(cards: &[CardRecord], category: &str, limit: usize) -> Vec<CardRecord> {
    let mut ranked: Vec<&CardRecord> = cards.iter().collect();
    ranked.sort_by(|a, b| {
        b.reward_rate(category)
            .total_cmp(&a.reward_rate(category))
            .then(a.annual_fee.total_cmp(&b.annual_fee))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.into_iter().take(limit).cloned().collect()
}
