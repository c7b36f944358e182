//! Remote card data API client
//!
//! Fetches card listings and card details from the third-party card data API
//! and maps the raw API records into [`CardRecord`]s.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{BonusKind, CardRecord, SignupBonus, BASE_CATEGORY};

/// Default base URL for the card data API
pub const DEFAULT_API_BASE_URL: &str = "https://rewards-credit-card-api.p.rapidapi.com";

/// Default value for the API host header
pub const DEFAULT_API_HOST: &str = "rewards-credit-card-api.p.rapidapi.com";

/// Path of the endpoint listing every card
const CARD_LIST_PATH: &str = "creditcard-cardlist";

/// Path segment of the single-card detail endpoint; the card key follows it
const CARD_DETAIL_PATH: &str = "creditcard-detail-bycard";

/// Errors that can occur when fetching card data
#[derive(Debug, Error)]
pub enum CardSourceError {
    /// HTTP request or body decoding failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with a non-success status
    #[error("Card API returned status {0}")]
    Status(u16),

    /// No API key is configured
    #[error("Card API key is not configured")]
    MissingApiKey,

    /// API has no card with the requested key
    #[error("Card not found: {0}")]
    NotFound(String),

    /// Configured base URL cannot carry path segments
    #[error("Invalid card API base URL: {0}")]
    InvalidUrl(String),
}

/// A source of card records
///
/// Implemented by [`HttpCardSource`] for the live API; tests substitute a
/// scripted source.
#[async_trait]
pub trait CardSource: Send + Sync {
    /// Fetches every card the source knows about
    async fn fetch_cards(&self) -> Result<Vec<CardRecord>, CardSourceError>;

    /// Fetches a single card by its key
    async fn fetch_card(&self, id: &str) -> Result<CardRecord, CardSourceError>;
}

/// A spending bonus entry in a raw API record
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSpendBonus {
    #[serde(alias = "spendBonusCategoryGroup")]
    spend_bonus_category_name: Option<String>,
    earn_multiplier: Option<f64>,
}

/// A benefit entry in a raw API record
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawBenefit {
    benefit_title: Option<String>,
}

/// A single card record as returned by the API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCard {
    card_key: Option<String>,
    card_name: Option<String>,
    card_issuer: Option<String>,
    annual_fee: Option<f64>,
    base_spend_earn_rate: Option<f64>,
    signup_bonus_amount: Option<f64>,
    signup_bonus_type: Option<String>,
    signup_bonus_spend: Option<f64>,
    signup_bonus_length: Option<u32>,
    spend_bonus_category: Vec<RawSpendBonus>,
    benefit: Vec<RawBenefit>,
    card_description: Option<String>,
}

/// Maps a raw API record into a [`CardRecord`]
///
/// Returns `None` for records without a card key, since the key is the
/// record's identity in both the cache and the catalog.
fn map_card(raw: RawCard) -> Option<CardRecord> {
    let id = raw.card_key.filter(|key| !key.trim().is_empty())?;

    let mut reward_rates: BTreeMap<String, f64> = raw
        .spend_bonus_category
        .into_iter()
        .filter_map(|bonus| {
            let category = bonus.spend_bonus_category_name?.trim().to_lowercase();
            let rate = bonus.earn_multiplier?;
            (!category.is_empty()).then_some((category, rate))
        })
        .collect();
    if let Some(base) = raw.base_spend_earn_rate {
        reward_rates.entry(BASE_CATEGORY.to_string()).or_insert(base);
    }

    let perks: BTreeSet<String> = raw
        .benefit
        .into_iter()
        .filter_map(|benefit| benefit.benefit_title)
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .collect();

    let signup_bonus = raw
        .signup_bonus_amount
        .filter(|amount| *amount > 0.0)
        .map(|amount| SignupBonus {
            amount,
            kind: parse_bonus_kind(raw.signup_bonus_type.as_deref()),
            spend_requirement: raw.signup_bonus_spend.unwrap_or(0.0),
            months: raw.signup_bonus_length.unwrap_or(0),
        });

    Some(CardRecord {
        name: raw.card_name.unwrap_or_else(|| id.clone()),
        id,
        issuer: raw.card_issuer.unwrap_or_default(),
        reward_rates,
        annual_fee: raw.annual_fee.unwrap_or(0.0),
        perks,
        signup_bonus,
        description: raw.card_description.unwrap_or_default(),
    })
}

/// Interprets the API's free-form bonus type
fn parse_bonus_kind(kind: Option<&str>) -> BonusKind {
    match kind.map(str::to_lowercase) {
        Some(kind) if kind.contains("cash") => BonusKind::Cash,
        Some(kind) if kind.contains("mile") => BonusKind::Miles,
        _ => BonusKind::Points,
    }
}

/// Client for the card data API
#[derive(Debug, Clone)]
pub struct HttpCardSource {
    /// HTTP client for making requests
    http_client: Client,
    /// Base URL for the API (allows override for testing)
    base_url: String,
    /// Credential sent with every request
    api_key: Option<String>,
    /// Value for the host header expected by the API gateway
    api_host: String,
}

impl HttpCardSource {
    /// Creates a new client against `base_url`
    ///
    /// Without an API key every fetch fails with
    /// [`CardSourceError::MissingApiKey`] before touching the network.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, api_host: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_host: api_host.into(),
        }
    }

    /// Appends `segments` to the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url, CardSourceError> {
        let invalid = || CardSourceError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Performs an authenticated GET and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, CardSourceError> {
        let api_key = self.api_key.as_deref().ok_or(CardSourceError::MissingApiKey)?;
        let url = self.url(segments)?;
        debug!(%url, "Fetching from card API");

        let response = self
            .http_client
            .get(url)
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", &self.api_host)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CardSourceError::Status(status.as_u16()));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl CardSource for HttpCardSource {
    async fn fetch_cards(&self) -> Result<Vec<CardRecord>, CardSourceError> {
        let raw: Vec<RawCard> = self.get_json(&[CARD_LIST_PATH]).await?;
        Ok(raw.into_iter().filter_map(map_card).collect())
    }

    async fn fetch_card(&self, id: &str) -> Result<CardRecord, CardSourceError> {
        let raw: Vec<RawCard> = self.get_json(&[CARD_DETAIL_PATH, id]).await?;
        raw.into_iter()
            .filter_map(map_card)
            .next()
            .ok_or_else(|| CardSourceError::NotFound(id.to_string()))
    }
}
