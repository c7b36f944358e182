//! HTTP handlers
//!
//! Card read handlers always answer with a success envelope unless the
//! request itself is bad or the card is unknown everywhere. Cron handlers
//! require `Authorization: Bearer <CRON_SECRET>`.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::catalog::SearchIndexEntry;
use crate::data::{CardQuery, CardRecord};
use crate::refresh::RefreshOutcome;
use crate::service::{CardLookup, CardsResponse};
use crate::sync::SyncSummary;

/// Default number of cards returned by the recommend endpoint
const DEFAULT_RECOMMEND_LIMIT: usize = 5;

/// Only `refresh=true` bypasses the cache; any other value is ignored
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    refresh: Option<String>,
}

impl ListParams {
    fn force_refresh(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardKeyParams {
    id: Option<String>,
    card_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    category: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    offset: usize,
}

/// Envelope for single-card responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEnvelope {
    success: bool,
    data: CardRecord,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    fallback: bool,
}

impl From<CardLookup> for CardEnvelope {
    fn from(lookup: CardLookup) -> Self {
        Self {
            success: true,
            data: lookup.card,
            fallback: lookup.fallback,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshEnvelope {
    success: bool,
    #[serde(flatten)]
    outcome: RefreshOutcome,
}

#[derive(Debug, Serialize)]
pub struct SyncEnvelope {
    success: bool,
    #[serde(flatten)]
    summary: SyncSummary,
}

/// Checks the bearer credential against the configured cron secret
fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let secret = secret.ok_or(ApiError::Unauthorized)?;
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if constant_time_eq(token.trim().as_bytes(), secret.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_cards_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<CardsResponse>, ApiError> {
    let Query(params) = query?;
    Ok(Json(state.service.get_all_cards(params.force_refresh()).await))
}

pub async fn cache_info_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let info = state.service.cache_info().await;
    Json(json!({
        "success": true,
        "exists": info.exists,
        "timestamp": info.timestamp,
    }))
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CardQuery>, QueryRejection>,
) -> Result<Json<CardsResponse>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.service.search(&query).await))
}

pub async fn recommend_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RecommendParams>, QueryRejection>,
) -> Result<Json<CardsResponse>, ApiError> {
    let Query(params) = query?;
    let category = params
        .category
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing category".to_string()))?;
    let limit = params.limit.unwrap_or(DEFAULT_RECOMMEND_LIMIT);

    Ok(Json(state.service.recommend(category.trim(), limit).await))
}

async fn lookup_card(state: &AppState, id: &str) -> Result<Json<CardEnvelope>, ApiError> {
    state
        .service
        .get_card(id)
        .await
        .map(|lookup| Json(lookup.into()))
        .ok_or_else(|| ApiError::NotFound(format!("Card not found: {}", id)))
}

pub async fn card_by_path_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CardEnvelope>, ApiError> {
    lookup_card(&state, &id).await
}

pub async fn card_by_query_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CardKeyParams>, QueryRejection>,
) -> Result<Json<CardEnvelope>, ApiError> {
    let Query(params) = query?;
    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let id = non_blank(params.id)
        .or_else(|| non_blank(params.card_key))
        .ok_or_else(|| ApiError::BadRequest("Missing id or cardKey".to_string()))?;
    lookup_card(&state, id.trim()).await
}

pub async fn catalog_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CatalogParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = query?;
    let hits: Vec<SearchIndexEntry> = state
        .catalog
        .search(&params.q)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true, "data": hits })))
}

pub async fn cron_refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RefreshEnvelope>, ApiError> {
    authorize(&headers, state.cron_secret.as_deref())?;

    let outcome = state.refresher.run().await.map_err(|e| ApiError::Upstream {
        public: "Card refresh failed".to_string(),
        detail: e.to_string(),
    })?;

    Ok(Json(RefreshEnvelope {
        success: true,
        outcome,
    }))
}

pub async fn cron_sync_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<SyncParams>, QueryRejection>,
) -> Result<Json<SyncEnvelope>, ApiError> {
    authorize(&headers, state.cron_secret.as_deref())?;
    let Query(params) = query?;

    let summary = state.sync.run(params.offset).await.map_err(|e| match e {
        crate::sync::SyncError::Source(e) => ApiError::Upstream {
            public: "Catalog sync failed".to_string(),
            detail: e.to_string(),
        },
        other => ApiError::Internal(other.to_string()),
    })?;

    Ok(Json(SyncEnvelope {
        success: true,
        summary,
    }))
}

pub async fn cron_clear_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize(&headers, state.cron_secret.as_deref())?;

    state.service.cache().clear_card_cache().await;
    info!("Card cache cleared");

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_authorize_accepts_matching_bearer() {
        assert!(authorize(&headers_with("Bearer s3cret"), Some("s3cret")).is_ok());
    }

    #[test]
    fn test_authorize_rejects_wrong_or_missing_credentials() {
        assert!(authorize(&headers_with("Bearer wrong"), Some("s3cret")).is_err());
        assert!(authorize(&headers_with("Basic s3cret"), Some("s3cret")).is_err());
        assert!(authorize(&HeaderMap::new(), Some("s3cret")).is_err());
    }

    #[test]
    fn test_authorize_rejects_everything_without_secret() {
        assert!(authorize(&headers_with("Bearer "), None).is_err());
        assert!(authorize(&headers_with("Bearer anything"), None).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
