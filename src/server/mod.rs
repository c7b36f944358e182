//! HTTP server exposing the card endpoints
//!
//! Builds the shared [`AppState`] from [`Config`], wires the axum router and
//! serves it until Ctrl+C or SIGTERM.

mod error;
mod routes;

pub use error::ApiError;

use std::io;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::{CacheManager, CacheStore, FileStore};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::data::{CardSource, HttpCardSource};
use crate::refresh::RefreshOrchestrator;
use crate::service::CardService;
use crate::sync::CatalogSync;

/// Store key of the server card-set cache
pub const CARDS_CACHE_KEY: &str = "cards";

/// Shared handler state
pub struct AppState {
    pub service: CardService,
    pub refresher: RefreshOrchestrator,
    pub sync: CatalogSync,
    pub catalog: Catalog,
    pub cron_secret: Option<String>,
}

impl AppState {
    /// Wires every component over one store and one card source
    pub fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn CardSource>,
        config: &Config,
    ) -> Self {
        let cache = CacheManager::new(Arc::clone(&store), CARDS_CACHE_KEY, config.cache_duration);
        let catalog = Catalog::new(store);

        Self {
            service: CardService::new(cache.clone(), Arc::clone(&source)),
            refresher: RefreshOrchestrator::new(cache, Arc::clone(&source), config.refresh_threshold),
            sync: CatalogSync::new(source, catalog.clone(), config.sync.clone()),
            catalog,
            cron_secret: config.cron_secret.clone(),
        }
    }

    /// Builds state backed by the file store and the live card API
    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn CacheStore> = Arc::new(FileStore::new(config.cache_dir.clone()));
        let source: Arc<dyn CardSource> = Arc::new(HttpCardSource::new(
            config.api_base_url.clone(),
            config.api_key.clone(),
            config.api_host.clone(),
        ));
        Self::new(store, source, config)
    }
}

/// Builds the router with every card endpoint
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health_handler))
        .route("/api/cards", get(routes::list_cards_handler))
        .route("/api/cards/cache-info", get(routes::cache_info_handler))
        .route("/api/cards/search", get(routes::search_handler))
        .route("/api/cards/recommend", get(routes::recommend_handler))
        .route("/api/cards/:id", get(routes::card_by_path_handler))
        .route("/api/card", get(routes::card_by_query_handler))
        .route("/api/catalog", get(routes::catalog_handler))
        .route("/api/cron/refresh-cards", post(routes::cron_refresh_handler))
        .route("/api/cron/sync-catalog", post(routes::cron_sync_handler))
        .route("/api/cron/clear-cache", post(routes::cron_clear_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `config.port` until shutdown is requested
pub async fn serve(config: &Config) -> io::Result<()> {
    let state = Arc::new(AppState::from_config(config));
    info!(cache_dir = %config.cache_dir.display(), "Card cache directory");

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Configuration suited to in-process tests
#[cfg(test)]
pub(crate) fn test_config(cron_secret: Option<&str>) -> Config {
    let mut config = Config::from_lookup(|_| None).expect("Defaults should load");
    config.cron_secret = cron_secret.map(str::to_string);
    config.sync = crate::sync::SyncConfig {
        batch_delay: std::time::Duration::ZERO,
        ..Default::default()
    };
    config
}
