//! HTTP surface: shared state and the axum router.

pub mod api;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::core::ToolCatalog;
use crate::services::{
    CleanupService, CurrencyService, FileProcessor, FileTransform, RateProvider,
};
use crate::storage::Storage;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub currency: CurrencyService,
    pub files: FileProcessor,
    pub cleanup: CleanupService,
    pub catalog: ToolCatalog,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        rates: Arc<dyn RateProvider>,
        transform: Arc<dyn FileTransform>,
    ) -> Self {
        Self {
            currency: CurrencyService::new(storage.clone(), rates, config.currency.ttl()),
            files: FileProcessor::new(storage.clone(), transform, &config.storage, &config.cleanup),
            cleanup: CleanupService::new(storage.clone(), &config),
            catalog: ToolCatalog::new(),
            started_at: Utc::now(),
            storage,
            config,
        }
    }
}

/// Build the API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = (state.config.server.body_limit_mb * 1024 * 1024) as usize;

    Router::new()
        .route("/api/health", get(api::health::health))
        // Currency
        .route("/api/currency/rates/:base", get(api::currency::rates))
        .route("/api/currency/convert", get(api::currency::convert))
        // Catalog and formulas
        .route("/api/tools", get(api::tools::search))
        .route("/api/tools/popular", get(api::tools::popular))
        .route("/api/tools/usage", post(api::tools::record_usage))
        .route("/api/tools/:id/run", post(api::tools::run))
        // File tools
        .route("/api/pdf/merge", post(api::files::pdf_merge))
        .route("/api/pdf/split", post(api::files::pdf_split))
        .route("/api/pdf/info", post(api::files::pdf_info))
        .route("/api/image/resize", post(api::files::image_resize))
        .route("/api/image/compress", post(api::files::image_compress))
        .route("/api/audio/cut", post(api::files::audio_cut))
        // Jobs
        .route("/api/jobs/:id", get(api::jobs::get))
        .route("/api/jobs/:id/download", get(api::jobs::download))
        // Middleware
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
