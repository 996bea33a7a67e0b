//! Toolbox API Server
//!
//! Serves the tool catalog, formula engines, currency rates and file jobs,
//! and runs the scheduled cleanup of expired results.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolbox::services::{HttpRateProvider, Passthrough};
use toolbox::{build_router, AppState, Config, MemStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolbox=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();
    for dir in [
        config.storage.uploads_dir(),
        config.storage.temp_dir(),
        config.storage.processed_dir(),
    ] {
        std::fs::create_dir_all(&dir)?;
    }

    let rates = HttpRateProvider::new(&config.currency)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Build application state
    let state = Arc::new(AppState::new(
        config,
        Arc::new(MemStorage::new()),
        Arc::new(rates),
        Arc::new(Passthrough),
    ));

    state.cleanup.start().await;

    let app = build_router(state.clone());

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.cleanup.stop().await?;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping");
}
