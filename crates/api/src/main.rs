use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use api::Pipeline;
use api::config::AppConfig;
use api::routes::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    api::telemetry::init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        mode = ?config.mode,
        model = %config.vision.model,
        max_concurrency = config.concurrency.max_concurrent_vision_calls,
        cache = config.cache.enabled,
        "Loaded configuration"
    );

    let pipeline = Pipeline::from_config(&config)?;
    let state = Arc::new(AppState { config, pipeline });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::env::var("TRAIL_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
