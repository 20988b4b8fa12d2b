mod assets;
mod classify;
mod config;
mod error;
mod extract;
mod gemini;
mod models;
mod orchestrator;
mod payload;
mod persist;
mod prompt;
mod routes;
mod sessions;
mod styles;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    assets::AssetLibrary,
    config::AppConfig,
    gemini::GeminiClient,
    orchestrator::BatchOrchestrator,
    persist::FsImagePersister,
    routes::{router, AppState, SharedInvoker},
    sessions::SessionStore,
    styles::StyleLibrary,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    match &config.api_key {
        Some(_) => tracing::info!("🔑 API key configured, model {} @ {}", config.model_id, config.resolution_tier),
        None => tracing::warn!("⚠️ GOOGLE_API_KEY is not set; generation requests will fail until it is"),
    }

    let gemini = GeminiClient::new(config.api_base.clone(), config.request_timeout)
        .context("building Gemini HTTP client")?;
    let invoker: SharedInvoker = Arc::new(gemini);
    let orchestrator = BatchOrchestrator::new(
        config.generation_settings(),
        invoker,
        FsImagePersister::new(config.output_dir.clone()),
    );
    let sessions = SessionStore::load_all(config.sessions_dir.clone())
        .with_context(|| format!("loading sessions from {}", config.sessions_dir.display()))?;

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        styles: Arc::new(StyleLibrary::new(config.styles_dir.clone())),
        assets: Arc::new(AssetLibrary::new(config.assets_dir.clone())),
        sessions: Arc::new(sessions),
        max_images: config.max_images,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("👋 Shutting down");
}
