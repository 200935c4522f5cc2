//! Spotlist server binary

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spotlist::api::{create_router, AppState};
use spotlist::config::{AppConfig, LogFormat};
use spotlist::store::{ItemStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    let store = MemoryStore::new(config.search.categories.iter().cloned());
    if let Some(seed_path) = &config.store.seed_path {
        store
            .load_seed(seed_path)
            .await
            .with_context(|| format!("failed to load seed file {}", seed_path.display()))?;
    }
    let store: Arc<dyn ItemStore> = Arc::new(store);

    tracing::info!(
        categories = config.search.categories.len(),
        blank_filter = ?config.search.blank_filter,
        "Starting Spotlist"
    );

    let state = AppState::new(store, config.search.to_settings());
    let router = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, "Listening for HTTP traffic");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("spotlist=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
