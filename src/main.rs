//! ROI simulator API server.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roi_simulator::{
    api::{create_router, AppState},
    config::{load_env, Config},
    scenarios::{ScenarioStore, SqliteScenarioBackend},
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::from_env();
    info!("🚀 Starting ROI simulator on {}", config.socket_addr());

    match config.db_path.as_deref() {
        Some(path) => info!(path, "Scenario store: SQLite (opened on first use)"),
        None => warn!("SCENARIOS_DB_PATH not set; saving scenarios will report DB not configured"),
    }

    let backend = SqliteScenarioBackend::new(config.db_path.clone());
    let state = AppState {
        store: ScenarioStore::new(Arc::new(backend)),
    };
    let app = create_router(state);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roi_simulator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
