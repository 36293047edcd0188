//! IFMSA Brazil admin file service
//!
//! Main entry point: loads configuration, wires the content store and serves
//! the admin API.

use anyhow::{Context, bail};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ifmsa_api::{AppState, create_router};
use ifmsa_core::storage::{ContentStore, StoreConfig};
use ifmsa_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ifmsa_core=debug,ifmsa_api=debug,ifmsa_server=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    if config.server.admin_token.trim().is_empty() {
        bail!("server.admin_token must be set (IFMSA__SERVER__ADMIN_TOKEN)");
    }

    let store_config = StoreConfig::from_settings(&config.storage)
        .context("invalid storage configuration")?;
    info!(
        owner = %store_config.owner,
        repo = %store_config.repo,
        cdn_host = %store_config.cdn_host,
        max_attempts = store_config.retry.max_attempts(),
        "Content store configured"
    );
    let store = ContentStore::from_config(store_config).context("failed to build content store")?;

    let state = AppState::new(store, config.server.admin_token.as_str());
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
