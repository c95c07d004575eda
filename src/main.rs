use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod database;
mod ingest;
mod models;
mod publisher;
mod push;
mod registry;
mod server;

use config::{load_config, Config};
use database::create_db_pool;
use models::Result;
use publisher::PublisherSyncService;
use registry::{CachedTokenProvider, RegistryApi, RegistryClient, TokenProvider};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = match load_config("config.yml").await {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config.yml: {}. Using defaults.", e);
            Config::default()
        }
    };

    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("outreach_sync=info".parse().unwrap()),
        )
        .with_max_level(tracing::Level::INFO)
        .init();

    // Initialize database
    info!("Initializing database...");
    let db_pool = create_db_pool(&config.database.path).await?;

    // One shared registry client; the token provider caches the bearer
    // token process-wide.
    let tokens: Arc<dyn TokenProvider> = Arc::new(CachedTokenProvider::new(
        &config.registry.base_url,
        &config.registry.service_email,
        &config.registry.service_password,
        reqwest::Client::new(),
    ));
    let registry: Arc<dyn RegistryApi> = Arc::new(RegistryClient::new(
        &config.registry.base_url,
        config.registry.timeout_seconds,
        tokens,
    ));

    // Background publisher reconciliation, independent of request traffic.
    if config.publisher_sync.enabled {
        let sync = PublisherSyncService::new(
            db_pool.clone(),
            Arc::clone(&registry),
            config.publisher_sync.interval_seconds,
        );
        tokio::spawn(sync.run_loop());
        info!(
            "🔁 publisher sync loop started (every {}s)",
            config.publisher_sync.interval_seconds
        );
    }

    info!("🚀 starting API server");
    let rocket = server::build_rocket(config, db_pool, registry);

    // Graceful shutdown on Ctrl+C
    tokio::select! {
        result = rocket.launch() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
