//! media-gateway - Authenticated media catalog gateway
//!
//! This is the composition root that wires together all the components.

use media_gateway::adapters::inbound::{ApiServer, ApiState};
use media_gateway::adapters::outbound::{
    DashMapCacheStore, RedisCacheStore, SystemClock, TcpAuthClient, TmdbClient,
};
use media_gateway::application::{CacheService, CatalogService};
use media_gateway::config::load_config;
use media_gateway::domain::ports::{CacheStore, Clock};
use media_gateway::infrastructure::{shutdown_signal, ShutdownController};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting media-gateway listen={} auth_backend={}:{}",
        cfg.listen_addr,
        cfg.auth_host,
        cfg.auth_port
    );

    // ===== COMPOSITION ROOT =====

    // 1. Create outbound adapters

    // Cache store (Redis when configured, in-memory otherwise)
    let store: Arc<dyn CacheStore> = match &cfg.redis_url {
        Some(url) => {
            let redis = RedisCacheStore::connect(url, cfg.redis_key_prefix.clone()).await?;
            redis.health_check().await?;
            tracing::info!("cache store: redis");
            Arc::new(redis)
        }
        None => {
            tracing::info!("cache store: in-memory");
            Arc::new(DashMapCacheStore::new())
        }
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Metadata API client
    let tmdb = Arc::new(TmdbClient::new(cfg.tmdb_config()?)?);

    // Authorization backend client
    let auth_client = Arc::new(TcpAuthClient::new(cfg.auth_client_config()));
    auth_client.start();

    // 2. Create application services
    let cache = if cfg.cache_single_flight {
        tracing::info!("cache single-flight enabled");
        CacheService::with_single_flight(store, clock)
    } else {
        CacheService::new(store, clock)
    };
    let catalog = Arc::new(CatalogService::new(Arc::new(cache), tmdb));

    // 3. Create inbound adapter and run until a shutdown signal
    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let state = ApiState::new(catalog, auth_client.clone(), auth_client.clone());
    let server = ApiServer::new(cfg.listen_addr.clone(), state);
    let result = server.run(shutdown.clone()).await;

    shutdown.shutdown();
    shutdown
        .drain(Duration::from_secs(5), auth_client.shutdown())
        .await;
    tracing::info!("media-gateway stopped");

    result
}
