// ============================================================================
// Tollgate Server
// ============================================================================
//
// Standalone admission server:
// - Identity resolution (bearer JWT → user, otherwise network origin)
// - Token bucket rate limiting against Redis (or process memory)
// - Fail-open when the bucket store is unavailable
//
// ============================================================================

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tollgate_config::{Config, StoreBackend};
use tollgate_redis::RedisClient;
use tollgate_server::auth::AuthManager;
use tollgate_server::clock::{Clock, SystemClock};
use tollgate_server::context::AppContext;
use tollgate_server::db::{self, PgUserDirectory};
use tollgate_server::rate_limit::{BucketStore, InMemoryBucketStore, RedisBucketStore};
use tollgate_server::routes::create_router;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    let config = Arc::new(config);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Tollgate Server Starting ===");
    info!("Port: {}", config.port);
    info!(
        enabled = config.rate_limit.enabled,
        anonymous_capacity = config.rate_limit.anonymous_capacity,
        user_capacity = config.rate_limit.user_capacity,
        window_ms = config.rate_limit.window_ms,
        backend = ?config.rate_limit.store_backend,
        "Rate limiting configured"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn BucketStore> = match config.rate_limit.store_backend {
        StoreBackend::Redis => {
            let mut client = RedisClient::connect(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?;
            client.ping().await.context("Redis did not answer PING")?;
            info!("Connected to Redis");
            Arc::new(RedisBucketStore::new(client))
        }
        StoreBackend::Memory => {
            let store = Arc::new(InMemoryBucketStore::new());
            spawn_purge_task(
                store.clone(),
                clock.clone(),
                Duration::from_millis(config.rate_limit.window_ms),
            );
            info!("Using in-memory bucket store (single instance only)");
            store
        }
    };

    let db_pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let auth_manager = Arc::new(AuthManager::new(&config)?);
    let users = Arc::new(PgUserDirectory::new(db_pool));

    let app_context = Arc::new(AppContext::new(
        config.clone(),
        auth_manager,
        users,
        store,
        clock,
    ));

    let app = create_router(app_context, Router::new());

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .context("Failed to bind to address")?;

    info!("Tollgate listening on {}", config.bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Failed to start server")?;

    Ok(())
}

/// Evicts idle buckets from the in-memory store once per refill window
fn spawn_purge_task(store: Arc<InMemoryBucketStore>, clock: Arc<dyn Clock>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = store.purge_expired(clock.now_ms()).await;
            if removed > 0 {
                tracing::debug!(removed = removed, "Purged idle buckets");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
