use std::sync::Arc;

use pankow::application::handlers::{build_router, AppState};
use pankow::application::services::execution_coordinator::ExecutionCoordinator;
use pankow::application::services::trade_session::TradeSession;
use pankow::config::PankowConfig;
use pankow::domain::repositories::audit_store::AuditStore;
use pankow::domain::services::market_catalog::MarketCatalog;
use pankow::infrastructure::exchange_client_factory::ExchangeClientFactory;
use pankow::persistence::repository::SqliteAuditStore;
use pankow::persistence::{init_database, DatabaseConfig};
use pankow::rate_limit::{create_rate_limiter, RateLimiterConfig};
use pankow::shutdown::shutdown_signal;
use pankow::task_runner::WorkerPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env file is normal outside development
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pankow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PankowConfig::from_env();
    info!("Pankow trade server starting...");
    info!(
        "Retry policy: {} orders, {} polls every {:?}",
        config.retry.order_count, config.retry.status_loop_count, config.retry.status_interval
    );

    let pool = init_database(&DatabaseConfig::from_env()).await?;
    let store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(pool).with_token_max_attempts(config.token_max_attempts),
    );

    let catalog = match &config.markets_path {
        Some(path) => {
            info!("Loading market catalog from {}", path.display());
            MarketCatalog::from_file(path)?
        }
        None => MarketCatalog::default_catalog(),
    };
    let catalog = Arc::new(catalog);

    let registry = Arc::new(ExchangeClientFactory::create_all(&catalog, &config));
    info!(
        "Exchanges available: {}",
        registry
            .exchanges()
            .iter()
            .map(|exchange| exchange.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let coordinator = Arc::new(ExecutionCoordinator::new(
        registry.clone(),
        catalog,
        config.retry,
        WorkerPool::new(config.worker_concurrency),
    ));
    let session = TradeSession::new(store, coordinator, config.debug_level);

    let limiter = create_rate_limiter(RateLimiterConfig::from(&config));
    let app = build_router(AppState { session, registry }, limiter);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    info!("Server started successfully. Press Ctrl+C to stop.");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}
