use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod domain;
mod handlers;
mod messaging;
mod metrics;
mod products;
mod store;
mod utils;

use config::{Config, StoreBackend};
use domain::order::OrdersService;
use handlers::OrdersController;
use messaging::{RedisRpcClient, RedisRpcServer};
use products::RpcProductValidator;
use store::{MemoryOrderStore, OrderStore, PgOrderStore};
use utils::RetryConfig;

const DB_MAX_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,orders_service=debug")))
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        store = ?config.store,
        orders_queue = %config.orders_queue,
        products_queue = %config.products_queue,
        "Starting orders service"
    );

    // === 1. Order store ===
    let store: Arc<dyn OrderStore> = match (config.store, config.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(url)) => {
            tracing::info!("Connecting to PostgreSQL and applying migrations");
            Arc::new(PgOrderStore::connect(url, DB_MAX_CONNECTIONS).await?)
        }
        (StoreBackend::Postgres, None) => anyhow::bail!("DATABASE_URL is required for the postgres store"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory order store; orders are lost on restart");
            Arc::new(MemoryOrderStore::new())
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    let registry = metrics.registry().clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(registry, metrics_port)) {
            tracing::error!(error = %e, "Metrics server stopped");
        }
    });

    // === 3. Product service client ===
    let redis = redis::Client::open(config.redis_url.as_str())?;
    let product_client = RedisRpcClient::connect(redis.clone(), config.products_queue.clone(), config.rpc_timeout).await?;
    let products = RpcProductValidator::new(Arc::new(product_client))
        .with_retry(RetryConfig::with_attempts(config.product_retry_attempts))
        .with_metrics(metrics.clone());

    // === 4. Orchestrator and inbound command loop ===
    let service = Arc::new(OrdersService::new(store, Arc::new(products)));
    let controller = Arc::new(OrdersController::new(service).with_metrics(metrics));

    let server = RedisRpcServer::new(redis, config.orders_queue.clone());
    server
        .serve(controller, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Orders service stopped");
    Ok(())
}
