/// Order Backend Application
///
/// This is the main entry point for the order backend service.
/// The application provides REST API endpoints for creating and retrieving
/// orders, cancelling them as user or admin, and reading the product catalog.
///
/// # Architecture
///
/// The application follows a modular architecture with:
/// - Repository layer for data access
/// - Service layer for business logic (pricing, state machine, transactions)
/// - API layer for HTTP endpoints
/// - Metrics for monitoring
///
/// The database pool is the single process-wide storage handle: created once
/// here, shared by every repository, and torn down implicitly when the
/// process exits after graceful shutdown.
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use app_config::AppConfig;
use repository::{
    PgOrderItemsRepository, PgOrdersRepository, PgProductsRepository, PgUsersRepository,
};
use server::Server;
use service::OrderServiceImpl;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Order backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize the database pool and apply migrations.
    let db_pool = db::init_db_pool(&config)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized successfully");

    // Initialize repositories over the shared pool.
    let orders_repo = PgOrdersRepository::new(db_pool.clone());
    let items_repo = PgOrderItemsRepository::new(db_pool.clone());
    let products_repo = PgProductsRepository::new(db_pool.clone());
    let users_repo = PgUsersRepository::new(db_pool.clone());

    // Initialize order service.
    let order_service = Arc::new(OrderServiceImpl::new(
        db_pool.clone(),
        orders_repo,
        items_repo,
        products_repo,
        users_repo,
    ));

    // The HTTP product endpoints read the catalog directly.
    let products_for_http = Arc::new(PgProductsRepository::new(db_pool.clone()));

    let http_port = config.http_port.to_string();
    info!("Using HTTP port: {}", http_port);

    let http_server = Server::new(http_port, order_service, products_for_http);
    http_server.start().await?;

    info!("Application stopped");
    Ok(())
}
