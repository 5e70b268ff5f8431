//! Server crate provides HTTP server functionality.
//!
//! This module implements the HTTP server wrapping the order service:
//! order creation and retrieval, cancellation for users and admins, the
//! admin status override, read-only product endpoints, plus health and
//! metrics endpoints.

pub mod auth;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use model::{CreateOrderRequest, UpdateStatusRequest};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use repository::{ProductsRepository, RepositoryError};
use service::{OrderService, ServiceError};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{AdminPrincipal, AuthPrincipal};
use crate::error::ApiError;

/// Server represents an HTTP server for working with orders.
pub struct Server {
    service: Arc<dyn OrderService>,
    products: Arc<dyn ProductsRepository>,
    port: String,
    metrics: Arc<Metrics>,
}

/// Metrics collects and exposes HTTP server metrics.
struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
    network_traffic_bytes: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )
        .expect("Failed to create errors_total metric");

        let network_traffic_bytes = CounterVec::new(
            Opts::new("network_traffic_bytes", "Network traffic in bytes"),
            &["direction"],
        )
        .expect("Failed to create network_traffic_bytes metric");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("Failed to register errors_total metric");
        registry
            .register(Box::new(network_traffic_bytes.clone()))
            .expect("Failed to register network_traffic_bytes metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
            network_traffic_bytes,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total
            .with_label_values(&[source, endpoint])
            .inc();
    }

    fn record_network_traffic(&self, direction: &str, bytes: usize) {
        self.network_traffic_bytes
            .with_label_values(&[direction])
            .inc_by(bytes as f64);
    }
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Arguments
    ///
    /// * `port` - The port on which the server will listen
    /// * `service` - The order service implementing the business logic
    /// * `products` - The product repository for the read-only product endpoints
    ///
    /// # Returns
    ///
    /// A new Server instance
    pub fn new(
        port: String,
        service: Arc<dyn OrderService>,
        products: Arc<dyn ProductsRepository>,
    ) -> Self {
        info!("Initializing HTTP server on port {}", port);

        Self {
            service,
            products,
            port,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Starts the server and blocks until it's shut down.
    ///
    /// # Returns
    ///
    /// A Result indicating success or failure
    pub async fn start(&self) -> Result<()> {
        let app = self.create_router();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    fn create_router(&self) -> Router {
        let metrics = self.metrics.clone();

        Router::new()
            .route(
                "/order",
                post(Self::handle_create_order).get(Self::handle_get_my_orders),
            )
            .route("/order/{id}", get(Self::handle_get_order_by_id))
            .route("/order/{id}/cancel", patch(Self::handle_cancel_order))
            .route(
                "/admin/orders/{id}/status",
                patch(Self::handle_admin_update_status),
            )
            .route(
                "/admin/orders/{id}/cancel",
                patch(Self::handle_admin_cancel_order),
            )
            .route("/product", get(Self::handle_get_products))
            .route("/product/{id}", get(Self::handle_get_product_by_id))
            .route("/health", get(Self::handle_health))
            .route("/metrics", get(Self::handle_metrics))
            .layer(axum::middleware::from_fn_with_state(
                metrics.clone(),
                Self::metrics_middleware,
            ))
            .with_state(AppState {
                service: self.service.clone(),
                products: self.products.clone(),
                metrics,
            })
    }

    /// Middleware for collecting metrics on HTTP requests
    async fn metrics_middleware(
        State(metrics): State<Arc<Metrics>>,
        req: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> Response {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        // Estimate request size for incoming traffic metrics
        let content_length = req
            .headers()
            .get(axum::http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        if content_length > 0 {
            metrics.record_network_traffic("in", content_length);
        }

        let start = std::time::Instant::now();

        let response = next.run(req).await;

        let duration = start.elapsed();
        let status = response.status().as_u16();

        metrics.record_request(&method, &path, status, duration);

        if status >= 400 {
            metrics.record_error("http", &path);
        }

        // Estimate response size for outgoing traffic metrics
        let response_size = response
            .headers()
            .get(axum::http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        if response_size > 0 {
            metrics.record_network_traffic("out", response_size);
        }

        response
    }

    async fn handle_create_order(
        State(state): State<AppState>,
        AuthPrincipal(principal): AuthPrincipal,
        Json(payload): Json<CreateOrderRequest>,
    ) -> Result<Response, ApiError> {
        info!(user_id = %principal.id, "received create order request");

        let order = state
            .service
            .create_order(principal.id, &payload.items)
            .await?;

        info!(order_id = %order.id, "order created successfully");
        Ok((StatusCode::CREATED, Json(order)).into_response())
    }

    async fn handle_get_my_orders(
        State(state): State<AppState>,
        AuthPrincipal(principal): AuthPrincipal,
    ) -> Result<Response, ApiError> {
        info!(user_id = %principal.id, "fetching orders for user");

        let orders = state.service.get_my_orders(principal.id).await?;
        Ok(Json(orders).into_response())
    }

    async fn handle_get_order_by_id(
        State(state): State<AppState>,
        AuthPrincipal(principal): AuthPrincipal,
        Path(order_id): Path<Uuid>,
    ) -> Result<Response, ApiError> {
        info!(order_id = %order_id, "fetching order");

        let details = state.service.get_order_by_id(order_id, &principal).await?;
        Ok(Json(details).into_response())
    }

    async fn handle_cancel_order(
        State(state): State<AppState>,
        AuthPrincipal(principal): AuthPrincipal,
        Path(order_id): Path<Uuid>,
    ) -> Result<Response, ApiError> {
        info!(order_id = %order_id, user_id = %principal.id, "cancel order requested");

        let order = state.service.cancel_order(order_id, &principal).await?;
        Ok(Json(order).into_response())
    }

    async fn handle_admin_update_status(
        State(state): State<AppState>,
        AdminPrincipal(_principal): AdminPrincipal,
        Path(order_id): Path<Uuid>,
        Json(payload): Json<UpdateStatusRequest>,
    ) -> Result<Response, ApiError> {
        info!(order_id = %order_id, status = ?payload.status, "updating order status");

        let order = state.service.update_status(order_id, payload.status).await?;
        Ok(Json(order).into_response())
    }

    async fn handle_admin_cancel_order(
        State(state): State<AppState>,
        AdminPrincipal(principal): AdminPrincipal,
        Path(order_id): Path<Uuid>,
    ) -> Result<Response, ApiError> {
        info!(order_id = %order_id, "admin cancel order requested");

        let order = state.service.cancel_order(order_id, &principal).await?;
        Ok(Json(order).into_response())
    }

    async fn handle_get_products(State(state): State<AppState>) -> Result<Response, ApiError> {
        let products = state
            .products
            .list()
            .await
            .map_err(|e| ApiError::Service(ServiceError::Db(e)))?;
        Ok(Json(products).into_response())
    }

    async fn handle_get_product_by_id(
        State(state): State<AppState>,
        Path(product_id): Path<i64>,
    ) -> Result<Response, ApiError> {
        let product = state
            .products
            .get_by_id(product_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ApiError::Service(ServiceError::NotFound(format!(
                    "product {product_id} not found"
                ))),
                other => ApiError::Service(ServiceError::Db(other)),
            })?;
        Ok(Json(product).into_response())
    }

    async fn handle_health() -> &'static str {
        "OK"
    }

    async fn handle_metrics(State(state): State<AppState>) -> Response {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
        }

        match String::from_utf8(buffer) {
            Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
            Err(e) => {
                error!("Failed to convert metrics to UTF-8: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
            }
        }
    }
}

/// Application state shared between request handlers
#[derive(Clone)]
struct AppState {
    service: Arc<dyn OrderService>,
    products: Arc<dyn ProductsRepository>,
    metrics: Arc<Metrics>,
}

/// Waits for a shutdown signal (Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::{LineItem, Order, OrderDetails, OrderStatus, Principal, Product};
    use std::collections::HashMap;

    struct NoopService;

    #[async_trait]
    impl OrderService for NoopService {
        async fn create_order(
            &self,
            _user_id: Uuid,
            _items: &[LineItem],
        ) -> Result<Order, ServiceError> {
            Err(ServiceError::Unexpected("noop".into()))
        }

        async fn get_my_orders(&self, _user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
            Ok(Vec::new())
        }

        async fn get_order_by_id(
            &self,
            _id: Uuid,
            _principal: &Principal,
        ) -> Result<OrderDetails, ServiceError> {
            Err(ServiceError::NotFound("order not found".into()))
        }

        async fn update_status(
            &self,
            _id: Uuid,
            _status: OrderStatus,
        ) -> Result<Order, ServiceError> {
            Err(ServiceError::NotFound("order not found".into()))
        }

        async fn cancel_order(
            &self,
            _id: Uuid,
            _principal: &Principal,
        ) -> Result<Order, ServiceError> {
            Err(ServiceError::NotFound("order not found".into()))
        }
    }

    struct NoopProducts;

    #[async_trait]
    impl ProductsRepository for NoopProducts {
        async fn get_by_ids(
            &self,
            _ids: &[i64],
        ) -> Result<HashMap<i64, Product>, RepositoryError> {
            Ok(HashMap::new())
        }

        async fn get_by_id(&self, _product_id: i64) -> Result<Product, RepositoryError> {
            Err(RepositoryError::NotFound)
        }

        async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    fn create_test_server() -> Server {
        Server::new("8080".to_string(), Arc::new(NoopService), Arc::new(NoopProducts))
    }

    #[test]
    fn test_server_creation() {
        let server = create_test_server();
        assert_eq!(server.port, "8080");
    }

    #[test]
    fn test_router_builds() {
        let server = create_test_server();
        let _router = server.create_router();
    }
}
