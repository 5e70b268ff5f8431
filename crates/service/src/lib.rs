//! Business logic layer for order management.
//!
//! This module defines the [`OrderService`] trait and its async implementation
//! [`OrderServiceImpl`]. The service coordinates order pricing, atomic
//! multi-table persistence, retrieval, and the status state machine,
//! providing transactional guarantees, business validation, and repository
//! abstraction.
//!
//! # Features
//! - Server-side order totals computed from authoritative product prices.
//! - Atomic persistence of an order and its items in a single transaction.
//! - Role-aware cancellation with race-safe conditional updates.
//! - Dependency injection for testability and loose coupling.
//! - Async-first API suitable for scalable web applications.
//! - Well-typed error handling via [`ServiceError`].

pub mod pricing;
pub mod state;

use anyhow::Result;
use async_trait::async_trait;
use deadpool_postgres::{Pool, PoolError};
use model::{
    CancelledBy, LineItem, Order, OrderDetails, OrderStatus, Principal, Role, UserSummary,
};
use repository::{
    OrderItemsRepository, OrdersRepository, ProductsRepository, RepositoryError, UsersRepository,
};
use thiserror::Error;
use tracing::{instrument, warn};
use uuid::Uuid;

/// The main error type for all operations in [`OrderService`] and [`OrderServiceImpl`].
///
/// The first four variants are operational: their messages are stable and
/// surface to the caller unchanged. Everything else is an internal fault and
/// must not leak detail past the HTTP boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The input is structurally or semantically invalid.
    #[error("{0}")]
    InvalidInput(String),
    /// The referenced entity does not exist (or is not visible to the caller).
    #[error("{0}")]
    NotFound(String),
    /// The caller is not allowed to act on this entity.
    #[error("{0}")]
    Forbidden(String),
    /// The operation is not legal from the entity's current state.
    #[error("{0}")]
    Conflict(String),
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
    /// Failed to obtain a database connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    /// Some unexpected or unhandled error.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Maps a repository miss on an order lookup to the operational `NotFound`.
fn order_not_found(err: RepositoryError) -> ServiceError {
    match err {
        RepositoryError::NotFound => ServiceError::NotFound("order not found".into()),
        other => ServiceError::Db(other),
    }
}

/// Trait describing business operations for order management.
///
/// Service implementations are expected to guarantee atomicity and data
/// integrity when creating orders, and race safety when transitioning their
/// status.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Prices the line items against the product table and atomically
    /// persists the order with its items.
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidInput`] for an empty item list or a
    /// non-positive quantity, [`ServiceError::NotFound`] for an unknown
    /// product, and [`ServiceError::Db`]/[`ServiceError::Pool`] for storage
    /// failures (the transaction is rolled back).
    async fn create_order(&self, user_id: Uuid, items: &[LineItem])
        -> Result<Order, ServiceError>;

    /// Retrieves all orders owned by the given user, items attached,
    /// oldest first.
    async fn get_my_orders(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError>;

    /// Retrieves one order with its items.
    ///
    /// Admins additionally receive the owning user's summary. A non-admin
    /// asking for an order they do not own gets the same `NotFound` as for a
    /// missing order, so existence is not leaked.
    async fn get_order_by_id(
        &self,
        id: Uuid,
        principal: &Principal,
    ) -> Result<OrderDetails, ServiceError>;

    /// Sets the order status to any supplied value (admin override path).
    ///
    /// No transition validation is performed; route-level authorization must
    /// restrict this to admins.
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, ServiceError>;

    /// Cancels the order on behalf of the principal.
    ///
    /// Users may cancel only their own PENDING orders; admins may cancel any
    /// PENDING, PAID or PROCESSING order. The transition is a conditional
    /// update, so of two concurrent cancellations at most one succeeds and
    /// the loser observes a [`ServiceError::Conflict`].
    async fn cancel_order(&self, id: Uuid, principal: &Principal) -> Result<Order, ServiceError>;
}

/// Async implementation of [`OrderService`] using repository pattern.
///
/// This struct wires together concrete repository implementations and a
/// Postgres connection pool to enable atomic, transactional operations on
/// orders.
pub struct OrderServiceImpl<R1, R2, R3, R4> {
    db_pool: Pool,
    orders_repo: R1,
    items_repo: R2,
    products_repo: R3,
    users_repo: R4,
}

impl<R1, R2, R3, R4> OrderServiceImpl<R1, R2, R3, R4>
where
    R1: OrdersRepository + Send + Sync,
    R2: OrderItemsRepository + Send + Sync,
    R3: ProductsRepository + Send + Sync,
    R4: UsersRepository + Send + Sync,
{
    /// Constructs a new [`OrderServiceImpl`] from the provided dependencies.
    ///
    /// # Arguments
    /// * `db_pool` - The Postgres connection pool to use for transactions.
    /// * `orders_repo` - The repository for order header data.
    /// * `items_repo` - The repository for order items.
    /// * `products_repo` - The repository for product price lookups.
    /// * `users_repo` - The repository for owner summaries.
    ///
    /// This approach enables dependency injection and facilitates mocking/testing.
    pub fn new(
        db_pool: Pool,
        orders_repo: R1,
        items_repo: R2,
        products_repo: R3,
        users_repo: R4,
    ) -> Self {
        Self {
            db_pool,
            orders_repo,
            items_repo,
            products_repo,
            users_repo,
        }
    }

    /// Loads the owner summary for the admin order view.
    ///
    /// A missing user row is tolerated: the order is still returned, just
    /// without the summary.
    async fn owner_summary(&self, user_id: Uuid) -> Result<Option<UserSummary>, ServiceError> {
        match self.users_repo.get_summary(user_id).await {
            Ok(user) => Ok(Some(user)),
            Err(RepositoryError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<R1, R2, R3, R4> OrderService for OrderServiceImpl<R1, R2, R3, R4>
where
    R1: OrdersRepository + Send + Sync,
    R2: OrderItemsRepository + Send + Sync,
    R3: ProductsRepository + Send + Sync,
    R4: UsersRepository + Send + Sync,
{
    /// Validates and prices the items first, then persists everything in a
    /// single DB transaction.
    ///
    /// If any insert fails, the entire transaction is rolled back and an
    /// appropriate error is returned; no partial order is ever visible.
    #[instrument(skip(self, items))]
    async fn create_order(
        &self,
        user_id: Uuid,
        items: &[LineItem],
    ) -> Result<Order, ServiceError> {
        if items.is_empty() {
            warn!("order creation rejected: empty item list");
            return Err(ServiceError::InvalidInput(
                "items is required and cannot be empty".into(),
            ));
        }

        // One batched price lookup for all distinct products in the order.
        let mut ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products = self.products_repo.get_by_ids(&ids).await?;

        let (total, priced) = pricing::price_items(items, &products)?;

        let mut client = self.db_pool.get().await.map_err(ServiceError::from)?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Begin transaction failed: {e}")))?;

        let mut order = self.orders_repo.insert_tx(&tx, user_id, total).await?;
        let order_items = self.items_repo.insert_tx(&tx, order.id, &priced).await?;

        tx.commit()
            .await
            .map_err(|e| ServiceError::Unexpected(format!("Commit failed: {e}")))?;

        order.items = order_items;
        Ok(order)
    }

    /// Loads the user's orders and attaches their items with one batched
    /// query over all order ids.
    #[instrument(skip(self))]
    async fn get_my_orders(&self, user_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        let mut orders = self.orders_repo.list_by_user(user_id).await?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order = self.items_repo.get_by_order_ids(&ids).await?;
        for order in &mut orders {
            order.items = items_by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }

    #[instrument(skip(self, principal))]
    async fn get_order_by_id(
        &self,
        id: Uuid,
        principal: &Principal,
    ) -> Result<OrderDetails, ServiceError> {
        let mut order = self.orders_repo.get_by_id(id).await.map_err(order_not_found)?;

        // Non-admins only ever see their own orders; a foreign order looks
        // exactly like a missing one.
        if !principal.is_admin() && order.user_id != principal.id {
            warn!(order_id = %id, "non-owner requested order");
            return Err(ServiceError::NotFound("order not found".into()));
        }

        order.items = self.items_repo.get_by_order_id(id).await?;

        let user = if principal.is_admin() {
            self.owner_summary(order.user_id).await?
        } else {
            None
        };

        Ok(OrderDetails { order, user })
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, ServiceError> {
        match self.orders_repo.update_status(id, status).await? {
            Some(mut order) => {
                order.items = self.items_repo.get_by_order_id(id).await?;
                Ok(order)
            }
            None => Err(ServiceError::NotFound("order not found".into())),
        }
    }

    #[instrument(skip(self, principal))]
    async fn cancel_order(&self, id: Uuid, principal: &Principal) -> Result<Order, ServiceError> {
        let order = self.orders_repo.get_by_id(id).await.map_err(order_not_found)?;

        if let Role::User = principal.role {
            if order.user_id != principal.id {
                warn!(order_id = %id, "user attempted to cancel a foreign order");
                return Err(ServiceError::Forbidden(
                    "you are not allowed to cancel this order".into(),
                ));
            }
        }

        let eligible = state::cancellable_from(principal.role);
        state::check_cancellable(order.status, eligible)?;

        let by = match principal.role {
            Role::User => CancelledBy::User,
            Role::Admin => CancelledBy::Admin,
        };

        match self.orders_repo.cancel_if_status(id, eligible, by).await? {
            Some(mut cancelled) => {
                cancelled.items = self.items_repo.get_by_order_id(id).await?;
                Ok(cancelled)
            }
            None => {
                // Lost a concurrent transition: the status we read above was
                // stale by the time the conditional update ran. Re-read and
                // classify the fresh status.
                let current = self.orders_repo.get_by_id(id).await.map_err(order_not_found)?;
                state::check_cancellable(current.status, eligible)?;
                Err(ServiceError::Conflict(
                    "order status changed concurrently".into(),
                ))
            }
        }
    }
}
