//! # Data Repository Layer
//!
//! This module provides repository traits and PostgreSQL implementations
//! for all entities: products, orders, order items, users.
//! Each repository supports both regular and transactional operations
//! for integration with service/business logic.
//!
//! Status-changing writes on orders are *conditional updates*: the predicate
//! includes the expected prior status, so a concurrent transition loses the
//! race with a zero-row update instead of silently overwriting.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Pool, PoolError};
use model::{CancelledBy, Order, OrderItem, OrderStatus, PricedItem, Product, UserSummary};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio_postgres::{Row, Transaction};
use uuid::Uuid;

/// # RepositoryError
///
/// Error types that can occur during repository operations.
///
/// This enum represents the various error conditions that might arise
/// when interacting with the data storage layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a database connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
}

/// # ProductsRepository
///
/// Repository interface for reading product records.
///
/// Products are the authoritative source of pricing at order-creation time;
/// this service never writes them.
#[async_trait]
pub trait ProductsRepository: Send + Sync {
    /// Fetch the products matching the given ids in one batched query.
    ///
    /// Duplicate ids are collapsed; ids with no matching product are simply
    /// absent from the returned map, the caller must detect missing entries.
    async fn get_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Product>, RepositoryError>;

    /// Get a single product by id.
    async fn get_by_id(&self, product_id: i64) -> Result<Product, RepositoryError>;

    /// List all products.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;
}

/// PostgreSQL implementation of the ProductsRepository trait.
pub struct PgProductsRepository {
    /// Shared PostgreSQL connection pool
    pool: Pool,
}

impl PgProductsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn product_from_row(row: &Row) -> Product {
    Product {
        product_id: row.get("product_id"),
        name: row.get("name"),
        price: row.get("price"),
    }
}

#[async_trait]
impl ProductsRepository for PgProductsRepository {
    async fn get_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Product>, RepositoryError> {
        let query = r#"
            SELECT product_id, name, price
            FROM products WHERE product_id = ANY($1)
        "#;
        let client = self.pool.get().await?;
        let rows = client.query(query, &[&ids]).await?;
        let mut products = HashMap::with_capacity(rows.len());
        for row in &rows {
            let product = product_from_row(row);
            products.insert(product.product_id, product);
        }
        Ok(products)
    }

    async fn get_by_id(&self, product_id: i64) -> Result<Product, RepositoryError> {
        let query = r#"
            SELECT product_id, name, price
            FROM products WHERE product_id = $1
        "#;
        let client = self.pool.get().await?;
        let row = client.query_opt(query, &[&product_id]).await?;
        match row {
            Some(row) => Ok(product_from_row(&row)),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let query = r#"
            SELECT product_id, name, price
            FROM products ORDER BY product_id
        "#;
        let client = self.pool.get().await?;
        let rows = client.query(query, &[]).await?;
        Ok(rows.iter().map(product_from_row).collect())
    }
}

/// # OrdersRepository
///
/// Repository interface for managing orders.
///
/// Orders are the main aggregates in the system, owning their order items.
/// The `items` field of returned [`Order`]s is left empty here and filled by
/// the service layer.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Insert a new order header row in a transaction.
    ///
    /// The id is server-generated; status starts as PENDING and the total is
    /// the server-computed amount, never a client-supplied value.
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        user_id: Uuid,
        total: Decimal,
    ) -> Result<Order, RepositoryError>;

    /// Get an order header by id.
    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError>;

    /// List all orders owned by the given user, oldest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, RepositoryError>;

    /// Set the order status unconditionally (admin override path).
    ///
    /// Returns `None` if no such order exists.
    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Cancel the order if its current status is one of `eligible`.
    ///
    /// The status check is part of the UPDATE predicate, so at most one of
    /// several concurrent transitions wins. Returns `None` when the predicate
    /// matched no row (order gone, or status changed since it was read).
    async fn cancel_if_status(
        &self,
        id: Uuid,
        eligible: &[OrderStatus],
        by: CancelledBy,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// PostgreSQL implementation of the OrdersRepository trait.
pub struct PgOrdersRepository {
    /// Shared PostgreSQL connection pool
    pool: Pool,
}

impl PgOrdersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, total, status, cancelled_at, cancelled_by, created_at, updated_at";

fn order_from_row(row: &Row) -> Order {
    Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        total: row.get("total"),
        status: row.get("status"),
        cancelled_at: row.get("cancelled_at"),
        cancelled_by: row.get("cancelled_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        items: Vec::new(), // To be filled by service
    }
}

#[async_trait]
impl OrdersRepository for PgOrdersRepository {
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        user_id: Uuid,
        total: Decimal,
    ) -> Result<Order, RepositoryError> {
        let query = format!(
            r#"
            INSERT INTO orders (id, user_id, total, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
        "#
        );
        let id = Uuid::new_v4();
        let row = tx
            .query_one(query.as_str(), &[&id, &user_id, &total, &OrderStatus::Pending])
            .await?;
        Ok(order_from_row(&row))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError> {
        let query = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders WHERE id = $1
        "#
        );
        let client = self.pool.get().await?;
        let row = client.query_opt(query.as_str(), &[&id]).await?;
        match row {
            Some(row) => Ok(order_from_row(&row)),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders WHERE user_id = $1
            ORDER BY created_at
        "#
        );
        let client = self.pool.get().await?;
        let rows = client.query(query.as_str(), &[&user_id]).await?;
        Ok(rows.iter().map(order_from_row).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let query = format!(
            r#"
            UPDATE orders
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
        "#
        );
        let client = self.pool.get().await?;
        let row = client.query_opt(query.as_str(), &[&id, &status]).await?;
        Ok(row.as_ref().map(order_from_row))
    }

    async fn cancel_if_status(
        &self,
        id: Uuid,
        eligible: &[OrderStatus],
        by: CancelledBy,
    ) -> Result<Option<Order>, RepositoryError> {
        let query = format!(
            r#"
            UPDATE orders
            SET status = $2, cancelled_at = now(), cancelled_by = $3, updated_at = now()
            WHERE id = $1 AND status = ANY($4)
            RETURNING {ORDER_COLUMNS}
        "#
        );
        let client = self.pool.get().await?;
        let row = client
            .query_opt(query.as_str(), &[&id, &OrderStatus::Cancelled, &by, &eligible])
            .await?;
        Ok(row.as_ref().map(order_from_row))
    }
}

/// # OrderItemsRepository
///
/// Repository interface for managing order items.
///
/// Items belong exclusively to one order and carry the price snapshot taken
/// at order-creation time; they are never updated afterwards.
#[async_trait]
pub trait OrderItemsRepository: Send + Sync {
    /// Insert the priced items for a freshly created order, in a transaction.
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: Uuid,
        items: &[PricedItem],
    ) -> Result<Vec<OrderItem>, RepositoryError>;

    /// Get all items of one order.
    async fn get_by_order_id(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError>;

    /// Get the items of several orders in one batched query, grouped by order id.
    async fn get_by_order_ids(
        &self,
        order_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError>;
}

/// PostgreSQL implementation of the OrderItemsRepository trait.
pub struct PgOrderItemsRepository {
    /// Shared PostgreSQL connection pool
    pool: Pool,
}

impl PgOrderItemsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn order_item_from_row(row: &Row) -> OrderItem {
    OrderItem {
        id: row.get("id"),
        order_id: row.get("order_id"),
        product_id: row.get("product_id"),
        quantity: row.get("quantity"),
        price: row.get("price"),
    }
}

#[async_trait]
impl OrderItemsRepository for PgOrderItemsRepository {
    async fn insert_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: Uuid,
        items: &[PricedItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let query = r#"
            INSERT INTO order_items (order_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, product_id, quantity, price
        "#;
        let mut inserted = Vec::with_capacity(items.len());
        for it in items {
            let row = tx
                .query_one(query, &[&order_id, &it.product_id, &it.quantity, &it.price])
                .await?;
            inserted.push(order_item_from_row(&row));
        }
        Ok(inserted)
    }

    async fn get_by_order_id(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
        let query = r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items WHERE order_id = $1
            ORDER BY id
        "#;
        let client = self.pool.get().await?;
        let rows = client.query(query, &[&order_id]).await?;
        Ok(rows.iter().map(order_item_from_row).collect())
    }

    async fn get_by_order_ids(
        &self,
        order_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError> {
        let query = r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items WHERE order_id = ANY($1)
            ORDER BY id
        "#;
        let client = self.pool.get().await?;
        let rows = client.query(query, &[&order_ids]).await?;
        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = order_item_from_row(row);
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

/// # UsersRepository
///
/// Repository interface for reading user records.
///
/// Only the owner summary needed by the admin order view is exposed; account
/// management lives outside this service.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Get a short summary of the user with the given id.
    async fn get_summary(&self, id: Uuid) -> Result<UserSummary, RepositoryError>;
}

/// PostgreSQL implementation of the UsersRepository trait.
pub struct PgUsersRepository {
    /// Shared PostgreSQL connection pool
    pool: Pool,
}

impl PgUsersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn get_summary(&self, id: Uuid) -> Result<UserSummary, RepositoryError> {
        let query = r#"
            SELECT id, name, email
            FROM users WHERE id = $1
        "#;
        let client = self.pool.get().await?;
        let row = client.query_opt(query, &[&id]).await?;
        match row {
            Some(row) => Ok(UserSummary {
                id: row.get("id"),
                name: row.get("name"),
                email: row.get("email"),
            }),
            None => Err(RepositoryError::NotFound),
        }
    }
}
