//! Storage boundary for the inventory ledger and order tables.
//!
//! The order-placement core talks to storage only through these traits, so
//! the same coordinator runs against Postgres in production and an in-memory
//! store in tests/dev.
//!
//! ## Locking contract
//!
//! A [`UnitOfWork`] is one atomic transaction. `lock_product` / `lock_order`
//! fetch a row **and** hold an exclusive lock on it until `commit`/`rollback`
//! (or until the unit of work is dropped, which rolls back). Writes to a row
//! require that the row was locked in the same unit of work. Nothing written
//! inside a unit of work is visible to other readers before commit.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{FailurePoint, InMemoryStore, TableSnapshot};
pub use postgres::PostgresStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use storefront_catalog::Product;
use storefront_core::{AccountId, OrderId, ProductId};
use storefront_orders::{Order, OrderError, OrderItem, OrderStatus};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, stock shortages).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The engine aborted the transaction to keep it serializable
    /// (serialization failure, deadlock, lock timeout). Safe to retry.
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// A table constraint rejected the write (e.g. negative stock).
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// A write targeted a row this unit of work never locked.
    #[error("row not locked in this unit of work: {0}")]
    NotLocked(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Serialization(_))
    }
}

impl From<StoreError> for OrderError {
    fn from(value: StoreError) -> Self {
        let retryable = value.is_retryable();
        OrderError::persistence(value.to_string(), retryable)
    }
}

/// One atomic transaction over products and orders.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Fetch a product row and hold its lock until the unit of work ends.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Overwrite the stock of a product locked in this unit of work.
    async fn set_stock(&mut self, id: ProductId, stock_quantity: i64) -> Result<(), StoreError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), StoreError>;

    /// Fetch an order row and hold its lock until the unit of work ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Overwrite the status of an order locked in this unit of work.
    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Order tables: transactional writes plus read-only queries.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Orders of one account, newest first.
    async fn list_orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>, StoreError>;

    /// Items of one order, in the order they were written.
    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError>;
}

/// Single-row catalog operations (no cross-row invariants).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
}

/// Everything the HTTP layer needs from one backend.
pub trait Store: OrderStore + CatalogStore {}

impl<T> Store for T where T: OrderStore + CatalogStore + ?Sized {}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        (**self).begin().await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get_order(id).await
    }

    async fn list_orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>, StoreError> {
        (**self).list_orders_for_account(account_id).await
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        (**self).list_order_items(order_id).await
    }
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products().await
    }
}
