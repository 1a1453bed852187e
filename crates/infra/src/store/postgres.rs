//! Postgres-backed product and order tables.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `40001` serialization_failure | `Serialization` | Transaction aborted by the engine |
//! | `40P01` deadlock_detected | `Serialization` | Lock cycle between transactions |
//! | `55P03` lock_not_available | `Serialization` | Lock wait exceeded `lock_timeout` |
//! | `23514` check_violation | `Constraint` | e.g. `stock_quantity >= 0` |
//! | `23503` foreign_key_violation | `Constraint` | Item references a missing order/product |
//! | `23505` unique_violation | `Duplicate` | Id collision |
//! | Any other | `Backend` | Network errors, pool closed, etc. |
//!
//! ## Transactions
//!
//! Every unit of work runs at `READ COMMITTED` and takes row locks with
//! `SELECT ... FOR UPDATE`. Dropping a [`PostgresUnitOfWork`] without
//! committing rolls the transaction back when the connection is returned to
//! the pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use storefront_catalog::Product;
use storefront_core::{AccountId, Money, OrderId, OrderItemId, ProductId};
use storefront_orders::{Order, OrderItem, OrderStatus};

use super::{CatalogStore, OrderStore, StoreError, UnitOfWork};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id             UUID PRIMARY KEY,
        owner_id       UUID NOT NULL,
        name           TEXT NOT NULL,
        description    TEXT NOT NULL DEFAULT '',
        image          TEXT NULL,
        price          NUMERIC NOT NULL CHECK (price >= 0),
        stock_quantity BIGINT NOT NULL CHECK (stock_quantity >= 0),
        created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id          UUID PRIMARY KEY,
        account_id  UUID NOT NULL,
        total_price NUMERIC NOT NULL CHECK (total_price >= 0),
        status      TEXT NOT NULL
                    CHECK (status IN ('pending', 'shipped', 'delivered', 'cancelled')),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS orders_account_created_idx
        ON orders (account_id, created_at DESC, id DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        seq        BIGSERIAL NOT NULL,
        id         UUID PRIMARY KEY,
        order_id   UUID NOT NULL REFERENCES orders (id),
        product_id UUID NOT NULL REFERENCES products (id),
        quantity   BIGINT NOT NULL CHECK (quantity > 0),
        unit_price NUMERIC NOT NULL CHECK (unit_price >= 0)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS order_items_order_idx ON order_items (order_id, seq)
    "#,
];

const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, description, image, price, stock_quantity, created_at";
const ORDER_COLUMNS: &str = "id, account_id, total_price, status, created_at";

/// Postgres store shared by every request.
///
/// Uses the SQLx connection pool, which is `Send + Sync`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

/// One Postgres transaction.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

        row.map(|r| decode::<ProductRow>(&r, "lock_product").and_then(Product::try_from))
            .transpose()
    }

    async fn set_stock(&mut self, id: ProductId, stock_quantity: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET stock_quantity = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(stock_quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_stock", e))?;
        if result.rows_affected() != 1 {
            return Err(StoreError::NotLocked(format!("product {id}")));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, account_id, total_price, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.account_id.as_uuid())
        .bind(order.total_price.amount())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.amount())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_order", e))?;

        row.map(|r| decode::<OrderRow>(&r, "lock_order").and_then(Order::try_from))
            .transpose()
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_order_status", e))?;
        if result.rows_affected() != 1 {
            return Err(StoreError::NotLocked(format!("order {id}")));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;
        debug!("transaction started");
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        row.map(|r| decode::<OrderRow>(&r, "get_order").and_then(Order::try_from))
            .transpose()
    }

    async fn list_orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE account_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders_for_account", e))?;

        rows.iter()
            .map(|r| decode::<OrderRow>(r, "list_orders_for_account").and_then(Order::try_from))
            .collect()
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_order_items", e))?;

        rows.iter()
            .map(|r| decode::<OrderItemRow>(r, "list_order_items").and_then(OrderItem::try_from))
            .collect()
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, owner_id, name, description, image, price, stock_quantity, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.owner_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.image.as_deref())
        .bind(product.price.amount())
        .bind(product.stock_quantity)
        .bind(product.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(|r| decode::<ProductRow>(&r, "get_product").and_then(Product::try_from))
            .transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter()
            .map(|r| decode::<ProductRow>(r, "list_products").and_then(Product::try_from))
            .collect()
    }
}

fn decode<'r, T>(row: &'r PgRow, operation: &str) -> Result<T, StoreError>
where
    T: FromRow<'r, PgRow>,
{
    T::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to decode row in {operation}: {e}")))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") | Some("55P03") => StoreError::Serialization(msg),
                Some("23514") | Some("23503") => StoreError::Constraint(msg),
                Some("23505") => StoreError::Duplicate(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Backend(format!("timed out acquiring a connection in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    owner_id: uuid::Uuid,
    name: String,
    description: String,
    image: Option<String>,
    price: Decimal,
    stock_quantity: i64,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            image: row.try_get("image")?,
            price: row.try_get("price")?,
            stock_quantity: row.try_get("stock_quantity")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            owner_id: AccountId::from_uuid(row.owner_id),
            name: row.name,
            description: row.description,
            image: row.image,
            price: money_column("products.price", row.price)?,
            stock_quantity: row.stock_quantity,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct OrderRow {
    id: uuid::Uuid,
    account_id: uuid::Uuid,
    total_price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            total_price: row.try_get("total_price")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Backend(format!("orders.status: {e}")))?;
        Ok(Order {
            id: OrderId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            total_price: money_column("orders.total_price", row.total_price)?,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct OrderItemRow {
    id: uuid::Uuid,
    order_id: uuid::Uuid,
    product_id: uuid::Uuid,
    quantity: i64,
    unit_price: Decimal,
}

impl<'r> sqlx::FromRow<'r, PgRow> for OrderItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderItemRow {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
        })
    }
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            StoreError::Backend(format!("order_items.quantity out of range: {}", row.quantity))
        })?;
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.id),
            order_id: OrderId::from_uuid(row.order_id),
            product_id: ProductId::from_uuid(row.product_id),
            quantity,
            unit_price: money_column("order_items.unit_price", row.unit_price)?,
        })
    }
}

fn money_column(column: &str, value: Decimal) -> Result<Money, StoreError> {
    Money::new(value).map_err(|e| StoreError::Backend(format!("{column}: {e}")))
}
