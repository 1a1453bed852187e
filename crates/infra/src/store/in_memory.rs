use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use storefront_catalog::Product;
use storefront_core::{AccountId, OrderId, ProductId};
use storefront_orders::{Order, OrderItem, OrderStatus};

use super::{CatalogStore, OrderStore, StoreError, UnitOfWork};

/// Committed table contents. Clone it to compare state before/after a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub products: HashMap<ProductId, Product>,
    pub orders: HashMap<OrderId, Order>,
    /// Items per order, in write order.
    pub items: HashMap<OrderId, Vec<OrderItem>>,
}

/// Where an injected failure fires. Each injection fires once.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailurePoint {
    OrderItemInsert,
    StockUpdate,
    Commit,
    /// Commit fails with a retryable serialization error.
    CommitSerialization,
    Rollback,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Product(ProductId),
    Order(OrderId),
}

type RowLock = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<TableSnapshot>,
    row_locks: Mutex<HashMap<RowKey, RowLock>>,
    failure: Mutex<Option<FailurePoint>>,
    begun: AtomicU64,
    committed: AtomicU64,
}

impl Shared {
    fn take_failure(&self, point: FailurePoint) -> Result<bool, StoreError> {
        let mut slot = self.failure.lock().map_err(|_| poisoned())?;
        if *slot == Some(point) {
            *slot = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Drop lock entries nobody holds or waits on.
    ///
    /// Every clone of a row lock is taken under `row_locks`, so a count of one
    /// means only the map still refers to it.
    fn prune_row_locks(&self, keys: &[RowKey]) {
        let Ok(mut locks) = self.row_locks.lock() else {
            return;
        };
        for key in keys {
            if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(key);
            }
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory product and order tables with per-row exclusive locks.
///
/// Intended for tests/dev. Row locks are async mutexes held by the unit of
/// work that acquired them, so two placements touching the same product are
/// serialized exactly like `SELECT ... FOR UPDATE` would serialize them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed tables.
    pub fn snapshot(&self) -> Result<TableSnapshot, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        Ok(tables.clone())
    }

    /// Arrange for the next unit of work reaching `point` to fail there.
    pub fn fail_next(&self, point: FailurePoint) -> Result<(), StoreError> {
        *self.shared.failure.lock().map_err(|_| poisoned())? = Some(point);
        Ok(())
    }

    /// Units of work started so far.
    pub fn transactions_begun(&self) -> u64 {
        self.shared.begun.load(Ordering::SeqCst)
    }

    /// Units of work committed so far.
    pub fn transactions_committed(&self) -> u64 {
        self.shared.committed.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn row_lock_count(&self) -> usize {
        self.shared.row_locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }
}

#[derive(Debug)]
enum PendingWrite {
    Stock(ProductId, i64),
    Order(Order),
    Item(OrderItem),
    Status(OrderId, OrderStatus),
}

/// Buffered transaction over [`InMemoryStore`].
///
/// Writes are applied to the shared tables only on commit; dropping the unit
/// of work discards them and releases every row lock it holds.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    inserted_orders: Vec<OrderId>,
    writes: Vec<PendingWrite>,
}

impl InMemoryUnitOfWork {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            held: HashMap::new(),
            products: HashMap::new(),
            orders: HashMap::new(),
            inserted_orders: Vec::new(),
            writes: Vec::new(),
        }
    }

    async fn acquire(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains_key(&key) {
            return Ok(());
        }
        let lock = {
            let mut locks = self.shared.row_locks.lock().map_err(|_| poisoned())?;
            locks.entry(key).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        self.held.insert(key, guard);
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        let keys: Vec<RowKey> = self.held.keys().copied().collect();
        self.held.clear();
        self.shared.prune_row_locks(&keys);
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.acquire(RowKey::Product(id)).await?;
        if !self.products.contains_key(&id) {
            let row = {
                let tables = self.shared.tables.read().map_err(|_| poisoned())?;
                tables.products.get(&id).cloned()
            };
            if let Some(product) = row {
                self.products.insert(id, product);
            }
        }
        Ok(self.products.get(&id).cloned())
    }

    async fn set_stock(&mut self, id: ProductId, stock_quantity: i64) -> Result<(), StoreError> {
        if self.shared.take_failure(FailurePoint::StockUpdate)? {
            return Err(StoreError::Backend("injected stock update failure".to_string()));
        }
        let product = self
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotLocked(format!("product {id}")))?;
        if stock_quantity < 0 {
            return Err(StoreError::Constraint(format!(
                "stock_quantity for product {id} must be >= 0, got {stock_quantity}"
            )));
        }
        product.stock_quantity = stock_quantity;
        self.writes.push(PendingWrite::Stock(id, stock_quantity));
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let exists = {
            let tables = self.shared.tables.read().map_err(|_| poisoned())?;
            tables.orders.contains_key(&order.id)
        };
        if exists || self.inserted_orders.contains(&order.id) {
            return Err(StoreError::Duplicate(format!("order {}", order.id)));
        }
        self.inserted_orders.push(order.id);
        self.writes.push(PendingWrite::Order(order.clone()));
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<(), StoreError> {
        if self.shared.take_failure(FailurePoint::OrderItemInsert)? {
            return Err(StoreError::Backend("injected order item failure".to_string()));
        }
        if !self.inserted_orders.contains(&item.order_id) {
            let exists = {
                let tables = self.shared.tables.read().map_err(|_| poisoned())?;
                tables.orders.contains_key(&item.order_id)
            };
            if !exists {
                return Err(StoreError::Constraint(format!(
                    "order item references unknown order {}",
                    item.order_id
                )));
            }
        }
        self.writes.push(PendingWrite::Item(item.clone()));
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.acquire(RowKey::Order(id)).await?;
        if !self.orders.contains_key(&id) {
            let row = {
                let tables = self.shared.tables.read().map_err(|_| poisoned())?;
                tables.orders.get(&id).cloned()
            };
            if let Some(order) = row {
                self.orders.insert(id, order);
            }
        }
        Ok(self.orders.get(&id).cloned())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotLocked(format!("order {id}")))?;
        order.status = status;
        self.writes.push(PendingWrite::Status(id, status));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.shared.take_failure(FailurePoint::Commit)? {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        if self.shared.take_failure(FailurePoint::CommitSerialization)? {
            return Err(StoreError::Serialization(
                "injected serialization failure".to_string(),
            ));
        }

        let mut this = *self;
        {
            let mut tables = this.shared.tables.write().map_err(|_| poisoned())?;
            for write in std::mem::take(&mut this.writes) {
                match write {
                    PendingWrite::Stock(id, qty) => {
                        if let Some(product) = tables.products.get_mut(&id) {
                            product.stock_quantity = qty;
                        }
                    }
                    PendingWrite::Order(order) => {
                        tables.items.entry(order.id).or_default();
                        tables.orders.insert(order.id, order);
                    }
                    PendingWrite::Item(item) => {
                        tables.items.entry(item.order_id).or_default().push(item);
                    }
                    PendingWrite::Status(id, status) => {
                        if let Some(order) = tables.orders.get_mut(&id) {
                            order.status = status;
                        }
                    }
                }
            }
        }
        this.shared.committed.fetch_add(1, Ordering::SeqCst);
        // Row locks release when `this` drops here, after the writes are visible.
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        if self.shared.take_failure(FailurePoint::Rollback)? {
            return Err(StoreError::Backend("injected rollback failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.shared.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryUnitOfWork::new(self.shared.clone())))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn list_orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.account_id == account_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        Ok(tables.items.get(&order_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        if product.stock_quantity < 0 {
            return Err(StoreError::Constraint(
                "stock_quantity must be >= 0".to_string(),
            ));
        }
        let mut tables = self.shared.tables.write().map_err(|_| poisoned())?;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product {}", product.id)));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        Ok(tables.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let tables = self.shared.tables.read().map_err(|_| poisoned())?;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use storefront_core::Money;

    fn product(stock: i64) -> Product {
        Product {
            id: ProductId::new(),
            owner_id: AccountId::new(),
            name: "Lamp".to_string(),
            description: String::new(),
            image: None,
            price: Money::from_minor(1500, 2).unwrap(),
            stock_quantity: stock,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible_and_dropped() {
        let store = InMemoryStore::new();
        let p = product(5);
        store.insert_product(&p).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.lock_product(p.id).await.unwrap();
        uow.set_stock(p.id, 1).await.unwrap();
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock_quantity, 5);

        drop(uow);
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock_quantity, 5);
    }

    #[tokio::test]
    async fn set_stock_requires_lock_and_non_negative_value() {
        let store = InMemoryStore::new();
        let p = product(5);
        store.insert_product(&p).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        assert!(matches!(uow.set_stock(p.id, 1).await, Err(StoreError::NotLocked(_))));
        uow.lock_product(p.id).await.unwrap();
        assert!(matches!(uow.set_stock(p.id, -1).await, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn row_lock_blocks_second_unit_of_work_until_release() {
        let store = InMemoryStore::new();
        let p = product(5);
        store.insert_product(&p).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.lock_product(p.id).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), second.lock_product(p.id)).await;
        assert!(blocked.is_err());

        first.set_stock(p.id, 2).await.unwrap();
        first.commit().await.unwrap();

        let seen = second.lock_product(p.id).await.unwrap().unwrap();
        assert_eq!(seen.stock_quantity, 2);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = InMemoryStore::new();
        store.fail_next(FailurePoint::Commit).unwrap();

        let uow = store.begin().await.unwrap();
        assert!(uow.commit().await.is_err());
        let uow = store.begin().await.unwrap();
        assert!(uow.commit().await.is_ok());
        assert_eq!(store.transactions_begun(), 2);
        assert_eq!(store.transactions_committed(), 1);
    }

    #[tokio::test]
    async fn row_locks_are_released_from_the_lock_table() {
        let store = InMemoryStore::new();
        let p = product(5);
        store.insert_product(&p).await.unwrap();

        let mut committed = store.begin().await.unwrap();
        committed.lock_product(p.id).await.unwrap();
        committed.set_stock(p.id, 4).await.unwrap();
        committed.commit().await.unwrap();

        let mut rolled_back = store.begin().await.unwrap();
        rolled_back.lock_product(ProductId::new()).await.unwrap();
        rolled_back.lock_order(OrderId::new()).await.unwrap();
        rolled_back.rollback().await.unwrap();

        let mut dropped = store.begin().await.unwrap();
        dropped.lock_product(ProductId::new()).await.unwrap();
        assert_eq!(store.row_lock_count(), 1);
        drop(dropped);

        assert_eq!(store.row_lock_count(), 0);
    }

    #[tokio::test]
    async fn contended_row_lock_survives_until_last_waiter_is_done() {
        let store = InMemoryStore::new();
        let p = product(5);
        store.insert_product(&p).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.lock_product(p.id).await.unwrap();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut second = store.begin().await.unwrap();
                let seen = second.lock_product(p.id).await.unwrap().unwrap();
                second.rollback().await.unwrap();
                seen.stock_quantity
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        first.set_stock(p.id, 3).await.unwrap();
        first.commit().await.unwrap();

        assert_eq!(waiter.await.unwrap(), 3);
        assert_eq!(store.row_lock_count(), 0);
    }
}
