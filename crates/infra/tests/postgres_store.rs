//! Postgres-backed placement tests.
//!
//! Require a reachable database: `DATABASE_URL=postgres://... cargo test -- --ignored`

use std::sync::Arc;

use chrono::Utc;

use storefront_catalog::Product;
use storefront_core::{AccountId, Money, OrderId, ProductId};
use storefront_infra::{
    CatalogStore, CheckoutConfig, OrderCoordinator, OrderStore, PostgresStore, StoreError,
};
use storefront_orders::{CartLine, OrderError, OrderStatus};

async fn connect() -> PostgresStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests");
    let store = PostgresStore::connect(&url, 10).await.unwrap();
    store.ensure_schema().await.unwrap();
    store
}

async fn seed(store: &PostgresStore, price: &str, stock: i64) -> ProductId {
    let product = Product {
        id: ProductId::new(),
        owner_id: AccountId::new(),
        name: "pg-test".to_string(),
        description: String::new(),
        image: None,
        price: price.parse::<Money>().unwrap(),
        stock_quantity: stock,
        created_at: Utc::now(),
    };
    store.insert_product(&product).await.unwrap();
    product.id
}

#[tokio::test]
#[ignore]
async fn placement_commits_order_items_and_stock() {
    let store = connect().await;
    let p = seed(&store, "12.34", 4).await;

    let coordinator = OrderCoordinator::new(store.clone(), CheckoutConfig::default());
    let placed = coordinator
        .place_order(AccountId::new(), vec![CartLine::new(p, 1), CartLine::new(p, 2)])
        .await
        .unwrap();

    assert_eq!(placed.total_price, "37.02".parse::<Money>().unwrap());
    assert_eq!(store.get_product(p).await.unwrap().unwrap().stock_quantity, 1);
    let items = store.list_order_items(placed.order_id).await.unwrap();
    assert_eq!(items.iter().map(|i| i.quantity).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
#[ignore]
async fn shortage_rolls_back_every_write() {
    let store = connect().await;
    let p = seed(&store, "1.00", 2).await;
    let account = AccountId::new();

    let err = OrderCoordinator::new(store.clone(), CheckoutConfig::default())
        .place_order(account, vec![CartLine::new(p, 3)])
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InsufficientStock { .. }));
    assert_eq!(store.get_product(p).await.unwrap().unwrap().stock_quantity, 2);
    assert!(store.list_orders_for_account(account).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_placements_serialize_on_row_locks() {
    let store = connect().await;
    let p = seed(&store, "2.00", 5).await;
    let coordinator = Arc::new(OrderCoordinator::new(store.clone(), CheckoutConfig::default()));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .place_order(AccountId::new(), vec![CartLine::new(p, 5)])
                    .await
            })
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            placed += 1;
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(store.get_product(p).await.unwrap().unwrap().stock_quantity, 0);
}

#[tokio::test]
#[ignore]
async fn status_write_to_missing_order_is_rejected() {
    let store = connect().await;

    let mut uow = store.begin().await.unwrap();
    let missing = OrderId::new();
    assert!(uow.lock_order(missing).await.unwrap().is_none());
    let err = uow
        .set_order_status(missing, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotLocked(_)));
    uow.rollback().await.unwrap();
}
