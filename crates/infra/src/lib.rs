//! Infrastructure layer: storage backends, the order placement pipeline and
//! the order read model.

pub mod checkout;
pub mod config;
pub mod order_queries;
pub mod store;


pub use checkout::OrderCoordinator;
pub use config::CheckoutConfig;
pub use order_queries::OrderQueries;
pub use store::{
    CatalogStore, FailurePoint, InMemoryStore, OrderStore, PostgresStore, Store, StoreError,
    TableSnapshot, UnitOfWork,
};
