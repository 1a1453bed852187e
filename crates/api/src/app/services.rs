use std::sync::Arc;

use chrono::Utc;

use storefront_auth::{Principal, Role, require_role};
use storefront_catalog::{NewProduct, Product};
use storefront_core::{OrderId, ProductId};
use storefront_infra::{CatalogStore, CheckoutConfig, OrderCoordinator, OrderQueries, Store};
use storefront_orders::{Cart, Order, OrderDetails, OrderError, PlacedOrder, RawCartLine};

/// Shared handle to whichever backend the process runs on.
pub type SharedStore = Arc<dyn Store>;

/// Everything request handlers need, built once at startup.
pub struct AppServices {
    store: SharedStore,
    coordinator: OrderCoordinator<SharedStore>,
    queries: OrderQueries<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, checkout: CheckoutConfig) -> Self {
        Self {
            coordinator: OrderCoordinator::new(store.clone(), checkout),
            queries: OrderQueries::new(store.clone()),
            store,
        }
    }

    pub async fn place_order(
        &self,
        principal: &Principal,
        raw_lines: Vec<RawCartLine>,
    ) -> Result<PlacedOrder, OrderError> {
        let cart = Cart::parse(raw_lines)?;
        self.coordinator
            .place_order(principal.account_id, cart.lines().to_vec())
            .await
    }

    pub async fn list_orders(&self, principal: &Principal) -> Result<Vec<Order>, OrderError> {
        self.queries.list_for_principal(principal).await
    }

    pub async fn get_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<OrderDetails, OrderError> {
        self.queries.get_order(principal, order_id).await
    }

    pub async fn update_order_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        status: &str,
    ) -> Result<Order, OrderError> {
        self.queries.update_status(principal, order_id, status).await
    }

    /// Create a product owned by the caller. Sellers and admins only.
    pub async fn create_product(
        &self,
        principal: &Principal,
        request: NewProduct,
    ) -> Result<Product, OrderError> {
        require_role(principal, &[Role::Seller, Role::Admin])
            .map_err(|e| OrderError::Forbidden(e.to_string()))?;

        let product = request.into_product(ProductId::new(), principal.account_id, Utc::now())?;
        self.store.insert_product(&product).await?;

        tracing::info!(
            product_id = %product.id,
            owner_id = %product.owner_id,
            "product created"
        );
        Ok(product)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, OrderError> {
        Ok(self.store.list_products().await?)
    }
}
