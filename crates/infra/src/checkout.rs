//! Order placement pipeline.
//!
//! `OrderCoordinator::place_order` turns a cart into a committed order in
//! exactly one unit of work:
//!
//! ```text
//! Cart lines
//!   ↓
//! 1. Shape check (empty cart, quantity bounds)     no storage access
//!   ↓
//! 2. Begin unit of work
//!   ↓
//! 3. Lock every distinct product, ascending ProductId
//!   ↓
//! 4. Quote: existence, cumulative stock, exact total
//!   ↓
//! 5. Insert order header (pending)
//!   ↓
//! 6. Per line: insert item, write decremented stock
//!   ↓
//! 7. Commit (not subject to the placement timeout)
//! ```
//!
//! Any failure after step 2 rolls the unit of work back, so either every
//! write of a placement is visible or none is. Locks are always taken in the
//! same global order, so two placements over overlapping products cannot
//! deadlock each other.

use std::collections::HashMap;

use chrono::Utc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

use storefront_core::{AccountId, OrderId, OrderItemId, ProductId};
use storefront_orders::{
    Cart, CartLine, InventorySnapshot, Order, OrderError, PlacedOrder, StockLevel, quote_cart,
};

use crate::config::CheckoutConfig;
use crate::store::{OrderStore, UnitOfWork};

/// Runs order placements against an [`OrderStore`].
#[derive(Debug, Clone)]
pub struct OrderCoordinator<S> {
    store: S,
    config: CheckoutConfig,
}

impl<S> OrderCoordinator<S>
where
    S: OrderStore,
{
    pub fn new(store: S, config: CheckoutConfig) -> Self {
        Self { store, config }
    }

    /// Validate the cart, decrement stock and record the order atomically.
    ///
    /// On error nothing is persisted. `Persistence { retryable: true, .. }`
    /// means the caller may submit the same cart again.
    ///
    /// `placement_timeout` is one deadline for begin, locking and staging,
    /// shared by every attempt. A commit that has started always runs to
    /// completion, so a timeout never hides an order that was in fact written.
    #[instrument(
        skip(self, lines),
        fields(account_id = %account_id, line_count = lines.len()),
        err
    )]
    pub async fn place_order(
        &self,
        account_id: AccountId,
        lines: Vec<CartLine>,
    ) -> Result<PlacedOrder, OrderError> {
        let cart = Cart::new(lines)?;
        let deadline = Instant::now() + self.config.placement_timeout;

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.place_once(account_id, &cart, deadline).await {
                Err(err)
                    if err.is_retryable() && attempt < max_attempts && Instant::now() < deadline =>
                {
                    warn!(attempt, max_attempts, error = %err, "retrying order placement");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn place_once(
        &self,
        account_id: AccountId,
        cart: &Cart,
        deadline: Instant,
    ) -> Result<PlacedOrder, OrderError> {
        let (uow, placed) = match timeout_at(deadline, self.stage(account_id, cart)).await {
            Ok(staged) => staged?,
            Err(_) => {
                // The dropped unit of work rolls back.
                let timeout_ms = self.config.placement_timeout.as_millis() as u64;
                warn!(timeout_ms, "order placement timed out; unit of work rolled back");
                return Err(OrderError::persistence(
                    format!("order placement timed out after {timeout_ms}ms"),
                    true,
                ));
            }
        };

        uow.commit().await?;
        info!(
            order_id = %placed.order_id,
            total_price = %placed.total_price,
            "order placed"
        );
        Ok(placed)
    }

    /// Begin and stage one attempt. Rolls back before returning an error.
    async fn stage(
        &self,
        account_id: AccountId,
        cart: &Cart,
    ) -> Result<(Box<dyn UnitOfWork>, PlacedOrder), OrderError> {
        let mut uow = self.store.begin().await?;

        let staged = stage_order(uow.as_mut(), account_id, cart).await;
        match staged {
            Ok(placed) => Ok((uow, placed)),
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                debug!(error = %err, "order placement rejected");
                Err(err)
            }
        }
    }
}

/// Every write of one placement, inside `uow`. Does not commit.
async fn stage_order(
    uow: &mut dyn UnitOfWork,
    account_id: AccountId,
    cart: &Cart,
) -> Result<PlacedOrder, OrderError> {
    let mut snapshot = InventorySnapshot::new();
    for product_id in cart.product_ids() {
        if let Some(product) = uow.lock_product(product_id).await? {
            snapshot.insert(
                product_id,
                StockLevel::new(product.price, product.stock_quantity),
            );
        }
    }

    let quote = quote_cart(&snapshot, cart)?;
    let (order, items) =
        Order::from_quote(OrderId::new(), account_id, &quote, Utc::now(), OrderItemId::new);

    uow.insert_order(&order).await?;

    let mut remaining: HashMap<ProductId, i64> = cart
        .product_ids()
        .into_iter()
        .filter_map(|id| snapshot.get(&id).map(|level| (id, level.available)))
        .collect();

    for item in &items {
        uow.insert_order_item(item).await?;

        let stock = remaining
            .get_mut(&item.product_id)
            .ok_or(OrderError::ProductNotFound {
                product_id: item.product_id,
            })?;
        *stock -= i64::from(item.quantity);
        uow.set_stock(item.product_id, *stock).await?;
    }

    Ok(order.placed())
}
