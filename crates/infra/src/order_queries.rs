//! Order read model and the admin status workflow.
//!
//! Reads go straight to committed storage; they never observe a placement
//! that is still in flight.

use tracing::{info, instrument, warn};

use storefront_auth::{Principal, Role, require_role};
use storefront_core::OrderId;
use storefront_orders::{Order, OrderDetails, OrderError, OrderStatus};

use crate::store::OrderStore;

#[derive(Debug, Clone)]
pub struct OrderQueries<S> {
    store: S,
}

impl<S> OrderQueries<S>
where
    S: OrderStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The principal's own orders, newest first.
    pub async fn list_for_principal(&self, principal: &Principal) -> Result<Vec<Order>, OrderError> {
        Ok(self
            .store
            .list_orders_for_account(principal.account_id)
            .await?)
    }

    /// One order with its items.
    ///
    /// Orders owned by someone else are reported as not found unless the
    /// principal is an admin, so ids of other accounts' orders do not leak.
    #[instrument(skip(self, principal), fields(account_id = %principal.account_id), err)]
    pub async fn get_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<OrderDetails, OrderError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .filter(|order| principal.can_access(order.account_id))
            .ok_or(OrderError::OrderNotFound)?;

        let items = self.store.list_order_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Move an order along its lifecycle. Admin only.
    #[instrument(skip(self, principal), fields(account_id = %principal.account_id), err)]
    pub async fn update_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        new_status: &str,
    ) -> Result<Order, OrderError> {
        require_role(principal, &[Role::Admin]).map_err(|e| OrderError::Forbidden(e.to_string()))?;
        let next: OrderStatus = new_status.parse()?;

        let mut uow = self.store.begin().await?;
        let staged = async {
            let mut order = uow.lock_order(order_id).await?.ok_or(OrderError::OrderNotFound)?;
            order.status = order.status.transition(next)?;
            uow.set_order_status(order_id, order.status).await?;
            Ok::<Order, OrderError>(order)
        }
        .await;

        match staged {
            Ok(order) => {
                uow.commit().await?;
                info!(order_id = %order_id, status = %order.status, "order status updated");
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
