use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{AccountId, Money, OrderId, OrderItemId, ProductId};

use crate::{OrderError, Quote};

/// Order status lifecycle.
///
/// ```text
/// pending ──> shipped ──> delivered
///    └──────> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Shipped)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    /// (including staying in the same state).
    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, OrderError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrderError::InvalidStatusTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            "" => Err(OrderError::InvalidInput("status is required".to_string())),
            other => Err(OrderError::InvalidInput(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

/// Order header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Order line row. The unit price is a snapshot taken at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul_qty(self.quantity)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Result of a successful placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub total_price: Money,
}

impl Order {
    /// Build the `pending` order header and one item per quoted line.
    ///
    /// Pure: ids and the timestamp are supplied by the caller.
    pub fn from_quote(
        order_id: OrderId,
        account_id: AccountId,
        quote: &Quote,
        created_at: DateTime<Utc>,
        mut next_item_id: impl FnMut() -> OrderItemId,
    ) -> (Order, Vec<OrderItem>) {
        let order = Order {
            id: order_id,
            account_id,
            total_price: quote.total,
            status: OrderStatus::Pending,
            created_at,
        };

        let items = quote
            .lines
            .iter()
            .map(|line| OrderItem {
                id: next_item_id(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        (order, items)
    }

    pub fn placed(&self) -> PlacedOrder {
        PlacedOrder {
            order_id: self.id,
            total_price: self.total_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cart, CartLine, InventorySnapshot, StockLevel, quote_cart};

    #[test]
    fn lifecycle_allows_only_forward_edges() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Shipped));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Shipped));
    }

    #[test]
    fn illegal_transition_reports_both_ends() {
        let err = OrderStatus::Cancelled.transition(OrderStatus::Shipped).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidStatusTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Shipped
            }
        );
        assert_eq!(err.to_string(), "cannot move order from 'cancelled' to 'shipped'");
    }

    #[test]
    fn parses_status_strings() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!(matches!("".parse::<OrderStatus>(), Err(OrderError::InvalidInput(_))));
        assert!(matches!("lost".parse::<OrderStatus>(), Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn from_quote_snapshots_prices_per_line() {
        let p = ProductId::new();
        let price: Money = "4.25".parse().unwrap();
        let snapshot: InventorySnapshot = [(p, StockLevel::new(price, 10))].into_iter().collect();
        let cart = Cart::new(vec![CartLine::new(p, 2), CartLine::new(p, 1)]).unwrap();
        let quote = quote_cart(&snapshot, &cart).unwrap();

        let account = AccountId::new();
        let (order, items) =
            Order::from_quote(OrderId::new(), account, &quote, Utc::now(), OrderItemId::new);

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.account_id, account);
        assert_eq!(order.total_price, "12.75".parse().unwrap());
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.order_id == order.id && i.unit_price == price));
        assert_ne!(items[0].id, items[1].id);
    }
}
