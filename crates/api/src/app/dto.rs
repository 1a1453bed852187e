use serde::Deserialize;
use serde_json::{Value, json};

use storefront_catalog::Product;
use storefront_orders::{Order, OrderDetails, OrderItem, PlacedOrder};

// -------------------------
// Request DTOs
// -------------------------

/// Place-order body: a bare JSON array of `{product_id, quantity}`.
pub type PlaceOrderRequest = Vec<storefront_orders::RawCartLine>;

pub type CreateProductRequest = storefront_catalog::NewProduct;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn placed_order_to_json(placed: PlacedOrder) -> Value {
    json!({
        "message": "Order placed successfully",
        "order_id": placed.order_id.to_string(),
        "total_price": placed.total_price,
    })
}

pub fn order_summary_to_json(order: Order) -> Value {
    json!({
        "order_id": order.id.to_string(),
        "status": order.status.as_str(),
        "total_price": order.total_price,
        "created_at": order.created_at.to_rfc3339(),
    })
}

pub fn order_details_to_json(details: OrderDetails) -> Value {
    let OrderDetails { order, items } = details;
    json!({
        "order_id": order.id.to_string(),
        "account_id": order.account_id.to_string(),
        "status": order.status.as_str(),
        "total_price": order.total_price,
        "created_at": order.created_at.to_rfc3339(),
        "items": items.into_iter().map(order_item_to_json).collect::<Vec<_>>(),
    })
}

fn order_item_to_json(item: OrderItem) -> Value {
    json!({
        "id": item.id.to_string(),
        "product_id": item.product_id.to_string(),
        "quantity": item.quantity,
        "unit_price": item.unit_price,
        "line_total": item.line_total(),
    })
}

pub fn status_update_to_json(order: Order) -> Value {
    json!({
        "message": "order status updated successfully",
        "order_id": order.id.to_string(),
        "status": order.status.as_str(),
    })
}

pub fn product_to_json(product: Product) -> Value {
    json!({
        "id": product.id.to_string(),
        "owner_id": product.owner_id.to_string(),
        "name": product.name,
        "description": product.description,
        "image": product.image,
        "price": product.price,
        "stock_quantity": product.stock_quantity,
        "in_stock": product.is_in_stock(),
        "created_at": product.created_at.to_rfc3339(),
    })
}
