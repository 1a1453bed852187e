use thiserror::Error;

use storefront_core::{DomainError, ProductId};

use crate::OrderStatus;

/// Coarse error classes, used by transports to pick a status code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    /// The cart is well formed but the inventory cannot satisfy it.
    CartRejected,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Persistence,
}

/// Failure of an order operation.
///
/// Every variant is raised only after the in-flight unit of work (if any) has
/// been rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Empty cart, non-positive quantity, malformed product id.
    #[error("invalid cart: {0}")]
    InvalidCart(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },

    /// `requested` is cumulative across every cart line naming the product.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: i64,
    },

    #[error("order not found")]
    OrderNotFound,

    #[error("cannot move order from '{from}' to '{to}'")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The unit of work could not complete. Transient when `retryable`.
    #[error("persistence failure: {message}")]
    Persistence { message: String, retryable: bool },
}

impl OrderError {
    pub fn persistence(message: impl Into<String>, retryable: bool) -> Self {
        Self::Persistence {
            message: message.into(),
            retryable,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidCart(_) | OrderError::InvalidInput(_) => ErrorKind::InvalidInput,
            OrderError::ProductNotFound { .. } | OrderError::InsufficientStock { .. } => {
                ErrorKind::CartRejected
            }
            OrderError::OrderNotFound => ErrorKind::NotFound,
            OrderError::InvalidStatusTransition { .. } => ErrorKind::Conflict,
            OrderError::Unauthorized => ErrorKind::Unauthorized,
            OrderError::Forbidden(_) => ErrorKind::Forbidden,
            OrderError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// Stable machine-readable code for error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::InvalidCart(_) => "invalid_cart",
            OrderError::InvalidInput(_) => "invalid_input",
            OrderError::ProductNotFound { .. } => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound => "order_not_found",
            OrderError::InvalidStatusTransition { .. } => "invalid_status_transition",
            OrderError::Unauthorized => "unauthorized",
            OrderError::Forbidden(_) => "forbidden",
            OrderError::Persistence { .. } => "persistence_failure",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Persistence { retryable: true, .. })
    }
}

impl From<DomainError> for OrderError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => OrderError::InvalidInput(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_shortage_rejects_the_cart() {
        let err = OrderError::InsufficientStock {
            product_id: ProductId::new(),
            requested: 7,
            available: 5,
        };
        assert_eq!(err.kind(), ErrorKind::CartRejected);
        assert_eq!(err.code(), "insufficient_stock");
        assert!(err.to_string().contains("requested 7, available 5"));
    }

    #[test]
    fn only_flagged_persistence_failures_are_retryable() {
        assert!(OrderError::persistence("serialization failure", true).is_retryable());
        assert!(!OrderError::persistence("disk full", false).is_retryable());
        assert!(!OrderError::OrderNotFound.is_retryable());
    }

    #[test]
    fn domain_validation_maps_to_invalid_input() {
        let err: OrderError = DomainError::invalid_id("OrderId: bad").into();
        assert_eq!(err, OrderError::InvalidInput("OrderId: bad".to_string()));
    }
}
