use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use storefront_core::ProductId;

use crate::OrderError;

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 1_000_000;

/// One requested (product, quantity) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self { product_id, quantity }
    }
}

/// A cart line as submitted by a client, before any validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCartLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A non-empty, shape-checked cart. Lines keep their input order and may
/// name the same product more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(lines: Vec<CartLine>) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::InvalidCart("cart is empty".to_string()));
        }
        for (idx, line) in lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(OrderError::InvalidCart(format!(
                    "line {idx}: quantity must be at least 1"
                )));
            }
            if line.quantity > MAX_LINE_QUANTITY {
                return Err(OrderError::InvalidCart(format!(
                    "line {idx}: quantity must be at most {MAX_LINE_QUANTITY}"
                )));
            }
        }
        Ok(Self { lines })
    }

    /// Parse client-submitted lines: product ids must be UUIDs and quantities
    /// must fit `1..=MAX_LINE_QUANTITY`.
    pub fn parse(raw: Vec<RawCartLine>) -> Result<Self, OrderError> {
        let lines = raw
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let product_id: ProductId = line.product_id.parse().map_err(|_| {
                    OrderError::InvalidCart(format!(
                        "line {idx}: invalid product id '{}'",
                        line.product_id
                    ))
                })?;
                let quantity = u32::try_from(line.quantity).map_err(|_| {
                    OrderError::InvalidCart(format!(
                        "line {idx}: quantity {} is out of range",
                        line.quantity
                    ))
                })?;
                Ok(CartLine::new(product_id, quantity))
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        Self::new(lines)
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Distinct product ids in ascending order (the row-lock acquisition order).
    pub fn product_ids(&self) -> BTreeSet<ProductId> {
        self.lines.iter().map(|l| l.product_id).collect()
    }
}
