//! Price/quantity validation.
//!
//! Pure function over an inventory snapshot: no IO, no clock. Lines are
//! scanned in input order and the first failure wins, so results are
//! deterministic for a given cart and snapshot.

use std::collections::HashMap;

use storefront_core::{Money, ProductId};

use crate::{Cart, OrderError};

/// Price and on-hand quantity of one product as seen by the transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub unit_price: Money,
    pub available: i64,
}

impl StockLevel {
    pub fn new(unit_price: Money, available: i64) -> Self {
        Self {
            unit_price,
            available,
        }
    }
}

/// Products visible to one placement, keyed by id. Absent ids do not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    levels: HashMap<ProductId, StockLevel>,
}

impl InventorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, product_id: ProductId, level: StockLevel) {
        self.levels.insert(product_id, level);
    }

    pub fn get(&self, product_id: &ProductId) -> Option<&StockLevel> {
        self.levels.get(product_id)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl FromIterator<(ProductId, StockLevel)> for InventorySnapshot {
    fn from_iter<T: IntoIterator<Item = (ProductId, StockLevel)>>(iter: T) -> Self {
        Self {
            levels: iter.into_iter().collect(),
        }
    }
}

/// One accepted cart line, priced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QuotedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Accepted cart: one quoted line per cart line, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub total: Money,
    pub lines: Vec<QuotedLine>,
}

/// Validate `cart` against `snapshot` and price it.
///
/// Stock sufficiency is checked against the cumulative quantity requested for
/// a product so far, so a product split across several lines cannot oversell.
pub fn quote_cart(snapshot: &InventorySnapshot, cart: &Cart) -> Result<Quote, OrderError> {
    let mut requested: HashMap<ProductId, u64> = HashMap::new();
    let mut total = Money::ZERO;
    let mut lines = Vec::with_capacity(cart.lines().len());

    for line in cart.lines() {
        let level = snapshot
            .get(&line.product_id)
            .ok_or(OrderError::ProductNotFound {
                product_id: line.product_id,
            })?;

        let cumulative = requested.entry(line.product_id).or_insert(0);
        *cumulative += u64::from(line.quantity);

        let available = u64::try_from(level.available).unwrap_or(0);
        if *cumulative > available {
            return Err(OrderError::InsufficientStock {
                product_id: line.product_id,
                requested: *cumulative,
                available: level.available,
            });
        }

        let line_total = level
            .unit_price
            .checked_mul_qty(line.quantity)
            .ok_or_else(|| OrderError::InvalidCart("line total overflows".to_string()))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| OrderError::InvalidCart("order total overflows".to_string()))?;

        lines.push(QuotedLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: level.unit_price,
            line_total,
        });
    }

    Ok(Quote { total, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CartLine;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn prices_lines_and_sums_exactly() {
        let a = ProductId::new();
        let b = ProductId::new();
        let snapshot: InventorySnapshot = [
            (a, StockLevel::new(money("0.10"), 100)),
            (b, StockLevel::new(money("19.99"), 3)),
        ]
        .into_iter()
        .collect();

        let cart = Cart::new(vec![CartLine::new(a, 3), CartLine::new(b, 3)]).unwrap();
        let quote = quote_cart(&snapshot, &cart).unwrap();

        assert_eq!(quote.lines[0].line_total, money("0.30"));
        assert_eq!(quote.lines[1].line_total, money("59.97"));
        assert_eq!(quote.total, money("60.27"));
    }

    #[test]
    fn duplicate_lines_are_checked_cumulatively() {
        let p = ProductId::new();
        let snapshot: InventorySnapshot =
            [(p, StockLevel::new(money("5.00"), 5))].into_iter().collect();

        let cart = Cart::new(vec![CartLine::new(p, 3), CartLine::new(p, 4)]).unwrap();
        let err = quote_cart(&snapshot, &cart).unwrap_err();

        assert_eq!(
            err,
            OrderError::InsufficientStock {
                product_id: p,
                requested: 7,
                available: 5
            }
        );
    }

    #[test]
    fn first_failure_in_input_order_wins() {
        let short = ProductId::new();
        let missing = ProductId::new();
        let snapshot: InventorySnapshot =
            [(short, StockLevel::new(money("1.00"), 1))].into_iter().collect();

        let cart = Cart::new(vec![CartLine::new(missing, 1), CartLine::new(short, 2)]).unwrap();
        assert_eq!(
            quote_cart(&snapshot, &cart).unwrap_err(),
            OrderError::ProductNotFound { product_id: missing }
        );

        let cart = Cart::new(vec![CartLine::new(short, 2), CartLine::new(missing, 1)]).unwrap();
        assert!(matches!(
            quote_cart(&snapshot, &cart).unwrap_err(),
            OrderError::InsufficientStock { product_id, .. } if product_id == short
        ));
    }

    #[test]
    fn exact_stock_is_enough() {
        let p = ProductId::new();
        let snapshot: InventorySnapshot =
            [(p, StockLevel::new(money("2.50"), 4))].into_iter().collect();
        let cart = Cart::new(vec![CartLine::new(p, 4)]).unwrap();
        let quote = quote_cart(&snapshot, &cart).unwrap();
        assert_eq!(quote.total, money("10.00"));
    }

    #[test]
    fn negative_stock_in_snapshot_never_satisfies() {
        let p = ProductId::new();
        let snapshot: InventorySnapshot =
            [(p, StockLevel::new(money("2.50"), -1))].into_iter().collect();
        let cart = Cart::new(vec![CartLine::new(p, 1)]).unwrap();
        assert!(matches!(
            quote_cart(&snapshot, &cart),
            Err(OrderError::InsufficientStock { available: -1, .. })
        ));
    }

    fn cart_strategy() -> impl Strategy<Value = Vec<(usize, i64, u32)>> {
        // (product slot, price in cents, quantity)
        prop::collection::vec((0usize..8, 1i64..1_000_000, 1u32..50), 1..20)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 1000,
            ..ProptestConfig::default()
        })]

        /// The quoted total equals the exact integer-cent sum of price x quantity.
        #[test]
        fn total_is_exact_sum_of_line_totals(lines in cart_strategy()) {
            let ids: Vec<ProductId> = (0..8).map(|_| ProductId::new()).collect();
            let mut prices = [0i64; 8];
            for (slot, cents, _) in &lines {
                prices[*slot] = *cents;
            }

            let snapshot: InventorySnapshot = ids
                .iter()
                .zip(prices.iter())
                .map(|(id, cents)| (*id, StockLevel::new(Money::from_minor(*cents, 2).unwrap(), i64::MAX)))
                .collect();

            let cart = Cart::new(
                lines.iter().map(|(slot, _, qty)| CartLine::new(ids[*slot], *qty)).collect(),
            ).unwrap();

            let quote = quote_cart(&snapshot, &cart).unwrap();

            let expected_cents: i64 = lines
                .iter()
                .map(|(slot, _, qty)| prices[*slot] * i64::from(*qty))
                .sum();
            prop_assert_eq!(quote.total.amount(), Decimal::new(expected_cents, 2));
            let line_sum: Money = quote.lines.iter().map(|l| l.line_total).sum();
            prop_assert_eq!(line_sum, quote.total);
        }

        /// A cart is accepted exactly when no product's cumulative request exceeds stock.
        #[test]
        fn accepts_iff_cumulative_request_fits(
            stock in 0i64..20,
            quantities in prop::collection::vec(1u32..10, 1..5),
        ) {
            let p = ProductId::new();
            let snapshot: InventorySnapshot =
                [(p, StockLevel::new(Money::from_minor(100, 2).unwrap(), stock))].into_iter().collect();
            let cart = Cart::new(quantities.iter().map(|q| CartLine::new(p, *q)).collect()).unwrap();

            let wanted: i64 = quantities.iter().map(|q| i64::from(*q)).sum();
            let result = quote_cart(&snapshot, &cart);
            prop_assert_eq!(result.is_ok(), wanted <= stock);
        }
    }
}
