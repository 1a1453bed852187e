//! Orders domain module.
//!
//! This crate contains the business rules for turning a cart into an order,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage). The transactional side lives in `storefront-infra`.

pub mod cart;
pub mod error;
pub mod order;
pub mod validator;

pub use cart::{Cart, CartLine, RawCartLine};
pub use error::{ErrorKind, OrderError};
pub use order::{Order, OrderDetails, OrderItem, OrderStatus, PlacedOrder};
pub use validator::{InventorySnapshot, Quote, QuotedLine, StockLevel, quote_cart};
