//! Product catalog domain module.
//!
//! Products are the rows of the inventory ledger: price, stock and owner. This
//! crate holds their shape and creation rules only (no IO, no HTTP, no storage).

pub mod product;

pub use product::{NewProduct, Product};
