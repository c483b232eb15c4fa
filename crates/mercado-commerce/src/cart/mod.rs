//! Shopping cart module.
//!
//! Contains the cart, its lines, and the pricing engine.

#[allow(clippy::module_inception)]
mod cart;
mod pricing;

pub use cart::{Cart, CartLine, MAX_QUANTITY_PER_LINE, MIN_ORDER_QUANTITY};
pub use pricing::{price, PriceBreakdown, PricedCart};
