//! Order history and lifecycle.

mod store;

pub use store::{LoadReport, OrderStore};
