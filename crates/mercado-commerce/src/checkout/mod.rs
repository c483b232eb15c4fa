//! Checkout module.
//!
//! Contains the step controller, the buyer's session, order types, and
//! order placement.

mod complete;
mod details;
mod order;
mod session;
mod steps;

pub use complete::OrderPlacement;
pub use details::{normalize_tax_id, Coordinates, DeliveryInfo, FiscalData};
pub use order::{Order, OrderDraft, OrderItem, OrderStatus, PaymentDetails, PaymentMethod};
pub use session::CheckoutSession;
pub use steps::{CheckoutStep, StepAdvance, StepController, StepView};
