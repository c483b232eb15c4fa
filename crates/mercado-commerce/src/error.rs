//! Commerce error types.

use thiserror::Error;

/// Errors that can occur in commerce operations.
///
/// Every variant describes a rejected operation; the state it targeted is
/// left unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommerceError {
    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// An order with this id is already stored.
    #[error("Duplicate order: {0}")]
    DuplicateOrder(String),

    /// Item not in cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(String),

    /// Quantity below the product's minimum order quantity.
    #[error("Quantity {requested} for {product_id} is below the minimum of {minimum}")]
    BelowMinimumQuantity {
        product_id: String,
        requested: u32,
        minimum: u32,
    },

    /// Quantity exceeds maximum allowed.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(u32, u32),

    /// Unit price must be a positive USD amount.
    #[error("Invalid unit price for {product_id}: {price}")]
    InvalidUnitPrice { product_id: String, price: String },

    /// Cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Exchange rate is not a positive number.
    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),

    /// Order status transition not allowed by the lifecycle.
    #[error("Invalid order transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Checkout step cannot be reached yet.
    #[error("Checkout step {requested} is locked (current step is {current})")]
    StepLocked { requested: usize, current: usize },

    /// Checkout step index outside the flow.
    #[error("Unknown checkout step: {0}")]
    UnknownStep(usize),

    /// Checkout incomplete.
    #[error("Checkout incomplete: missing {0}")]
    CheckoutIncomplete(String),

    /// Installment count out of range.
    #[error("Invalid installment count {0} (allowed 1..={1})")]
    InvalidInstallments(u32, u32),

    /// Payment details don't belong to the selected method.
    #[error("Payment details for {got} don't match selected method {expected}")]
    PaymentMethodMismatch { expected: String, got: String },

    /// Payment flow was cancelled before approval.
    #[error("Payment cancelled")]
    PaymentCancelled,

    /// Payment is already approved and can no longer be cancelled.
    #[error("Payment already approved; it can no longer be cancelled")]
    PaymentCommitted,

    /// Payment flow is no longer running.
    #[error("Payment flow is not active")]
    PaymentNotActive,

    /// Payment flow failed.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// Arithmetic or calendar overflow.
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Storage error.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<mercado_cache::CacheError> for CommerceError {
    fn from(e: mercado_cache::CacheError) -> Self {
        CommerceError::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for CommerceError {
    fn from(e: serde_json::Error) -> Self {
        CommerceError::SerializationError(e.to_string())
    }
}
