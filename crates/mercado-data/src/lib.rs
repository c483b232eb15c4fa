//! Data access layer with timeouts and retries.
//!
//! This crate provides:
//! - `FetchClient` - HTTP JSON fetch with automatic timeout/retry
//! - `TimeoutConfig` - Connection and total timeouts
//! - `RetryPolicy` - Retry strategies

mod client;
mod retry;
mod timeout;

pub use client::*;
pub use retry::*;
pub use timeout::*;
