//! Transaction engine for the Mercado storefront.
//!
//! This crate turns cart lines into priced, currency-normalized orders and
//! tracks those orders through their lifecycle:
//!
//! - **Currency**: USD→VES rate snapshots, provider chain, staleness
//! - **Cart**: Cart lines with minimum quantities, pricing engine
//! - **Checkout**: Step controller, buyer session, order placement
//! - **Orders**: Newest-first order history with write-through persistence
//! - **Payment**: Staged installment confirmation and schedules
//!
//! # Example
//!
//! ```rust
//! use mercado_commerce::prelude::*;
//! use rust_decimal_macros::dec;
//!
//! let mut cart = Cart::new();
//! cart.add_line(CartLine::new("water-5l", "Water 5L", Money::usd(dec!(1)), 60, "bottle")?)?;
//!
//! let rate = ExchangeRate::new(dec!(36.5), chrono::Utc::now(), RateSource::Official)?;
//! let priced = price(cart.lines(), Currency::USD, &rate, &PricingConfig::default())?;
//!
//! assert_eq!(priced.logistics().amount, dec!(26.0));
//! assert_eq!(priced.total().display(), "$86.00");
//! # Ok::<(), CommerceError>(())
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod checkout;
pub mod currency;
pub mod orders;
pub mod payment;

pub use error::CommerceError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{
        CommerceConfig, CurrencyConfig, FreeShippingPolicy, InstallmentConfig, OrdersConfig,
        PricingConfig, ProviderConfig,
    };
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Currency
    pub use crate::currency::{
        CurrencyService, ExchangeRate, FixedRateProvider, HttpRateProvider, RateProvider,
        RateSource, RefreshOutcome,
    };

    // Cart
    pub use crate::cart::{price, Cart, CartLine, PriceBreakdown, PricedCart, MIN_ORDER_QUANTITY};

    // Checkout
    pub use crate::checkout::{
        CheckoutSession, CheckoutStep, DeliveryInfo, FiscalData, Order, OrderDraft, OrderItem,
        OrderPlacement, OrderStatus, PaymentDetails, PaymentMethod, StepAdvance, StepController,
        StepView,
    };

    // Orders
    pub use crate::orders::{LoadReport, OrderStore};

    // Payment
    pub use crate::payment::{
        InstallmentProcessor, InstallmentRequest, InstallmentRun, InstallmentSchedule,
        PaymentStage, StageEvent,
    };
}
