//! Engine configuration.
//!
//! Every field has a serde default so partial config files work.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::currency::RateSource;
use crate::money::Currency;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommerceConfig {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub installments: InstallmentConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
}

/// Logistics fee and free-shipping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat logistics fee in USD.
    #[serde(default = "default_base_fee")]
    pub base_fee: Decimal,
    /// USD per unit of weight.
    #[serde(default = "default_weight_rate")]
    pub weight_rate: Decimal,
    /// Weight above which the bulk discount applies.
    #[serde(default = "default_bulk_weight_threshold")]
    pub bulk_weight_threshold: u64,
    /// Multiplier applied to the logistics fee for bulk orders.
    #[serde(default = "default_bulk_discount_factor")]
    pub bulk_discount_factor: Decimal,
    #[serde(default)]
    pub free_shipping: FreeShippingPolicy,
}

fn default_base_fee() -> Decimal {
    dec!(2.5)
}

fn default_weight_rate() -> Decimal {
    dec!(0.5)
}

fn default_bulk_weight_threshold() -> u64 {
    50
}

fn default_bulk_discount_factor() -> Decimal {
    dec!(0.8)
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fee: default_base_fee(),
            weight_rate: default_weight_rate(),
            bulk_weight_threshold: default_bulk_weight_threshold(),
            bulk_discount_factor: default_bulk_discount_factor(),
            free_shipping: FreeShippingPolicy::default(),
        }
    }
}

/// How the free-shipping threshold is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FreeShippingPolicy {
    /// Compare the display-currency subtotal with a fixed amount per currency.
    PerCurrency {
        #[serde(default = "default_usd_threshold")]
        usd: Decimal,
        #[serde(default = "default_ves_threshold")]
        ves: Decimal,
    },
    /// Compare the USD subtotal with one USD threshold, whatever is displayed.
    ConvertedFromUsd {
        #[serde(default = "default_usd_threshold")]
        usd: Decimal,
    },
}

fn default_usd_threshold() -> Decimal {
    dec!(100)
}

fn default_ves_threshold() -> Decimal {
    dec!(3600)
}

impl Default for FreeShippingPolicy {
    fn default() -> Self {
        FreeShippingPolicy::PerCurrency {
            usd: default_usd_threshold(),
            ves: default_ves_threshold(),
        }
    }
}

impl FreeShippingPolicy {
    /// Threshold expressed in `currency`, for display.
    pub fn threshold_in(&self, currency: Currency, rate: Decimal) -> Decimal {
        match (self, currency) {
            (FreeShippingPolicy::PerCurrency { usd, .. }, Currency::USD) => *usd,
            (FreeShippingPolicy::PerCurrency { ves, .. }, Currency::VES) => *ves,
            (FreeShippingPolicy::ConvertedFromUsd { usd }, Currency::USD) => *usd,
            (FreeShippingPolicy::ConvertedFromUsd { usd }, Currency::VES) => *usd * rate,
        }
    }
}

/// Exchange-rate acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Snapshot age after which it is stale.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
    /// VES per USD used before any provider has answered.
    #[serde(default = "default_bootstrap_rate")]
    pub bootstrap_rate: Decimal,
    /// Providers, tried in order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Per-request timeout for HTTP providers.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Retries per HTTP provider before moving to the next one.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
}

fn default_stale_after_hours() -> u64 {
    6
}

fn default_bootstrap_rate() -> Decimal {
    dec!(36.50)
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_fetch_retries() -> u32 {
    1
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            stale_after_hours: default_stale_after_hours(),
            bootstrap_rate: default_bootstrap_rate(),
            providers: Vec::new(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            fetch_retries: default_fetch_retries(),
        }
    }
}

impl CurrencyConfig {
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours.min(24 * 365) as i64)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// One entry in the rate provider chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// JSON endpoint.
    Http {
        name: String,
        url: String,
        /// JSON pointer to the rate, e.g. `/rates/VES`.
        rate_pointer: String,
        /// JSON pointer to an RFC 3339 timestamp.
        #[serde(default)]
        updated_at_pointer: Option<String>,
        #[serde(default = "default_http_source")]
        source: RateSource,
    },
    /// Manually configured rate.
    Fixed { rate: Decimal },
}

fn default_http_source() -> RateSource {
    RateSource::Official
}

/// Installment processor timings and terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentConfig {
    #[serde(default = "default_redirect_ms")]
    pub redirect_ms: u64,
    #[serde(default = "default_processing_ms")]
    pub processing_ms: u64,
    #[serde(default = "default_validating_ms")]
    pub validating_ms: u64,
    /// Delay between approval and automatic close.
    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
    /// Share of the total paid up front.
    #[serde(default = "default_initial_payment_ratio")]
    pub initial_payment_ratio: Decimal,
    #[serde(default)]
    pub interest_rate: Decimal,
    #[serde(default = "default_installments")]
    pub default_installments: u32,
    #[serde(default = "default_max_installments")]
    pub max_installments: u32,
}

fn default_redirect_ms() -> u64 {
    2_000
}

fn default_processing_ms() -> u64 {
    3_000
}

fn default_validating_ms() -> u64 {
    2_000
}

fn default_close_grace_ms() -> u64 {
    3_000
}

fn default_initial_payment_ratio() -> Decimal {
    dec!(0.40)
}

fn default_installments() -> u32 {
    3
}

fn default_max_installments() -> u32 {
    12
}

impl Default for InstallmentConfig {
    fn default() -> Self {
        Self {
            redirect_ms: default_redirect_ms(),
            processing_ms: default_processing_ms(),
            validating_ms: default_validating_ms(),
            close_grace_ms: default_close_grace_ms(),
            initial_payment_ratio: default_initial_payment_ratio(),
            interest_rate: Decimal::ZERO,
            default_installments: default_installments(),
            max_installments: default_max_installments(),
        }
    }
}

impl InstallmentConfig {
    /// Zero dwell times, for tests and non-interactive runs.
    pub fn immediate() -> Self {
        Self {
            redirect_ms: 0,
            processing_ms: 0,
            validating_ms: 0,
            close_grace_ms: 0,
            ..Self::default()
        }
    }
}

/// Order persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersConfig {
    /// Namespace for the orders key (`orders:<environment>`).
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "default".to_string()
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
        }
    }
}
