//! Cart pricing calculations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::config::{FreeShippingPolicy, PricingConfig};
use crate::currency::ExchangeRate;
use crate::error::CommerceError;
use crate::money::{Currency, Money};

/// Subtotal, logistics, tax and total in one currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub logistics: Money,
    /// Always zero.
    pub tax: Money,
    pub total: Money,
}

impl PriceBreakdown {
    fn new(subtotal: Money, logistics: Money) -> Result<Self, CommerceError> {
        Ok(Self {
            subtotal,
            logistics,
            tax: Money::zero(subtotal.currency),
            total: subtotal.checked_add(&logistics)?,
        })
    }

    fn convert(&self, rate: &ExchangeRate, to: Currency) -> Result<Self, CommerceError> {
        Self::new(
            rate.convert(&self.subtotal, to)?,
            rate.convert(&self.logistics, to)?,
        )
    }
}

/// A priced cart. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedCart {
    /// Display currency.
    pub currency: Currency,
    /// Rate used for the display breakdown.
    pub rate: ExchangeRate,
    /// USD amounts, as recorded on orders.
    pub ledger: PriceBreakdown,
    /// Amounts in `currency`.
    pub display: PriceBreakdown,
    pub total_weight: u64,
    pub free_shipping: bool,
}

impl PricedCart {
    pub fn subtotal(&self) -> Money {
        self.display.subtotal
    }

    pub fn logistics(&self) -> Money {
        self.display.logistics
    }

    pub fn tax(&self) -> Money {
        self.display.tax
    }

    pub fn total(&self) -> Money {
        self.display.total
    }
}

/// Price `lines` for display in `currency`.
///
/// Logistics is `(base_fee + weight_rate × weight) × factor`, where the
/// factor drops to the bulk discount above the weight threshold, and is
/// waived once the subtotal reaches the free-shipping threshold. An empty
/// cart ships nothing and costs nothing.
pub fn price(
    lines: &[CartLine],
    currency: Currency,
    rate: &ExchangeRate,
    config: &PricingConfig,
) -> Result<PricedCart, CommerceError> {
    let subtotal = lines.iter().try_fold(Money::zero(Currency::USD), |acc, line| {
        acc.checked_add(&line.line_total()?)
    })?;
    let total_weight: u64 = lines.iter().map(|l| u64::from(l.quantity())).sum();

    let display_subtotal = rate.convert(&subtotal, currency)?;
    let free_shipping = !lines.is_empty()
        && match &config.free_shipping {
            FreeShippingPolicy::PerCurrency { .. } => {
                display_subtotal.amount
                    >= config.free_shipping.threshold_in(currency, rate.rate())
            }
            FreeShippingPolicy::ConvertedFromUsd { usd } => subtotal.amount >= *usd,
        };

    let logistics = if lines.is_empty() || free_shipping {
        Money::zero(Currency::USD)
    } else {
        logistics_fee(total_weight, config)?
    };

    let ledger = PriceBreakdown::new(subtotal, logistics)?;
    let display = ledger.convert(rate, currency)?;

    Ok(PricedCart {
        currency,
        rate: rate.clone(),
        ledger,
        display,
        total_weight,
        free_shipping,
    })
}

fn logistics_fee(total_weight: u64, config: &PricingConfig) -> Result<Money, CommerceError> {
    let factor = if total_weight > config.bulk_weight_threshold {
        config.bulk_discount_factor
    } else {
        Decimal::ONE
    };
    let fee = config
        .weight_rate
        .checked_mul(Decimal::from(total_weight))
        .and_then(|w| w.checked_add(config.base_fee))
        .and_then(|f| f.checked_mul(factor))
        .ok_or(CommerceError::Overflow("logistics fee"))?;
    Ok(Money::usd(fee))
}
