//! Currency-tagged decimal amounts.
//!
//! Amounts are exact decimals tagged with their currency. Arithmetic keeps
//! full precision; rounding to cents only happens when a value is shown.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CommerceError;

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    /// US dollar, the ledger currency.
    #[default]
    USD,
    /// Venezuelan bolívar, display only.
    VES,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::VES => "VES",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::VES => "Bs.",
        }
    }

    /// Number of decimal places shown for this currency.
    pub fn decimal_places(&self) -> u32 {
        2
    }

    /// Accepts ISO codes case-insensitively, plus the local "BS".
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "USD" => Some(Currency::USD),
            "VES" | "BS" => Some(Currency::VES),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_code(s)
            .ok_or_else(|| CommerceError::ValidationError(format!("unknown currency: {s}")))
    }
}

/// An exact decimal amount in one currency. Arithmetic across currencies
/// is an error, never an implicit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    /// Exact amount in whole currency units.
    pub amount: Decimal,
    /// The currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money value.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Shorthand for a USD amount.
    pub fn usd(amount: Decimal) -> Self {
        Self::new(amount, Currency::USD)
    }

    /// Shorthand for a VES amount.
    pub fn ves(amount: Decimal) -> Self {
        Self::new(amount, Currency::VES)
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Add another Money value of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, CommerceError> {
        self.ensure_same_currency(other)?;
        self.amount
            .checked_add(other.amount)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or(CommerceError::Overflow("money addition"))
    }

    /// Subtract another Money value of the same currency.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, CommerceError> {
        self.ensure_same_currency(other)?;
        self.amount
            .checked_sub(other.amount)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or(CommerceError::Overflow("money subtraction"))
    }

    /// Multiply by a whole quantity.
    pub fn times(&self, quantity: u32) -> Result<Money, CommerceError> {
        self.scale(Decimal::from(quantity))
    }

    /// Multiply by a decimal factor.
    pub fn scale(&self, factor: Decimal) -> Result<Money, CommerceError> {
        self.amount
            .checked_mul(factor)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or(CommerceError::Overflow("money multiplication"))
    }

    /// Divide by a decimal divisor.
    pub fn divide(&self, divisor: Decimal) -> Result<Money, CommerceError> {
        self.amount
            .checked_div(divisor)
            .map(|amount| Money::new(amount, self.currency))
            .ok_or(CommerceError::Overflow("money division"))
    }

    /// Round to the currency's display precision, midpoint away from zero.
    pub fn rounded(&self) -> Money {
        Money::new(
            self.amount.round_dp_with_strategy(
                self.currency.decimal_places(),
                RoundingStrategy::MidpointAwayFromZero,
            ),
            self.currency,
        )
    }

    /// Format as a display string (e.g., "$49.99", "Bs. 1825.00").
    pub fn display(&self) -> String {
        let places = self.currency.decimal_places() as usize;
        let amount = self.rounded().amount;
        match self.currency {
            Currency::USD => format!("{}{:.places$}", self.currency.symbol(), amount),
            Currency::VES => format!("{} {:.places$}", self.currency.symbol(), amount),
        }
    }

    /// Format without symbol (e.g., "49.99").
    pub fn display_amount(&self) -> String {
        let places = self.currency.decimal_places() as usize;
        format!("{:.places$}", self.rounded().amount)
    }

    /// Sum Money values, all of which must be in `currency`.
    pub fn sum<'a>(
        iter: impl IntoIterator<Item = &'a Money>,
        currency: Currency,
    ) -> Result<Money, CommerceError> {
        iter.into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), CommerceError> {
        if self.currency != other.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                got: other.currency.code().to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}
