//! Exchange-rate snapshots.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Currency, Money};
use crate::CommerceError;

/// Where a rate snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Central bank publication.
    Official,
    /// Market rate from an aggregator.
    Parallel,
    /// Manually configured.
    Configured,
    /// Built-in value used before any provider answered.
    Bootstrap,
    /// Previous snapshot kept after every provider failed.
    Fallback,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Official => "official",
            RateSource::Parallel => "parallel",
            RateSource::Configured => "configured",
            RateSource::Bootstrap => "bootstrap",
            RateSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable USD→VES rate snapshot.
///
/// `rate` is VES per 1 USD and is always positive; deserialization goes
/// through the same check as [`ExchangeRate::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExchangeRateRecord")]
pub struct ExchangeRate {
    rate: Decimal,
    last_updated_at: DateTime<Utc>,
    source: RateSource,
}

#[derive(Deserialize)]
struct ExchangeRateRecord {
    rate: Decimal,
    last_updated_at: DateTime<Utc>,
    source: RateSource,
}

impl TryFrom<ExchangeRateRecord> for ExchangeRate {
    type Error = CommerceError;

    fn try_from(record: ExchangeRateRecord) -> Result<Self, Self::Error> {
        ExchangeRate::new(record.rate, record.last_updated_at, record.source)
    }
}

impl ExchangeRate {
    pub fn new(
        rate: Decimal,
        last_updated_at: DateTime<Utc>,
        source: RateSource,
    ) -> Result<Self, CommerceError> {
        if rate <= Decimal::ZERO {
            return Err(CommerceError::InvalidRate(rate.to_string()));
        }
        Ok(Self {
            rate,
            last_updated_at,
            source,
        })
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    pub fn source(&self) -> RateSource {
        self.source
    }

    /// Same rate and timestamp under a different source tag.
    pub fn with_source(&self, source: RateSource) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }

    /// Older than `threshold` at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now.signed_duration_since(self.last_updated_at) > threshold
    }

    /// Convert `money` into `to`. Same-currency conversion is the identity.
    pub fn convert(&self, money: &Money, to: Currency) -> Result<Money, CommerceError> {
        if money.currency == to {
            return Ok(*money);
        }
        match to {
            Currency::VES => Ok(Money::new(money.scale(self.rate)?.amount, Currency::VES)),
            Currency::USD => Ok(Money::new(money.divide(self.rate)?.amount, Currency::USD)),
        }
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "1 USD = {} VES ({}, {})",
            self.rate,
            self.source,
            self.last_updated_at.to_rfc3339()
        )
    }
}
