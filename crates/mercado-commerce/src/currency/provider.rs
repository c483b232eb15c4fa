//! Exchange-rate provider port and its implementations.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercado_data::{FetchClient, FetchError, FetchPolicy, RetryPolicy, TimeoutConfig};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::clock::Clock;
use crate::config::{CurrencyConfig, ProviderConfig};
use crate::currency::{ExchangeRate, RateSource};
use crate::CommerceError;

/// Error type for rate providers.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Field {0} missing from rate document")]
    MissingField(String),

    #[error("Field {field} is not a valid {expected}: {value}")]
    InvalidField {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("Rejected quote: {0}")]
    Rejected(#[from] CommerceError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("No rate providers configured")]
    NoProviders,
}

/// Port for anything that can quote a USD→VES rate.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch a fresh quote.
    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError>;
}

/// Always returns the configured rate, stamped with the current time.
#[derive(Debug)]
pub struct FixedRateProvider {
    rate: Decimal,
    clock: Arc<dyn Clock>,
}

impl FixedRateProvider {
    pub fn new(rate: Decimal, clock: Arc<dyn Clock>) -> Self {
        Self { rate, clock }
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        Ok(ExchangeRate::new(
            self.rate,
            self.clock.now(),
            RateSource::Configured,
        )?)
    }
}

/// Reads the rate out of a JSON document served over HTTP.
#[derive(Debug)]
pub struct HttpRateProvider {
    name: String,
    url: String,
    extractor: RateExtractor,
    client: FetchClient,
    clock: Arc<dyn Clock>,
}

impl HttpRateProvider {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        extractor: RateExtractor,
        client: FetchClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            extractor,
            client,
            clock,
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        let document: Value = self.client.get_json(&self.url).await?;
        self.extractor.extract(&document, self.clock.now())
    }
}

/// Where to find the rate and its timestamp in a provider's document.
#[derive(Debug, Clone)]
pub struct RateExtractor {
    /// JSON pointer to the rate (number or numeric string).
    pub rate_pointer: String,
    /// JSON pointer to an RFC 3339 timestamp; `now` is used when absent.
    pub updated_at_pointer: Option<String>,
    pub source: RateSource,
}

impl RateExtractor {
    pub fn extract(&self, document: &Value, now: DateTime<Utc>) -> Result<ExchangeRate, RateError> {
        let raw = document
            .pointer(&self.rate_pointer)
            .ok_or_else(|| RateError::MissingField(self.rate_pointer.clone()))?;
        let rate = match raw {
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
        .ok_or_else(|| RateError::InvalidField {
            field: self.rate_pointer.clone(),
            expected: "decimal",
            value: raw.to_string(),
        })?;

        let updated_at = match &self.updated_at_pointer {
            Some(pointer) => {
                let raw = document
                    .pointer(pointer)
                    .ok_or_else(|| RateError::MissingField(pointer.clone()))?;
                raw.as_str()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .ok_or_else(|| RateError::InvalidField {
                        field: pointer.clone(),
                        expected: "RFC 3339 timestamp",
                        value: raw.to_string(),
                    })?
            }
            None => now,
        };

        Ok(ExchangeRate::new(rate, updated_at, self.source)?)
    }
}

/// Build the provider chain in declaration order.
pub fn providers_from_config(
    config: &CurrencyConfig,
    clock: Arc<dyn Clock>,
) -> Result<Vec<Arc<dyn RateProvider>>, RateError> {
    let policy = FetchPolicy::new(
        TimeoutConfig::from_total(config.fetch_timeout()),
        RetryPolicy::new(config.fetch_retries),
    );
    let mut client: Option<FetchClient> = None;
    let mut providers: Vec<Arc<dyn RateProvider>> = Vec::with_capacity(config.providers.len());

    for entry in &config.providers {
        match entry {
            ProviderConfig::Fixed { rate } => {
                providers.push(Arc::new(FixedRateProvider::new(*rate, clock.clone())));
            }
            ProviderConfig::Http {
                name,
                url,
                rate_pointer,
                updated_at_pointer,
                source,
            } => {
                let client = match &client {
                    Some(c) => c.clone(),
                    None => {
                        let c = FetchClient::new(policy.clone())?;
                        client = Some(c.clone());
                        c
                    }
                };
                let extractor = RateExtractor {
                    rate_pointer: rate_pointer.clone(),
                    updated_at_pointer: updated_at_pointer.clone(),
                    source: *source,
                };
                providers.push(Arc::new(HttpRateProvider::new(
                    name.clone(),
                    url.clone(),
                    extractor,
                    client,
                    clock.clone(),
                )));
            }
        }
    }

    Ok(providers)
}
