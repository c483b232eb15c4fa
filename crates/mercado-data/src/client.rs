//! HTTP fetch client with timeout and retry.

use serde::de::DeserializeOwned;

use crate::retry::RetryPolicy;
use crate::timeout::TimeoutConfig;

/// Error type for fetch operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl FetchError {
    /// Failures worth another attempt: timeouts, dropped connections,
    /// rate limiting and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Connection(_) => true,
            FetchError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::Deserialization(_) | FetchError::Request(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_connect() {
            FetchError::Connection(e.to_string())
        } else if e.is_decode() {
            FetchError::Deserialization(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Http {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Fetch policy combining timeout and retry configuration.
#[derive(Debug, Clone, Default)]
pub struct FetchPolicy {
    /// Timeout configuration.
    pub timeout: TimeoutConfig,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl FetchPolicy {
    /// Create a new fetch policy.
    pub fn new(timeout: TimeoutConfig, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }
}

/// Outbound JSON client.
///
/// Applies the policy's timeouts to every attempt and retries failures the
/// retry policy considers transient.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    policy: FetchPolicy,
}

impl FetchClient {
    /// Create a new fetch client.
    pub fn new(policy: FetchPolicy) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(policy.timeout.connect)
            .timeout(policy.timeout.total)
            .user_agent(concat!("mercado/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { http, policy })
    }

    /// The policy applied to every request.
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut attempt = 0;
        loop {
            match self.try_get_json(url).await {
                Ok(value) => return Ok(value),
                Err(e) if self.policy.retry.should_retry(&e, attempt) => {
                    let delay = self.policy.retry.backoff.delay_for_attempt(attempt);
                    tracing::debug!(url, attempt, ?delay, error = %e, "retrying fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let resp = self.http.get(url).send().await?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Deserialization(e.to_string()))
    }
}
