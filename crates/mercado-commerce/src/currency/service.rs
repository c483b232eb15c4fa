//! Currency service: owns the current rate snapshot.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::CurrencyConfig;
use crate::currency::provider::{providers_from_config, RateError, RateProvider};
use crate::currency::{ExchangeRate, RateSource};
use crate::money::{Currency, Money};
use crate::CommerceError;

/// Result of a refresh. The service never fails a refresh; a failed one
/// carries the reason in `error` and the retained snapshot in `rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub rate: ExchangeRate,
    pub error: Option<String>,
}

impl RefreshOutcome {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Latest-known USD→VES rate plus the provider chain that refreshes it.
///
/// Readers never wait on a refresh; they see the previous snapshot until a
/// new one is published. Concurrent `refresh` calls share one provider walk.
#[derive(Clone)]
pub struct CurrencyService {
    inner: Arc<Inner>,
}

struct Inner {
    providers: Vec<Arc<dyn RateProvider>>,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
    snapshot: watch::Sender<ExchangeRate>,
    last_error: Mutex<Option<String>>,
    in_flight: Mutex<Option<InFlight>>,
}

impl CurrencyService {
    pub fn new(
        initial: ExchangeRate,
        providers: Vec<Arc<dyn RateProvider>>,
        clock: Arc<dyn Clock>,
        stale_after: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                providers,
                clock,
                stale_after,
                snapshot,
                last_error: Mutex::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Build from configuration. Without a `seed`, starts from the configured
    /// bootstrap rate, which is stale from the start.
    pub fn from_config(
        config: &CurrencyConfig,
        clock: Arc<dyn Clock>,
        seed: Option<ExchangeRate>,
    ) -> Result<Self, RateError> {
        let initial = match seed {
            Some(rate) => rate,
            None => ExchangeRate::new(
                config.bootstrap_rate,
                DateTime::<Utc>::UNIX_EPOCH,
                RateSource::Bootstrap,
            )?,
        };
        let providers = providers_from_config(config, clock.clone())?;
        Ok(Self::new(initial, providers, clock, config.stale_after()))
    }

    /// Latest snapshot, possibly stale.
    pub fn get_rate(&self) -> ExchangeRate {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver notified whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<ExchangeRate> {
        self.inner.snapshot.subscribe()
    }

    /// Error from the most recent refresh, cleared by a successful one.
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stale_after(&self) -> Duration {
        self.inner.stale_after
    }

    pub fn is_stale(&self, snapshot: &ExchangeRate) -> bool {
        snapshot.is_stale_at(self.inner.clock.now(), self.inner.stale_after)
    }

    /// Walk the provider chain; the first valid quote becomes the snapshot.
    pub async fn refresh(&self) -> RefreshOutcome {
        let refresh = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight rate refresh");
                    pending.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let pending = async move {
                        let outcome = inner.walk_providers().await;
                        inner
                            .in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        refresh.await
    }

    /// Refresh only when the current snapshot is stale.
    pub async fn refresh_if_stale(&self) -> Option<RefreshOutcome> {
        if self.is_stale(&self.get_rate()) {
            Some(self.refresh().await)
        } else {
            None
        }
    }

    /// Convert using the current snapshot.
    pub fn convert(&self, money: &Money, to: Currency) -> Result<Money, CommerceError> {
        self.get_rate().convert(money, to)
    }

    /// Convert to `currency` and render for display.
    pub fn format(&self, money: &Money, currency: Currency) -> Result<String, CommerceError> {
        Ok(self.convert(money, currency)?.display())
    }
}

impl Inner {
    async fn walk_providers(&self) -> RefreshOutcome {
        let mut failures = Vec::new();
        if self.providers.is_empty() {
            failures.push(RateError::NoProviders.to_string());
        }

        for provider in &self.providers {
            match provider.fetch_rate().await {
                Ok(rate) => {
                    info!(
                        provider = provider.name(),
                        rate = %rate.rate(),
                        source = %rate.source(),
                        "exchange rate refreshed"
                    );
                    self.snapshot.send_replace(rate.clone());
                    *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
                    return RefreshOutcome { rate, error: None };
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "rate provider failed");
                    failures.push(format!("{}: {e}", provider.name()));
                }
            }
        }

        let error = failures.join("; ");
        let fallback = self.snapshot.borrow().with_source(RateSource::Fallback);
        warn!(
            rate = %fallback.rate(),
            error = %error,
            "no provider answered; keeping previous rate"
        );
        self.snapshot.send_replace(fallback.clone());
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
        RefreshOutcome {
            rate: fallback,
            error: Some(error),
        }
    }
}

impl fmt::Debug for CurrencyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrencyService")
            .field("rate", &*self.inner.snapshot.borrow())
            .field("providers", &self.inner.providers.len())
            .field("stale_after", &self.inner.stale_after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::currency::FixedRateProvider;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use mercado_data::FetchError;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing;

    #[async_trait]
    impl RateProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
            Err(RateError::Fetch(FetchError::Connection("refused".into())))
        }
    }

    struct Slow {
        calls: AtomicUsize,
        rate: Decimal,
        clock: Arc<dyn Clock>,
    }

    #[async_trait]
    impl RateProvider for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            Ok(ExchangeRate::new(self.rate, self.clock.now(), RateSource::Parallel)?)
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
        ))
    }

    fn seed(clock: &ManualClock) -> ExchangeRate {
        ExchangeRate::new(dec!(36), clock.now(), RateSource::Official).unwrap()
    }

    #[tokio::test]
    async fn test_first_valid_provider_wins() {
        let clock = clock();
        let service = CurrencyService::new(
            seed(&clock),
            vec![
                Arc::new(Failing),
                Arc::new(FixedRateProvider::new(dec!(40), clock.clone())),
            ],
            clock.clone(),
            Duration::hours(6),
        );

        let outcome = service.refresh().await;

        assert_eq!(outcome.error, None);
        assert_eq!(outcome.rate.rate(), dec!(40));
        assert_eq!(service.get_rate().source(), RateSource::Configured);
        assert_eq!(service.last_error(), None);
    }

    #[tokio::test]
    async fn test_total_failure_keeps_previous_rate_as_fallback() {
        let clock = clock();
        let service =
            CurrencyService::new(seed(&clock), vec![Arc::new(Failing)], clock.clone(), Duration::hours(6));

        let outcome = service.refresh().await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.rate.rate(), dec!(36));
        assert_eq!(outcome.rate.source(), RateSource::Fallback);
        assert_eq!(service.get_rate().source(), RateSource::Fallback);
        assert!(service.last_error().unwrap().contains("failing"));
    }

    #[tokio::test]
    async fn test_no_providers_is_a_fallback() {
        let clock = clock();
        let service = CurrencyService::new(seed(&clock), Vec::new(), clock.clone(), Duration::hours(6));
        let outcome = service.refresh().await;
        assert!(outcome.is_fallback());
        assert_eq!(outcome.rate.rate(), dec!(36));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_share_one_walk() {
        let clock = clock();
        let slow = Arc::new(Slow {
            calls: AtomicUsize::new(0),
            rate: dec!(41.5),
            clock: clock.clone(),
        });
        let service = CurrencyService::new(seed(&clock), vec![slow.clone()], clock.clone(), Duration::hours(6));

        let (a, b) = tokio::join!(service.refresh(), service.refresh());

        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
        assert_eq!(a.rate.rate(), dec!(41.5));

        // A later refresh starts a new walk.
        service.refresh().await;
        assert_eq!(slow.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readers_see_previous_snapshot_during_refresh() {
        let clock = clock();
        let slow = Arc::new(Slow {
            calls: AtomicUsize::new(0),
            rate: dec!(50),
            clock: clock.clone(),
        });
        let service = CurrencyService::new(seed(&clock), vec![slow], clock.clone(), Duration::hours(6));
        let mut updates = service.subscribe();

        let background = service.clone();
        let handle = tokio::spawn(async move { background.refresh().await });
        tokio::task::yield_now().await;

        assert_eq!(service.get_rate().rate(), dec!(36));

        handle.await.unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().rate(), dec!(50));
        assert_eq!(service.get_rate().rate(), dec!(50));
    }

    #[tokio::test]
    async fn test_refresh_if_stale() {
        let clock = clock();
        let service = CurrencyService::new(
            seed(&clock),
            vec![Arc::new(FixedRateProvider::new(dec!(39), clock.clone()))],
            clock.clone(),
            Duration::hours(6),
        );

        assert!(service.refresh_if_stale().await.is_none());
        assert_eq!(service.get_rate().rate(), dec!(36));

        clock.advance(Duration::hours(7));
        assert!(service.is_stale(&service.get_rate()));

        let outcome = service.refresh_if_stale().await.unwrap();
        assert_eq!(outcome.rate.rate(), dec!(39));
        assert!(!service.is_stale(&service.get_rate()));
    }

    #[test]
    fn test_bootstrap_rate_starts_stale() {
        let clock = clock();
        let service = CurrencyService::from_config(&CurrencyConfig::default(), clock, None).unwrap();
        let rate = service.get_rate();
        assert_eq!(rate.source(), RateSource::Bootstrap);
        assert!(service.is_stale(&rate));
    }

    #[test]
    fn test_format_converts_first() {
        let clock = clock();
        let service = CurrencyService::new(seed(&clock), Vec::new(), clock.clone(), Duration::hours(6));
        let text = service.format(&Money::usd(dec!(2.5)), Currency::VES).unwrap();
        assert_eq!(text, "Bs. 90.00");
    }
}
