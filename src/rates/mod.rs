//! Currency-rate resolution
//!
//! Resolves a rate snapshot for a (base currency, date) pair against an
//! ordered list of providers, each attempt bounded by a short timeout.
//! Exhausting every provider degrades to a zero-filled snapshot instead of
//! failing: the calling flow must still be able to commit a record with the
//! amount recorded verbatim in its original currency.

pub mod providers;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::RateSnapshot;
use crate::Result;

pub use providers::{FreeCurrencyApiProvider, JsDelivrProvider};

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// A single external rate source. Any error (network, parse, missing key)
/// makes the resolver fall through to the next provider.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, base_currency: &str, on_date: NaiveDate) -> Result<RateSnapshot>;
}

/// Ordered-fallback rate resolver. Adding a provider is a one-line change
/// to the construction site.
pub struct RateResolver {
    providers: Vec<Box<dyn RateProvider>>,
    attempt_timeout: Duration,
}

impl RateResolver {
    pub fn new(providers: Vec<Box<dyn RateProvider>>) -> Self {
        Self {
            providers,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    /// Resolver wired with the production provider order: the jsDelivr
    /// currency CDN first, freecurrencyapi.com second.
    pub fn with_default_providers() -> Self {
        Self::new(vec![
            Box::new(JsDelivrProvider::new()),
            Box::new(FreeCurrencyApiProvider::from_env()),
        ])
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Resolve a snapshot for `base_currency` on `on_date`. Requests for a
    /// future date are clamped to `today` before lookup. Never errors.
    pub async fn resolve(
        &self,
        base_currency: &str,
        on_date: NaiveDate,
        today: NaiveDate,
    ) -> RateSnapshot {
        let lookup_date = if on_date > today { today } else { on_date };

        for provider in &self.providers {
            let attempt =
                tokio::time::timeout(self.attempt_timeout, provider.fetch(base_currency, lookup_date));
            match attempt.await {
                Ok(Ok(snapshot)) => {
                    debug!(
                        provider = provider.name(),
                        base = base_currency,
                        date = %lookup_date,
                        "Rate snapshot resolved"
                    );
                    return snapshot;
                }
                Ok(Err(e)) => {
                    warn!(
                        provider = provider.name(),
                        base = base_currency,
                        date = %lookup_date,
                        "Rate provider failed, falling through: {}",
                        e
                    );
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        base = base_currency,
                        date = %lookup_date,
                        "Rate provider timed out after {:?}, falling through",
                        self.attempt_timeout
                    );
                }
            }
        }

        warn!(
            base = base_currency,
            date = %lookup_date,
            "All rate providers exhausted, degrading to zero-filled snapshot"
        );
        RateSnapshot::zero_filled(base_currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExpenseError;
    use crate::models::SUPPORTED_CURRENCIES;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FailingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RateProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, _base: &str, _on_date: NaiveDate) -> Result<RateSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ExpenseError::RateProvider("connection refused".to_string()))
        }
    }

    struct FixedProvider {
        rate: f64,
        seen_dates: Arc<std::sync::Mutex<Vec<NaiveDate>>>,
    }

    #[async_trait]
    impl RateProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self, base: &str, on_date: NaiveDate) -> Result<RateSnapshot> {
            self.seen_dates.lock().unwrap().push(on_date);
            let mut rates = HashMap::new();
            rates.insert("EUR".to_string(), self.rate);
            Ok(RateSnapshot {
                base: base.to_string(),
                rates,
            })
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl RateProvider for HangingProvider {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn fetch(&self, _base: &str, _on_date: NaiveDate) -> Result<RateSnapshot> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let resolver = RateResolver::new(vec![
            Box::new(FixedProvider {
                rate: 0.9,
                seen_dates: seen.clone(),
            }),
            Box::new(FixedProvider {
                rate: 0.5,
                seen_dates: Arc::new(std::sync::Mutex::new(Vec::new())),
            }),
        ]);

        let snapshot = resolver.resolve("USD", today(), today()).await;
        assert_eq!(snapshot.rates.get("EUR"), Some(&0.9));
    }

    #[tokio::test]
    async fn test_fallback_to_second_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = RateResolver::new(vec![
            Box::new(FailingProvider { calls: calls.clone() }),
            Box::new(FixedProvider {
                rate: 0.5,
                seen_dates: Arc::new(std::sync::Mutex::new(Vec::new())),
            }),
        ]);

        let snapshot = resolver.resolve("USD", today(), today()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.rates.get("EUR"), Some(&0.5));
    }

    #[tokio::test]
    async fn test_all_providers_fail_degrades_to_zero() {
        let resolver = RateResolver::new(vec![
            Box::new(FailingProvider {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FailingProvider {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        ]);

        let snapshot = resolver.resolve("EUR", today(), today()).await;
        assert_eq!(snapshot.base, "EUR");
        for c in SUPPORTED_CURRENCIES {
            assert_eq!(snapshot.rates.get(*c), Some(&0.0));
        }
    }

    #[tokio::test]
    async fn test_no_providers_degrades_to_zero() {
        let resolver = RateResolver::new(vec![]);
        let snapshot = resolver.resolve("USD", today(), today()).await;
        assert!(snapshot.is_degraded());
    }

    #[tokio::test]
    async fn test_future_date_clamped_to_today() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let resolver = RateResolver::new(vec![Box::new(FixedProvider {
            rate: 1.0,
            seen_dates: seen.clone(),
        })]);

        let future = today() + chrono::Duration::days(30);
        resolver.resolve("USD", future, today()).await;
        assert_eq!(seen.lock().unwrap().as_slice(), &[today()]);
    }

    #[tokio::test]
    async fn test_hung_provider_times_out_and_falls_through() {
        let resolver = RateResolver::new(vec![
            Box::new(HangingProvider),
            Box::new(FixedProvider {
                rate: 0.7,
                seen_dates: Arc::new(std::sync::Mutex::new(Vec::new())),
            }),
        ])
        .with_attempt_timeout(Duration::from_millis(20));

        let snapshot = resolver.resolve("USD", today(), today()).await;
        assert_eq!(snapshot.rates.get("EUR"), Some(&0.7));
    }
}
