//! Quote gateway
//!
//! Composes the single-attempt fetcher with retry and the circuit breaker.
//! The breaker wraps the whole retrying call, so one exhausted lookup counts
//! as one transient outcome.

use async_trait::async_trait;
use callcost_core::config::QuoteApiConfig;
use callcost_core::models::Quote;
use callcost_core::traits::QuoteProvider;
use callcost_core::QuoteError;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::client::{HttpQuoteClient, QuoteFetcher};
use crate::retry::RetryPolicy;

/// Component name used in breaker logs and `CircuitOpen` errors
pub const COST_API_COMPONENT: &str = "cost_api";

/// Resilient `QuoteProvider` over a [`QuoteFetcher`]
pub struct QuoteGateway<F: QuoteFetcher> {
    fetcher: F,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl QuoteGateway<HttpQuoteClient> {
    /// Build the HTTP-backed gateway from configuration
    pub fn from_config(config: &QuoteApiConfig) -> Result<Self, QuoteError> {
        let client = HttpQuoteClient::from_config(config)?;
        let breaker = CircuitBreaker::from_config(COST_API_COMPONENT, &config.circuit_breaker);

        Ok(Self::new(
            client,
            RetryPolicy::from_config(&config.retry),
            Arc::new(breaker),
        ))
    }
}

impl<F: QuoteFetcher> QuoteGateway<F> {
    pub fn new(fetcher: F, retry: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            fetcher,
            retry,
            breaker,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

#[async_trait]
impl<F: QuoteFetcher> QuoteProvider for QuoteGateway<F> {
    #[instrument(skip(self))]
    async fn get_quote(&self, call_id: &str) -> Result<Quote, QuoteError> {
        let result = self
            .breaker
            .call(|| self.retry.retry(|| self.fetcher.fetch(call_id)))
            .await;

        match &result {
            Ok(quote) => debug!(cost = %quote.cost, currency = %quote.currency, "Quote obtained"),
            Err(err) => warn!(
                code = err.error_code(),
                transient = err.is_transient(),
                "Quote lookup failed: {}",
                err
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::BreakerSettings;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Replays scripted outcomes, then repeats the fallback
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<Quote, QuoteError>>>,
        fallback: Result<Quote, QuoteError>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<Quote, QuoteError>>, fallback: Result<Quote, QuoteError>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteFetcher for ScriptedFetcher {
        async fn fetch(&self, _call_id: &str) -> Result<Quote, QuoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn server_error() -> QuoteError {
        QuoteError::Server {
            status: 500,
            detail: "Algo explotó (internal_server_error)".to_string(),
        }
    }

    fn quote() -> Quote {
        Quote::new(dec!(4.2), "EUR")
    }

    fn retry(max_elapsed: Duration) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(400),
            multiplier: 2.0,
            max_elapsed,
        }
    }

    fn breaker(failure_threshold: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            COST_API_COMPONENT,
            BreakerSettings {
                failure_threshold,
                open_timeout: Duration::from_secs(30),
                half_open_max_calls: 1,
                success_threshold: 1,
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let fetcher = ScriptedFetcher::new(
            vec![Err(server_error()), Err(QuoteError::Timeout(2000))],
            Ok(quote()),
        );
        let gateway = QuoteGateway::new(fetcher, retry(Duration::from_secs(5)), breaker(5));

        let result = gateway.get_quote("c1").await.unwrap();
        assert_eq!(result, quote());
        assert_eq!(gateway.fetcher.calls(), 3);
        assert_eq!(gateway.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_passes_through() {
        let not_found = QuoteError::NotFound {
            detail: "call_not_found".to_string(),
        };
        let fetcher = ScriptedFetcher::new(vec![], Err(not_found.clone()));
        let gateway = QuoteGateway::new(fetcher, retry(Duration::from_secs(5)), breaker(1));

        let err = gateway.get_quote("c2").await.unwrap_err();
        assert_eq!(err, not_found);
        assert_eq!(gateway.fetcher.calls(), 1);
        assert_eq!(gateway.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_transient() {
        let fetcher = ScriptedFetcher::new(vec![], Err(server_error()));
        let gateway = QuoteGateway::new(fetcher, retry(Duration::from_secs(1)), breaker(5));

        let err = gateway.get_quote("c1").await.unwrap_err();
        assert!(err.is_transient());
        // Sleeps of 100, 200 and 400 fit in the budget
        assert!(matches!(err, QuoteError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(gateway.fetcher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_skips_dependency() {
        let fetcher = ScriptedFetcher::new(vec![], Err(server_error()));
        let gateway = QuoteGateway::new(fetcher, retry(Duration::ZERO), breaker(3));

        for _ in 0..3 {
            let err = gateway.get_quote("c1").await.unwrap_err();
            assert!(matches!(err, QuoteError::RetriesExhausted { attempts: 1, .. }));
        }
        assert_eq!(gateway.circuit_state(), CircuitState::Open);
        assert_eq!(gateway.fetcher.calls(), 3);

        let err = gateway.get_quote("c1").await.unwrap_err();
        assert!(matches!(err, QuoteError::CircuitOpen { .. }));
        assert!(err.is_transient());
        assert_eq!(gateway.fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_recovers_after_cool_down() {
        let fetcher = ScriptedFetcher::new(vec![Err(server_error())], Ok(quote()));
        let gateway = QuoteGateway::new(fetcher, retry(Duration::ZERO), breaker(1));

        assert!(gateway.get_quote("c1").await.is_err());
        assert_eq!(gateway.circuit_state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(gateway.get_quote("c1").await.unwrap(), quote());
        assert_eq!(gateway.circuit_state(), CircuitState::Closed);
    }
}
