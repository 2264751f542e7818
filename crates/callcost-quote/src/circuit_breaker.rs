//! # Circuit Breaker
//!
//! Fault isolation around the cost API. Three states: Closed (normal
//! operation), Open (failing fast) and Half-Open (admitting a bounded number
//! of trial calls).
//!
//! Only transient outcomes count as failures. A permanent failure means the
//! dependency answered, so it resets the count like a success does.

use callcost_core::config::CircuitBreakerConfig;
use callcost_core::QuoteError;
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - limited calls allowed to test system health
    HalfOpen,
}

/// Breaker thresholds with durations resolved
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub half_open_max_calls: u32,
    pub success_threshold: u32,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            open_timeout: Duration::from_millis(config.open_timeout_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
            success_threshold: config.success_threshold.max(1),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            circuit: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_in_flight: 0,
            half_open_successes: 0,
        }
    }
}

/// How a call was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Frees a half-open trial slot if the call is dropped before it completes
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.breaker.state.lock();
            if state.circuit == CircuitState::HalfOpen {
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
            }
        }
    }
}

/// Circuit breaker with all state behind one mutex
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging
    name: String,
    settings: BreakerSettings,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = settings.failure_threshold,
            open_timeout_ms = settings.open_timeout.as_millis() as u64,
            half_open_max_calls = settings.half_open_max_calls,
            success_threshold = settings.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            settings,
            state: Mutex::new(BreakerState::closed()),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self::new(name, BreakerSettings::from(config))
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.state.lock().circuit
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// Returns [`QuoteError::CircuitOpen`] without running `operation` while
    /// the circuit is open or the half-open trial slots are taken.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, QuoteError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QuoteError>>,
    {
        let admission = self.admit()?;
        let mut slot = TrialSlot {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let result = operation().await;

        slot.armed = false;
        match &result {
            Err(err) if err.is_transient() => self.record_failure(admission),
            _ => self.record_success(admission),
        }

        result
    }

    fn open_error(&self) -> QuoteError {
        QuoteError::CircuitOpen {
            component: self.name.clone(),
        }
    }

    /// Decide whether a call may proceed, moving Open to Half-Open when the cool-down is over
    fn admit(&self) -> Result<Admission, QuoteError> {
        let mut state = self.state.lock();

        match state.circuit {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let cooled_down = state
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.settings.open_timeout)
                    .unwrap_or(true);

                if !cooled_down {
                    debug!(component = %self.name, "Circuit open, failing fast");
                    return Err(self.open_error());
                }

                state.circuit = CircuitState::HalfOpen;
                state.half_open_in_flight = 1;
                state.half_open_successes = 0;
                info!(component = %self.name, "Circuit breaker half-open (testing recovery)");
                Ok(Admission::Trial)
            }
            CircuitState::HalfOpen => {
                if state.half_open_in_flight >= self.settings.half_open_max_calls {
                    debug!(component = %self.name, "Half-open trial slots taken, failing fast");
                    return Err(self.open_error());
                }
                state.half_open_in_flight += 1;
                Ok(Admission::Trial)
            }
        }
    }

    fn record_success(&self, admission: Admission) {
        let mut state = self.state.lock();

        match (state.circuit, admission) {
            (CircuitState::HalfOpen, Admission::Trial) => {
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
                state.half_open_successes += 1;
                if state.half_open_successes >= self.settings.success_threshold {
                    *state = BreakerState::closed();
                    info!(component = %self.name, "Circuit breaker closed (recovered)");
                }
            }
            (CircuitState::Closed, _) => {
                state.consecutive_failures = 0;
            }
            _ => {
                // A call admitted before the circuit tripped finished late
                debug!(component = %self.name, "Late success ignored while not closed");
            }
        }
    }

    fn record_failure(&self, admission: Admission) {
        let mut state = self.state.lock();

        match (state.circuit, admission) {
            (CircuitState::Closed, _) => {
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.settings.failure_threshold {
                    self.trip(&mut state);
                }
            }
            (CircuitState::HalfOpen, Admission::Trial) => {
                warn!(component = %self.name, "Trial call failed");
                self.trip(&mut state);
            }
            _ => {}
        }
    }

    fn trip(&self, state: &mut BreakerState) {
        state.circuit = CircuitState::Open;
        state.opened_at = Some(Instant::now());
        state.half_open_in_flight = 0;
        state.half_open_successes = 0;

        error!(
            component = %self.name,
            consecutive_failures = state.consecutive_failures,
            failure_threshold = self.settings.failure_threshold,
            open_timeout_ms = self.settings.open_timeout.as_millis() as u64,
            "Circuit breaker opened (failing fast)"
        );
    }
}
