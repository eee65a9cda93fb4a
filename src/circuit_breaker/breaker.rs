//! Circuit breaker implementation.

use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{
    Admission, BreakerMetrics, BreakerSnapshot, BreakerState, BreakerTransition,
};
use crate::core::RecoveryError;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;

/// A per-dependency circuit breaker.
///
/// The circuit breaker monitors failures and prevents cascading failures
/// by temporarily rejecting calls to unhealthy dependencies. It does not
/// run anything itself: callers ask for admission with
/// [`try_acquire`](Self::try_acquire), perform the call, and report the
/// result through the returned [`CallPermit`].
///
/// # States
///
/// - **Closed**: Normal operation. Calls pass through, consecutive failures are counted.
/// - **Open**: Dependency is failing. Calls are rejected without being attempted
///   until the open timeout elapses.
/// - **Half-Open**: Probing. A limited number of calls are let through to
///   test if the dependency has recovered.
///
/// # Example
///
/// ```rust
/// use queuebridge::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
///
/// let breaker = CircuitBreaker::new("telemetry_sink", CircuitBreakerConfig::default());
///
/// let call = breaker.try_acquire().expect("closed circuits admit calls");
/// call.record_success();
/// assert!(breaker.state().is_closed());
/// ```
pub struct CircuitBreaker {
    /// Name of the guarded dependency.
    name: String,
    /// Current state of the circuit.
    state: RwLock<BreakerState>,
    /// Configuration.
    config: CircuitBreakerConfig,
    /// Metrics.
    metrics: RwLock<BreakerMetrics>,
    /// Bumped each time the circuit enters half-open.
    probe_window: AtomicU64,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given configuration.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(BreakerState::closed()),
            config,
            metrics: RwLock::new(BreakerMetrics::new()),
            probe_window: AtomicU64::new(0),
        }
    }

    /// Creates a new circuit breaker with default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Returns the name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state of the circuit breaker.
    pub fn state(&self) -> BreakerState {
        self.read_state().clone()
    }

    /// Returns a serializable snapshot of the current state.
    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot::of(&self.read_state())
    }

    /// Returns a copy of the current metrics.
    pub fn metrics(&self) -> BreakerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Forces the circuit into the open state.
    pub fn force_open(&self) {
        *self.write_state() = BreakerState::open_for(self.config.open_timeout);
        self.write_metrics().record_opened();
    }

    /// Forces the circuit into the closed state.
    pub fn force_close(&self) {
        *self.write_state() = BreakerState::closed();
        self.write_metrics().record_closed();
    }

    /// Resets the circuit breaker state and metrics.
    pub fn reset(&self) {
        *self.write_state() = BreakerState::closed();
        *self.write_metrics() = BreakerMetrics::new();
    }

    /// Fails without side effects on the circuit when a call would be
    /// rejected right now. The rejection is counted.
    ///
    /// Callers that have to wait before calling use this to turn away early;
    /// [`try_acquire`](Self::try_acquire) still decides admission.
    pub fn check(&self) -> Result<(), RecoveryError> {
        let rejection = match &*self.read_state() {
            BreakerState::Closed { .. } => return Ok(()),
            BreakerState::Open { until, .. } => {
                let now = Instant::now();
                if now >= *until {
                    return Ok(());
                }
                Some(*until - now)
            }
            BreakerState::HalfOpen { in_flight, .. } => {
                if *in_flight < self.config.half_open_max_probes {
                    return Ok(());
                }
                None
            }
        };
        Err(self.reject(rejection))
    }

    /// Asks whether a call may be attempted now.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open and the
    /// call is admitted as a probe. Rejections are counted in the metrics.
    /// Dropping the returned permit without recording an outcome gives its
    /// probe slot back.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, RecoveryError> {
        let mut state = self.write_state();
        let now = Instant::now();

        let rejection = match &*state {
            BreakerState::Closed { .. } => return Ok(self.permit(Admission::Normal)),

            BreakerState::Open { until, .. } => {
                if now >= *until {
                    *state = BreakerState::HalfOpen {
                        consecutive_successes: 0,
                        in_flight: 1,
                    };
                    self.probe_window.fetch_add(1, Ordering::SeqCst);
                    return Ok(self.permit(Admission::Probe));
                }
                Some(*until - now)
            }

            BreakerState::HalfOpen {
                consecutive_successes,
                in_flight,
            } => {
                if *in_flight < self.config.half_open_max_probes {
                    *state = BreakerState::HalfOpen {
                        consecutive_successes: *consecutive_successes,
                        in_flight: in_flight + 1,
                    };
                    return Ok(self.permit(Admission::Probe));
                }
                None
            }
        };

        drop(state);
        Err(self.reject(rejection))
    }

    fn permit(&self, admission: Admission) -> CallPermit<'_> {
        CallPermit {
            breaker: self,
            admission,
            window: self.probe_window.load(Ordering::SeqCst),
            settled: false,
        }
    }

    fn reject(&self, retry_in: Option<std::time::Duration>) -> RecoveryError {
        self.write_metrics().record_rejected();
        RecoveryError::circuit_open(self.name.clone(), retry_in)
    }

    /// Whether a probe admitted in `window` belongs to the current
    /// half-open period. Must be called with the state lock held.
    fn current_probe(&self, admission: Admission, window: u64) -> bool {
        admission == Admission::Probe && self.probe_window.load(Ordering::SeqCst) == window
    }

    fn release(&self, admission: Admission, window: u64) {
        let mut state = self.write_state();
        if !self.current_probe(admission, window) {
            return;
        }
        if let BreakerState::HalfOpen {
            consecutive_successes,
            in_flight,
        } = &*state
        {
            *state = BreakerState::HalfOpen {
                consecutive_successes: *consecutive_successes,
                in_flight: in_flight.saturating_sub(1),
            };
        }
    }

    /// Only probes of the current half-open period count toward closing it.
    fn on_success(&self, admission: Admission, window: u64) -> Option<BreakerTransition> {
        let mut state = self.write_state();
        self.write_metrics().record_success();

        match &*state {
            BreakerState::Closed { .. } => {
                *state = BreakerState::closed();
                None
            }

            BreakerState::HalfOpen {
                consecutive_successes,
                in_flight,
            } => {
                if !self.current_probe(admission, window) {
                    return None;
                }
                let successes = consecutive_successes + 1;
                if successes >= self.config.success_threshold {
                    *state = BreakerState::closed();
                    self.write_metrics().record_closed();
                    Some(BreakerTransition::Closed)
                } else {
                    *state = BreakerState::HalfOpen {
                        consecutive_successes: successes,
                        in_flight: in_flight.saturating_sub(1),
                    };
                    None
                }
            }

            // A call admitted before the circuit opened; it proves nothing.
            BreakerState::Open { .. } => None,
        }
    }

    fn on_failure(&self) -> Option<BreakerTransition> {
        let mut state = self.write_state();
        self.write_metrics().record_failure();

        match &*state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    *state = BreakerState::open_for(self.config.open_timeout);
                    self.write_metrics().record_opened();
                    Some(BreakerTransition::Opened)
                } else {
                    *state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                    None
                }
            }

            BreakerState::HalfOpen { .. } => {
                *state = BreakerState::open_for(self.config.open_timeout);
                self.write_metrics().record_opened();
                Some(BreakerTransition::Opened)
            }

            // Already open; the window is not extended.
            BreakerState::Open { .. } => None,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, BreakerState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, BreakerState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, BreakerMetrics> {
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Permission for one call through a [`CircuitBreaker`].
///
/// Recording an outcome consumes the permit. A permit dropped unrecorded,
/// for instance when the calling future is cancelled, frees its probe slot.
#[must_use = "an unrecorded permit proves nothing about the dependency"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    window: u64,
    settled: bool,
}

impl CallPermit<'_> {
    /// How the call was let through.
    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Records that the call succeeded.
    pub fn record_success(mut self) -> Option<BreakerTransition> {
        self.settled = true;
        self.breaker.on_success(self.admission, self.window)
    }

    /// Records that the call failed or timed out.
    pub fn record_failure(mut self) -> Option<BreakerTransition> {
        self.settled = true;
        self.breaker.on_failure()
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.admission, self.window);
        }
    }
}

impl fmt::Debug for CallPermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.name)
            .field("admission", &self.admission)
            .field("settled", &self.settled)
            .finish()
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &*self.read_state())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::state::CircuitState;
    use std::time::Duration;

    fn fail(breaker: &CircuitBreaker) -> Option<BreakerTransition> {
        breaker.try_acquire().unwrap().record_failure()
    }

    fn succeed(breaker: &CircuitBreaker) -> Option<BreakerTransition> {
        breaker.try_acquire().unwrap().record_success()
    }

    #[test]
    fn test_closed_passes_through() {
        let breaker = CircuitBreaker::with_defaults("sink");
        assert_eq!(breaker.try_acquire().unwrap().admission(), Admission::Normal);
        assert_eq!(succeed(&breaker), None);
        assert!(breaker.state().is_closed());
    }

    #[test]
    fn test_opens_at_exact_threshold() {
        let config = CircuitBreakerConfig::default().with_failure_threshold(3);
        let breaker = CircuitBreaker::new("sink", config);

        assert_eq!(fail(&breaker), None);
        assert_eq!(fail(&breaker), None);
        assert_eq!(breaker.state().consecutive_failures(), Some(2));
        assert_eq!(fail(&breaker), Some(BreakerTransition::Opened));

        assert!(breaker.state().is_open());
        assert_eq!(breaker.metrics().times_opened, 1);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let config = CircuitBreakerConfig::default().with_failure_threshold(3);
        let breaker = CircuitBreaker::new("sink", config);

        fail(&breaker);
        fail(&breaker);
        succeed(&breaker);
        fail(&breaker);
        fail(&breaker);

        assert!(breaker.state().is_closed());
    }

    #[test]
    fn test_rejects_when_open() {
        let breaker = CircuitBreaker::with_defaults("sink");
        breaker.force_open();

        let result = breaker.try_acquire();
        assert!(matches!(result, Err(RecoveryError::CircuitOpen { .. })));
        assert_eq!(breaker.metrics().rejected_requests, 1);
    }

    #[test]
    fn test_failure_while_open_keeps_opened_at() {
        let config = CircuitBreakerConfig::default().with_failure_threshold(1);
        let breaker = CircuitBreaker::new("sink", config);

        fail(&breaker);
        let opened_at = breaker.state().opened_at().unwrap();

        // A late failure from a call admitted before the circuit opened.
        assert_eq!(breaker.on_failure(), None);
        assert_eq!(breaker.state().opened_at(), Some(opened_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_timeout() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_open_timeout(Duration::from_millis(1000));
        let breaker = CircuitBreaker::new("sink", config);

        fail(&breaker);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(breaker.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        let probe = breaker.try_acquire().unwrap();
        assert_eq!(probe.admission(), Admission::Probe);
        assert!(breaker.state().is_half_open());

        // Only one probe in flight by default.
        assert!(breaker.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_and_resets_window() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_open_timeout(Duration::from_millis(1000));
        let breaker = CircuitBreaker::new("sink", config);

        fail(&breaker);
        let first_opened = breaker.state().opened_at().unwrap();

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(fail(&breaker), Some(BreakerTransition::Opened));

        let reopened = breaker.state().opened_at().unwrap();
        assert!(reopened > first_opened);
        assert_eq!(breaker.snapshot().state, CircuitState::Open);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(breaker.try_acquire().is_err());
    }

    #[test]
    fn test_dropped_permit_returns_probe_slot() {
        let breaker = CircuitBreaker::with_defaults("sink");
        *breaker.write_state() = BreakerState::HalfOpen {
            consecutive_successes: 0,
            in_flight: 0,
        };

        let probe = breaker.try_acquire().unwrap();
        assert!(breaker.try_acquire().is_err());
        assert!(breaker.check().is_err());

        drop(probe);
        assert_eq!(
            breaker.state(),
            BreakerState::HalfOpen {
                consecutive_successes: 0,
                in_flight: 0,
            }
        );
        assert!(breaker.check().is_ok());
        assert_eq!(breaker.try_acquire().unwrap().record_success(), None);
        assert_eq!(
            breaker.state(),
            BreakerState::HalfOpen {
                consecutive_successes: 1,
                in_flight: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_probe_does_not_touch_next_half_open_period() {
        let config = CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_half_open_max_probes(2)
            .with_open_timeout(Duration::from_millis(100));
        let breaker = CircuitBreaker::new("sink", config);
        fail(&breaker);

        tokio::time::advance(Duration::from_millis(100)).await;
        let stale = breaker.try_acquire().unwrap();
        assert_eq!(fail(&breaker), Some(BreakerTransition::Opened));

        tokio::time::advance(Duration::from_millis(100)).await;
        let fresh = breaker.try_acquire().unwrap();
        assert_eq!(stale.record_success(), None);
        drop(fresh);

        assert_eq!(
            breaker.state(),
            BreakerState::HalfOpen {
                consecutive_successes: 0,
                in_flight: 0,
            }
        );
    }

    #[test]
    fn test_check_counts_rejection_without_transition() {
        let breaker = CircuitBreaker::with_defaults("sink");
        assert!(breaker.check().is_ok());

        breaker.force_open();
        let err = breaker.check().unwrap_err();
        assert!(err.is_circuit_open());
        assert!(breaker.state().is_open());
        assert_eq!(breaker.metrics().rejected_requests, 1);
    }

    #[test]
    fn test_force_open_close() {
        let breaker = CircuitBreaker::with_defaults("sink");

        assert!(breaker.state().is_closed());

        breaker.force_open();
        assert!(breaker.state().is_open());

        breaker.force_close();
        assert!(breaker.state().is_closed());
    }
}
