//! Circuit breaker state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// The current state of a circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakerState {
    /// Circuit is closed; calls pass through normally.
    Closed {
        /// Number of consecutive failures.
        consecutive_failures: u32,
    },

    /// Circuit is open; calls are rejected.
    Open {
        /// When the circuit was (last) opened.
        opened_at: Instant,
        /// When a probe becomes allowed.
        until: Instant,
    },

    /// Circuit is half-open; probe calls are allowed through.
    HalfOpen {
        /// Number of consecutive successful probes.
        consecutive_successes: u32,
        /// Number of probes currently in flight.
        in_flight: u32,
    },
}

impl BreakerState {
    /// Creates a new closed state.
    pub fn closed() -> Self {
        Self::Closed {
            consecutive_failures: 0,
        }
    }

    /// Creates an open state starting now.
    pub fn open_for(timeout: Duration) -> Self {
        let opened_at = Instant::now();
        Self::Open {
            opened_at,
            until: opened_at + timeout,
        }
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen { .. })
    }

    /// Returns the consecutive failure count if closed.
    pub fn consecutive_failures(&self) -> Option<u32> {
        match self {
            Self::Closed {
                consecutive_failures,
            } => Some(*consecutive_failures),
            _ => None,
        }
    }

    /// Returns the consecutive success count if half-open.
    pub fn consecutive_successes(&self) -> Option<u32> {
        match self {
            Self::HalfOpen {
                consecutive_successes,
                ..
            } => Some(*consecutive_successes),
            _ => None,
        }
    }

    /// Returns when the circuit was opened, if open.
    pub fn opened_at(&self) -> Option<Instant> {
        match self {
            Self::Open { opened_at, .. } => Some(*opened_at),
            _ => None,
        }
    }

    /// Returns the coarse circuit state.
    pub fn circuit(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        self.circuit().as_str()
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Coarse, serializable circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through.
    Closed,
    /// Calls are rejected.
    Open,
    /// Probe calls are allowed.
    HalfOpen,
}

impl CircuitState {
    /// Returns the state as a stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition caused by recording an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    /// The circuit went from closed or half-open to open.
    Opened,
    /// The circuit went from half-open to closed.
    Closed,
}

/// How a call was let through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The circuit is closed.
    Normal,
    /// The call is a half-open probe.
    Probe,
}

/// A serializable point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    /// Coarse state.
    pub state: CircuitState,
    /// Consecutive failures while closed.
    pub consecutive_failures: u32,
    /// Consecutive successes while half-open.
    pub consecutive_successes: u32,
    /// Milliseconds since the circuit opened, if open.
    pub open_for_ms: Option<u64>,
    /// Milliseconds until a probe is allowed, if open.
    pub retry_in_ms: Option<u64>,
}

impl BreakerSnapshot {
    /// Builds a snapshot of `state` as of now.
    pub fn of(state: &BreakerState) -> Self {
        let now = Instant::now();
        let (open_for_ms, retry_in_ms) = match state {
            BreakerState::Open { opened_at, until } => (
                Some(now.saturating_duration_since(*opened_at).as_millis() as u64),
                Some(until.saturating_duration_since(now).as_millis() as u64),
            ),
            _ => (None, None),
        };

        Self {
            state: state.circuit(),
            consecutive_failures: state.consecutive_failures().unwrap_or(0),
            consecutive_successes: state.consecutive_successes().unwrap_or(0),
            open_for_ms,
            retry_in_ms,
        }
    }
}

/// Running counters for one component's breaker, reported in recovery stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Calls that reached the breaker, whether admitted or not.
    pub total_requests: u64,
    /// Admitted calls whose operation returned `Ok`.
    pub successful_requests: u64,
    /// Admitted calls that errored or timed out.
    pub failed_requests: u64,
    /// Calls turned away while open or with the half-open probe slot taken.
    pub rejected_requests: u64,
    /// Transitions into `Open`.
    pub times_opened: u64,
    /// Recoveries from `HalfOpen` back to `Closed`.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts an admitted call that succeeded.
    pub fn record_success(&mut self) {
        self.total_requests += 1;
        self.successful_requests += 1;
    }

    /// Counts an admitted call that failed.
    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    /// Counts a call the breaker refused to admit.
    pub fn record_rejected(&mut self) {
        self.total_requests += 1;
        self.rejected_requests += 1;
    }

    /// Counts a transition into `Open`.
    pub fn record_opened(&mut self) {
        self.times_opened += 1;
    }

    /// Counts a recovery from `HalfOpen` to `Closed`.
    pub fn record_closed(&mut self) {
        self.times_closed += 1;
    }

    /// Share of all calls that succeeded; `1.0` before any traffic.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    /// Share of all calls that failed; rejections are not failures.
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_state_default() {
        let state = BreakerState::default();
        assert!(state.is_closed());
        assert_eq!(state.consecutive_failures(), Some(0));
    }

    #[test]
    fn test_half_open_reports_probe_progress() {
        let state = BreakerState::HalfOpen {
            consecutive_successes: 1,
            in_flight: 1,
        };
        assert!(state.is_half_open());
        assert_eq!(state.consecutive_failures(), None);
        assert_eq!(BreakerSnapshot::of(&state).state, CircuitState::HalfOpen);
    }

    #[test]
    fn test_open_snapshot() {
        let snapshot = BreakerSnapshot::of(&BreakerState::open_for(Duration::from_secs(30)));
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.retry_in_ms.unwrap() <= 30_000);
        assert!(snapshot.open_for_ms.is_some());
    }

    #[test]
    fn test_rejections_dilute_success_rate_but_not_failure_rate() {
        let mut metrics = BreakerMetrics::new();
        assert_eq!(metrics.success_rate(), 1.0);

        metrics.record_failure();
        metrics.record_opened();
        metrics.record_rejected();
        metrics.record_rejected();
        metrics.record_success();

        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.rejected_requests, 2);
        assert_eq!(metrics.times_opened, 1);
        assert_eq!(metrics.success_rate(), 0.25);
        assert_eq!(metrics.failure_rate(), 0.25);
    }
}
