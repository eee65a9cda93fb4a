//! Per-component recovery counters.

use crate::circuit_breaker::BreakerSnapshot;
use crate::core::RecoveryError;
use crate::recovery::registry::ComponentRole;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The result of one `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    /// The guarded component.
    pub component: ComponentRole,
    /// Whether the operation itself produced the value.
    pub succeeded: bool,
    /// Whether a fallback value was returned.
    pub used_fallback: bool,
    /// The error that triggered the fallback or was returned.
    pub error: Option<String>,
    /// When the call finished.
    pub timestamp: DateTime<Utc>,
}

impl RecoveryAttempt {
    /// Records a successful call.
    pub fn succeeded(component: ComponentRole) -> Self {
        Self {
            component,
            succeeded: true,
            used_fallback: false,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Records a failed call.
    pub fn failed(component: ComponentRole, error: &RecoveryError, used_fallback: bool) -> Self {
        Self {
            component,
            succeeded: false,
            used_fallback,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// Counters for one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentStats {
    /// Operation invocations, retries included.
    pub attempts: u64,
    /// Invocations that returned a value.
    pub successes: u64,
    /// Invocations that failed or timed out.
    pub failures: u64,
    /// Invocations that timed out.
    pub timeouts: u64,
    /// Calls skipped because the circuit was open.
    pub rejections: u64,
    /// Calls that gave up waiting for a recovery slot.
    pub saturations: u64,
    /// Calls answered by a fallback.
    pub fallbacks: u64,
    /// The most recent error.
    pub last_error: Option<String>,
    /// The most recent finished call.
    pub last_attempt: Option<RecoveryAttempt>,
}

impl ComponentStats {
    /// Records a successful invocation.
    pub fn record_success(&mut self) {
        self.attempts += 1;
        self.successes += 1;
    }

    /// Records a failed invocation.
    pub fn record_failure(&mut self, error: &RecoveryError) {
        self.attempts += 1;
        self.failures += 1;
        if matches!(error, RecoveryError::Timeout { .. }) {
            self.timeouts += 1;
        }
        self.last_error = Some(error.to_string());
    }

    /// Records a call skipped before any invocation.
    pub fn record_skipped(&mut self, error: &RecoveryError) {
        match error {
            RecoveryError::CircuitOpen { .. } => self.rejections += 1,
            RecoveryError::Saturated { .. } => self.saturations += 1,
            _ => {}
        }
        self.last_error = Some(error.to_string());
    }

    /// Records the end of a call.
    pub fn record_attempt(&mut self, attempt: RecoveryAttempt) {
        if attempt.used_fallback {
            self.fallbacks += 1;
        }
        self.last_attempt = Some(attempt);
    }

    /// Returns the success rate of invocations (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 1.0;
        }
        self.successes as f64 / self.attempts as f64
    }
}

/// Counters and breaker state for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStats {
    /// The component.
    pub component: ComponentRole,
    /// Call counters.
    pub stats: ComponentStats,
    /// Breaker state at the time of the query.
    pub circuit: BreakerSnapshot,
}
