//! Circuit breaker configuration.

use crate::core::RecoveryError;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,

    /// Number of consecutive half-open successes needed to close the circuit.
    pub success_threshold: u32,

    /// How long to keep the circuit open before allowing a probe.
    #[serde(rename = "open_timeout_ms", with = "crate::config::duration_ms")]
    pub open_timeout: Duration,

    /// Base delay between in-call retry attempts.
    #[serde(rename = "retry_delay_ms", with = "crate::config::duration_ms")]
    pub retry_delay: Duration,

    /// Maximum number of probes in flight while half-open.
    pub half_open_max_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            half_open_max_probes: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the success threshold.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Sets the open timeout.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets the retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the maximum number of half-open probes.
    pub fn with_half_open_max_probes(mut self, max: u32) -> Self {
        self.half_open_max_probes = max;
        self
    }

    /// Checks the configuration.
    ///
    /// Invalid thresholds are a startup error; they are never silently
    /// replaced by defaults.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.failure_threshold == 0 {
            return Err(RecoveryError::configuration(
                "failure_threshold must be at least 1",
            ));
        }
        if self.success_threshold == 0 {
            return Err(RecoveryError::configuration(
                "success_threshold must be at least 1",
            ));
        }
        if self.open_timeout.is_zero() {
            return Err(RecoveryError::configuration(
                "open_timeout must be greater than zero",
            ));
        }
        if self.half_open_max_probes == 0 {
            return Err(RecoveryError::configuration(
                "half_open_max_probes must be at least 1",
            ));
        }
        Ok(())
    }

    /// Creates a configuration for dependencies that must not be hammered.
    ///
    /// This configuration:
    /// - Uses a lower failure threshold (3)
    /// - Keeps circuits open longer (60 seconds)
    /// - Needs more successful probes to close (3)
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 3,
            open_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(2),
            half_open_max_probes: 1,
        }
    }

    /// Creates a configuration optimized for high availability.
    ///
    /// This configuration:
    /// - Uses a higher failure threshold (10)
    /// - Keeps circuits open for a shorter time (10 seconds)
    /// - Allows more probe attempts
    pub fn high_availability() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 2,
            open_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_millis(500),
            half_open_max_probes: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.open_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_open_timeout(Duration::from_millis(1000));

        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.open_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let zero_failures = CircuitBreakerConfig::new().with_failure_threshold(0);
        assert!(matches!(
            zero_failures.validate(),
            Err(RecoveryError::Configuration { .. })
        ));

        let zero_timeout = CircuitBreakerConfig::new().with_open_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_serde_uses_milliseconds() {
        let config = CircuitBreakerConfig::new().with_open_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["open_timeout_ms"], 1500);

        let parsed: CircuitBreakerConfig =
            serde_json::from_str(r#"{"failure_threshold": 3, "open_timeout_ms": 1000}"#).unwrap();
        assert_eq!(parsed.failure_threshold, 3);
        assert_eq!(parsed.open_timeout, Duration::from_secs(1));
        assert_eq!(parsed.success_threshold, 2);
    }
}
