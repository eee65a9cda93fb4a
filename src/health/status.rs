//! Health status types and classification.

use crate::circuit_breaker::CircuitState;
use crate::config::duration_ms;
use crate::core::RecoveryError;
use crate::recovery::ComponentRole;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for health aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Time between health passes.
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,

    /// Timeout for a single probe.
    #[serde(rename = "probe_timeout_ms", with = "duration_ms")]
    pub probe_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl HealthConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interval between passes.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.interval.is_zero() {
            return Err(RecoveryError::configuration(
                "health interval must be greater than zero",
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(RecoveryError::configuration(
                "health probe_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Health classification of a component or of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything works.
    Healthy,
    /// Working, with reduced fidelity.
    Degraded,
    /// Not working.
    Unhealthy,
}

impl HealthStatus {
    /// Returns the status as a stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Returns `true` if healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// The component.
    pub name: ComponentRole,
    /// Component status.
    pub status: HealthStatus,
    /// Breaker state after the probe.
    pub circuit_state: CircuitState,
    /// Whether the component is critical.
    pub critical: bool,
    /// When the probe ran; `None` if it was skipped.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Error from the probe, or why it was skipped.
    pub last_error: Option<String>,
    /// How long the probe took.
    pub latency_ms: Option<u64>,
}

/// System-wide health snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// Overall status.
    pub status: HealthStatus,
    /// Per-component results, in role order.
    pub components: Vec<ComponentHealth>,
    /// Human-readable problems found.
    pub issues: Vec<String>,
    /// When the pass finished.
    pub checked_at: DateTime<Utc>,
}

impl SystemHealth {
    /// Classifies a set of component results.
    ///
    /// The system is unhealthy if any critical component is unhealthy or has
    /// an open circuit, degraded if any other component is not healthy, and
    /// healthy otherwise.
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let mut status = HealthStatus::Healthy;
        let mut issues = Vec::new();

        for component in &components {
            let open = component.circuit_state == CircuitState::Open;
            if component.status.is_healthy() && !open {
                continue;
            }

            let reason = component
                .last_error
                .as_deref()
                .unwrap_or(component.status.as_str());
            issues.push(format!(
                "{} ({}, circuit {}): {}",
                component.name,
                if component.critical { "critical" } else { "non-critical" },
                component.circuit_state,
                reason
            ));

            if component.critical && (component.status == HealthStatus::Unhealthy || open) {
                status = HealthStatus::Unhealthy;
            } else if status == HealthStatus::Healthy {
                status = HealthStatus::Degraded;
            }
        }

        Self {
            status,
            components,
            issues,
            checked_at: Utc::now(),
        }
    }

    /// Returns the result for `role`, if it was probed.
    pub fn component(&self, role: ComponentRole) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(
        name: ComponentRole,
        status: HealthStatus,
        circuit_state: CircuitState,
        critical: bool,
    ) -> ComponentHealth {
        ComponentHealth {
            name,
            status,
            circuit_state,
            critical,
            last_checked_at: Some(Utc::now()),
            last_error: None,
            latency_ms: Some(1),
        }
    }

    #[test]
    fn test_all_healthy() {
        let health = SystemHealth::from_components(vec![
            component(ComponentRole::SampleCollector, HealthStatus::Healthy, CircuitState::Closed, true),
            component(ComponentRole::PatternGenerator, HealthStatus::Healthy, CircuitState::Closed, false),
        ]);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.issues.is_empty());
    }

    #[test]
    fn test_non_critical_failure_degrades() {
        let health = SystemHealth::from_components(vec![
            component(ComponentRole::SampleCollector, HealthStatus::Healthy, CircuitState::Closed, true),
            component(ComponentRole::PatternGenerator, HealthStatus::Unhealthy, CircuitState::Open, false),
        ]);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.issues.len(), 1);
        assert!(health.issues[0].starts_with("pattern_generator"));
    }

    #[test]
    fn test_critical_open_circuit_is_unhealthy() {
        let health = SystemHealth::from_components(vec![
            component(ComponentRole::TelemetrySink, HealthStatus::Healthy, CircuitState::Open, true),
            component(ComponentRole::PatternGenerator, HealthStatus::Unhealthy, CircuitState::Closed, false),
        ]);
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.issues.len(), 2);
    }

    #[test]
    fn test_critical_half_open_degrades() {
        let health = SystemHealth::from_components(vec![component(
            ComponentRole::TelemetrySink,
            HealthStatus::Degraded,
            CircuitState::HalfOpen,
            true,
        )]);
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(HealthConfig::default().validate().is_ok());
        assert!(HealthConfig::new()
            .with_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
