//! Health aggregation across registered components.

use crate::circuit_breaker::CircuitState;
use crate::core::RecoveryError;
use crate::events::RecoveryEvent;
use crate::health::status::{ComponentHealth, HealthConfig, HealthStatus, SystemHealth};
use crate::recovery::{ComponentRole, RecoveryOrchestrator};

use chrono::Utc;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;

/// Probes every registered component and classifies system health.
///
/// Probe results feed the same breakers the orchestrator uses, so a
/// dependency that recovers between pipeline cycles can close its circuit.
/// Health is advisory: nothing is blocked on it.
#[derive(Debug)]
pub struct HealthAggregator {
    orchestrator: Arc<RecoveryOrchestrator>,
    config: HealthConfig,
    latest: RwLock<Option<SystemHealth>>,
}

impl HealthAggregator {
    /// Creates an aggregator over the orchestrator's components.
    pub fn new(
        orchestrator: Arc<RecoveryOrchestrator>,
        config: HealthConfig,
    ) -> Result<Self, RecoveryError> {
        config.validate()?;
        Ok(Self {
            orchestrator,
            config,
            latest: RwLock::new(None),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Returns the latest snapshot, if a pass has run.
    pub fn system_health(&self) -> Option<SystemHealth> {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Runs one health pass and emits `HealthUpdate`.
    pub async fn check_now(&self) -> SystemHealth {
        let probes = self
            .orchestrator
            .roles()
            .into_iter()
            .map(|role| self.probe(role));
        let components = futures::future::join_all(probes).await;

        let health = SystemHealth::from_components(components);
        tracing::debug!(
            status = %health.status,
            issues = health.issues.len(),
            "Health pass finished"
        );

        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(health.clone());

        self.orchestrator.events().emit(&RecoveryEvent::HealthUpdate {
            status: health.status,
            issues: health.issues.clone(),
            timestamp: health.checked_at,
        });

        health
    }

    async fn probe(&self, role: ComponentRole) -> ComponentHealth {
        let (handle, breaker) = match (
            self.orchestrator.handle(role),
            self.orchestrator.breaker(role),
        ) {
            (Ok(handle), Ok(breaker)) => (handle, breaker),
            // Roles come from the orchestrator itself.
            _ => {
                return ComponentHealth {
                    name: role,
                    status: HealthStatus::Unhealthy,
                    circuit_state: CircuitState::Closed,
                    critical: false,
                    last_checked_at: None,
                    last_error: Some("not registered".to_string()),
                    latency_ms: None,
                }
            }
        };

        let call = match breaker.try_acquire() {
            Ok(call) => call,
            // Open, or half-open with every probe slot taken by live calls.
            Err(_) => {
                let circuit_state = breaker.state().circuit();
                let (status, reason) = match circuit_state {
                    CircuitState::HalfOpen => (HealthStatus::Degraded, "recovery probe in flight"),
                    _ => (HealthStatus::Unhealthy, "circuit open"),
                };
                return ComponentHealth {
                    name: role,
                    status,
                    circuit_state,
                    critical: handle.critical,
                    last_checked_at: None,
                    last_error: Some(reason.to_string()),
                    latency_ms: None,
                };
            }
        };

        let started = Instant::now();
        let result =
            tokio::time::timeout(self.config.probe_timeout, handle.health_check.check()).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(RecoveryError::operation(role.as_str(), e)),
            Err(_) => Some(RecoveryError::timeout(
                role.as_str(),
                self.config.probe_timeout,
            )),
        };
        match &error {
            None => self.orchestrator.report_success(role, call),
            Some(error) => {
                self.orchestrator.report_failure(role, call, error);
            }
        }

        let circuit_state = breaker.state().circuit();
        let status = match (&error, circuit_state) {
            (Some(_), _) => HealthStatus::Unhealthy,
            (None, CircuitState::Closed) => HealthStatus::Healthy,
            (None, _) => HealthStatus::Degraded,
        };

        ComponentHealth {
            name: role,
            status,
            circuit_state,
            critical: handle.critical,
            last_checked_at: Some(Utc::now()),
            last_error: error.map(|e| e.to_string()),
            latency_ms: Some(latency_ms),
        }
    }
}
