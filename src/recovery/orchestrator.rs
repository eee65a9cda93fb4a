//! The recovery orchestrator.

use crate::circuit_breaker::{BreakerTransition, CallPermit, CircuitBreaker};
use crate::config::duration_ms;
use crate::core::{BoxError, RecoveryError};
use crate::events::{EventBus, RecoveryEvent};
use crate::recovery::fallback::{ExecuteOptions, FallbackStrategy};
use crate::recovery::limiter::RecoveryLimiter;
use crate::recovery::outcome::Outcome;
use crate::recovery::registry::{ComponentHandle, ComponentRegistry, ComponentRole};
use crate::recovery::retry::Backoff;
use crate::recovery::stats::{ComponentStats, RecoveryAttempt, RecoveryStats};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

/// Configuration for the recovery orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of guarded attempts running at once.
    pub max_concurrent_recoveries: usize,

    /// Per-attempt timeout when the caller gives none.
    #[serde(rename = "default_timeout_ms", with = "duration_ms")]
    pub default_timeout: Duration,

    /// Cap on the delay between in-call retries.
    #[serde(rename = "max_retry_delay_ms", with = "duration_ms")]
    pub max_retry_delay: Duration,

    /// Growth factor of the delay between in-call retries.
    pub backoff_multiplier: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_recoveries: 4,
            default_timeout: Duration::from_secs(10),
            max_retry_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency bound.
    pub fn with_max_concurrent_recoveries(mut self, max: usize) -> Self {
        self.max_concurrent_recoveries = max;
        self
    }

    /// Sets the default per-attempt timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the retry delay cap.
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.max_concurrent_recoveries == 0 {
            return Err(RecoveryError::configuration(
                "max_concurrent_recoveries must be at least 1",
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(RecoveryError::configuration(
                "default_timeout must be greater than zero",
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(RecoveryError::configuration(
                "backoff_multiplier must be at least 1.0",
            ));
        }
        Ok(())
    }
}

struct Slot {
    handle: ComponentHandle,
    breaker: CircuitBreaker,
    stats: RwLock<ComponentStats>,
}

impl Slot {
    fn stats(&self) -> RwLockWriteGuard<'_, ComponentStats> {
        self.stats
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs operations against registered components with breaker gating,
/// timeouts, bounded concurrency and fallbacks.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = RecoveryOrchestrator::new(registry, OrchestratorConfig::default(), bus)?;
///
/// let samples = orchestrator
///     .execute(
///         ComponentRole::SampleCollector,
///         || collector.collect(),
///         ExecuteOptions::new().with_fallback(FallbackStrategy::degrade_empty()),
///     )
///     .await?;
/// ```
pub struct RecoveryOrchestrator {
    slots: BTreeMap<ComponentRole, Slot>,
    limiter: RecoveryLimiter,
    config: OrchestratorConfig,
    events: Arc<EventBus>,
}

impl RecoveryOrchestrator {
    /// Creates an orchestrator with one breaker per registered component.
    pub fn new(
        registry: ComponentRegistry,
        config: OrchestratorConfig,
        events: Arc<EventBus>,
    ) -> Result<Self, RecoveryError> {
        config.validate()?;

        let mut slots = BTreeMap::new();
        for (role, handle) in registry.iter() {
            let circuit = registry
                .circuit_config(role)
                .cloned()
                .unwrap_or_default();
            slots.insert(
                role,
                Slot {
                    handle: handle.clone(),
                    breaker: CircuitBreaker::new(role.as_str(), circuit),
                    stats: RwLock::new(ComponentStats::default()),
                },
            );
        }

        Ok(Self {
            slots,
            limiter: RecoveryLimiter::new(config.max_concurrent_recoveries),
            config,
            events,
        })
    }

    /// Returns the event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the concurrency limiter.
    pub fn limiter(&self) -> &RecoveryLimiter {
        &self.limiter
    }

    /// Returns the registered roles in order.
    pub fn roles(&self) -> Vec<ComponentRole> {
        self.slots.keys().copied().collect()
    }

    /// Returns the registration of `role`.
    pub fn handle(&self, role: ComponentRole) -> Result<&ComponentHandle, RecoveryError> {
        self.slot(role).map(|slot| &slot.handle)
    }

    /// Returns the breaker guarding `role`.
    pub fn breaker(&self, role: ComponentRole) -> Result<&CircuitBreaker, RecoveryError> {
        self.slot(role).map(|slot| &slot.breaker)
    }

    /// Returns counters and breaker state for every component.
    pub fn recovery_stats(&self) -> BTreeMap<ComponentRole, RecoveryStats> {
        self.slots
            .iter()
            .map(|(role, slot)| {
                let stats = slot
                    .stats
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
                (
                    *role,
                    RecoveryStats {
                        component: *role,
                        stats,
                        circuit: slot.breaker.snapshot(),
                    },
                )
            })
            .collect()
    }

    /// Runs `operation` on behalf of `role`.
    ///
    /// The call is skipped while the circuit is open. Otherwise it waits for
    /// a recovery slot, asks the breaker for admission once the slot is
    /// held, then runs under the timeout, retrying up to
    /// `options.retries` times while the circuit stays closed. If no value
    /// was produced and a fallback is given, the fallback's value is
    /// returned instead of the error.
    pub async fn execute<T, E, F, Fut>(
        &self,
        role: ComponentRole,
        mut operation: F,
        options: ExecuteOptions<T>,
    ) -> Result<Outcome<T>, RecoveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let slot = self.slot(role)?;
        let ExecuteOptions {
            fallback,
            timeout,
            deadline,
            retries,
        } = options;
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        match self
            .run(role, slot, &mut operation, timeout, deadline, retries)
            .await
        {
            Ok(value) => {
                slot.stats().record_attempt(RecoveryAttempt::succeeded(role));
                Ok(Outcome::Fresh(value))
            }
            Err(error) => self.recover(role, slot, error, fallback),
        }
    }

    async fn run<T, E, F, Fut>(
        &self,
        role: ComponentRole,
        slot: &Slot,
        operation: &mut F,
        timeout: Duration,
        deadline: Option<Duration>,
        retries: u32,
    ) -> Result<T, RecoveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        // An open circuit turns the call away before it queues.
        if let Err(error) = slot.breaker.check() {
            slot.stats().record_skipped(&error);
            return Err(error);
        }

        // Held across retries so a retrying call keeps its place.
        let _permit = match self.limiter.acquire(deadline).await {
            Some(permit) => permit,
            None => {
                let error = RecoveryError::Saturated {
                    component: role.as_str().to_string(),
                    waited: deadline.unwrap_or_default(),
                };
                slot.stats().record_skipped(&error);
                return Err(error);
            }
        };

        // The circuit may have opened while this call was queued.
        let mut call = match slot.breaker.try_acquire() {
            Ok(call) => call,
            Err(error) => {
                slot.stats().record_skipped(&error);
                return Err(error);
            }
        };

        let backoff = Backoff::new(slot.breaker.config().retry_delay)
            .with_max_delay(self.config.max_retry_delay)
            .with_multiplier(self.config.backoff_multiplier);
        let mut retry = 0;

        loop {
            let error = match tokio::time::timeout(timeout, operation()).await {
                Ok(Ok(value)) => {
                    slot.stats().record_success();
                    self.report_success(role, call);
                    return Ok(value);
                }
                Ok(Err(e)) => RecoveryError::operation(role.as_str(), e),
                Err(_) => RecoveryError::timeout(role.as_str(), timeout),
            };

            slot.stats().record_failure(&error);
            let opened = self.report_failure(role, call, &error);

            retry += 1;
            if opened || retry > retries {
                return Err(error);
            }

            let delay = backoff.delay_for_retry(retry);
            tracing::debug!(
                component = %role,
                retry = retry,
                max_retries = retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying operation"
            );
            tokio::time::sleep(delay).await;

            call = match slot.breaker.try_acquire() {
                Ok(call) => call,
                // Opened by a concurrent call while this one slept.
                Err(_) => return Err(error),
            };
        }
    }

    fn recover<T>(
        &self,
        role: ComponentRole,
        slot: &Slot,
        error: RecoveryError,
        fallback: Option<FallbackStrategy<T>>,
    ) -> Result<Outcome<T>, RecoveryError> {
        let Some(fallback) = fallback else {
            slot.stats()
                .record_attempt(RecoveryAttempt::failed(role, &error, false));
            return Err(error);
        };

        tracing::debug!(
            component = %role,
            fallback = ?fallback,
            error = %error,
            "Applying fallback"
        );

        match fallback.apply(role.as_str(), &error) {
            Ok(outcome) => {
                slot.stats()
                    .record_attempt(RecoveryAttempt::failed(role, &error, true));
                Ok(outcome)
            }
            Err(fallback_error) => {
                slot.stats()
                    .record_attempt(RecoveryAttempt::failed(role, &fallback_error, false));
                Err(fallback_error)
            }
        }
    }

    /// Feeds a success into the breaker of `role` and emits `CircuitClosed`
    /// if it closed.
    pub(crate) fn report_success(&self, role: ComponentRole, call: CallPermit<'_>) {
        if call.record_success() == Some(BreakerTransition::Closed) {
            tracing::info!(component = %role, "Circuit breaker closed");
            self.events.emit(&RecoveryEvent::CircuitClosed {
                component: role,
                timestamp: Utc::now(),
            });
        }
    }

    /// Feeds a failure into the breaker of `role`, emits `ComponentError`
    /// and, if the circuit opened, `CircuitOpened`. Returns `true` if it
    /// opened.
    pub(crate) fn report_failure(
        &self,
        role: ComponentRole,
        call: CallPermit<'_>,
        error: &RecoveryError,
    ) -> bool {
        let transition = call.record_failure();

        self.events.emit(&RecoveryEvent::ComponentError {
            component: role,
            error: error.to_string(),
            timestamp: Utc::now(),
        });

        if transition != Some(BreakerTransition::Opened) {
            return false;
        }

        let Ok(breaker) = self.breaker(role) else {
            return true;
        };
        let retry_in = breaker.config().open_timeout;
        tracing::warn!(
            component = %role,
            retry_in_ms = retry_in.as_millis() as u64,
            "Circuit breaker opened"
        );
        self.events.emit(&RecoveryEvent::CircuitOpened {
            component: role,
            retry_in_ms: retry_in.as_millis() as u64,
            timestamp: Utc::now(),
        });
        true
    }

    fn slot(&self, role: ComponentRole) -> Result<&Slot, RecoveryError> {
        self.slots
            .get(&role)
            .ok_or_else(|| RecoveryError::UnknownComponent {
                component: role.as_str().to_string(),
            })
    }
}

impl std::fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("roles", &self.roles())
            .field("limiter", &self.limiter)
            .field("config", &self.config)
            .finish()
    }
}
