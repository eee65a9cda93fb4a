//! Fallback strategies and per-call options.

use crate::core::RecoveryError;
use crate::recovery::outcome::Outcome;

use std::fmt;
use std::time::Duration;

/// A caller-supplied fallback computation.
pub type CustomFallback<T> =
    Box<dyn FnOnce(&RecoveryError) -> Result<T, RecoveryError> + Send + 'static>;

/// What to return when a guarded operation cannot produce a value.
///
/// Fallback values are tagged in the returned [`Outcome`] and never count as
/// successes of the guarded dependency.
pub enum FallbackStrategy<T> {
    /// Return the last known good value, tagged [`Outcome::Cached`].
    RetryCached(T),
    /// Return an empty value, tagged [`Outcome::Degraded`].
    DegradeEmpty(fn() -> T),
    /// Compute a value from the error, tagged [`Outcome::Degraded`].
    Custom(CustomFallback<T>),
}

impl<T> FallbackStrategy<T> {
    /// Returns `T::default()` on failure.
    pub fn degrade_empty() -> Self
    where
        T: Default,
    {
        Self::DegradeEmpty(T::default)
    }

    /// Returns `value` on failure, tagged as cached.
    pub fn cached(value: T) -> Self {
        Self::RetryCached(value)
    }

    /// Computes the fallback value with `f`.
    pub fn custom<F>(f: F) -> Self
    where
        F: FnOnce(&RecoveryError) -> Result<T, RecoveryError> + Send + 'static,
    {
        Self::Custom(Box::new(f))
    }

    /// Produces the fallback outcome for `error`.
    ///
    /// Only a failing [`Custom`](Self::Custom) fallback returns an error.
    pub fn apply(self, component: &str, error: &RecoveryError) -> Result<Outcome<T>, RecoveryError> {
        match self {
            Self::RetryCached(value) => Ok(Outcome::Cached(value)),
            Self::DegradeEmpty(empty) => Ok(Outcome::Degraded(empty())),
            Self::Custom(f) => f(error).map(Outcome::Degraded).map_err(|e| {
                RecoveryError::FallbackFailed {
                    component: component.to_string(),
                    message: format!("{e} (after: {error})"),
                }
            }),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::RetryCached(_) => "retry_cached",
            Self::DegradeEmpty(_) => "degrade_empty",
            Self::Custom(_) => "custom",
        }
    }
}

impl<T> fmt::Debug for FallbackStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-call options for [`RecoveryOrchestrator::execute`].
///
/// [`RecoveryOrchestrator::execute`]: crate::recovery::RecoveryOrchestrator::execute
pub struct ExecuteOptions<T> {
    /// Fallback applied when the operation fails or is skipped.
    pub fallback: Option<FallbackStrategy<T>>,
    /// Per-attempt timeout; the orchestrator default applies when `None`.
    pub timeout: Option<Duration>,
    /// Longest time to wait for a recovery slot; waits forever when `None`.
    pub deadline: Option<Duration>,
    /// Extra attempts after the first failure.
    pub retries: u32,
}

impl<T> ExecuteOptions<T> {
    /// Creates options with no fallback, default timeout and no retries.
    pub fn new() -> Self {
        Self {
            fallback: None,
            timeout: None,
            deadline: None,
            retries: 0,
        }
    }

    /// Sets the fallback.
    pub fn with_fallback(mut self, fallback: FallbackStrategy<T>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the slot wait deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

impl<T> Default for ExecuteOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ExecuteOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("fallback", &self.fallback)
            .field("timeout", &self.timeout)
            .field("deadline", &self.deadline)
            .field("retries", &self.retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> RecoveryError {
        RecoveryError::timeout("telemetry_sink", Duration::from_secs(1))
    }

    #[test]
    fn test_retry_cached() {
        let outcome = FallbackStrategy::cached(vec![1, 2, 3])
            .apply("telemetry_sink", &failure())
            .unwrap();
        assert_eq!(outcome, Outcome::Cached(vec![1, 2, 3]));
    }

    #[test]
    fn test_degrade_empty() {
        let outcome = FallbackStrategy::<Vec<u8>>::degrade_empty()
            .apply("sample_collector", &failure())
            .unwrap();
        assert_eq!(outcome, Outcome::Degraded(Vec::new()));
    }

    #[test]
    fn test_custom_sees_error() {
        let outcome = FallbackStrategy::custom(|e: &RecoveryError| Ok(e.is_transient()))
            .apply("telemetry_sink", &failure())
            .unwrap();
        assert_eq!(outcome, Outcome::Degraded(true));
    }

    #[test]
    fn test_failing_custom_fallback() {
        let err = FallbackStrategy::<u32>::custom(|_| {
            Err(RecoveryError::configuration("no snapshot"))
        })
        .apply("telemetry_sink", &failure())
        .unwrap_err();

        assert!(matches!(err, RecoveryError::FallbackFailed { .. }));
        assert!(err.to_string().contains("no snapshot"));
    }

    #[test]
    fn test_options_builder() {
        let options = ExecuteOptions::<()>::new()
            .with_timeout(Duration::from_millis(250))
            .with_retries(2)
            .with_fallback(FallbackStrategy::degrade_empty());
        assert_eq!(options.retries, 2);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(format!("{:?}", options.fallback), "Some(degrade_empty)");
    }
}
