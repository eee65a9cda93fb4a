//! Backoff between in-call retries.

use std::time::Duration;

/// Exponential backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub multiplier: f64,

    /// Whether to spread delays.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl Backoff {
    /// Creates a backoff starting at `initial_delay`.
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..Self::default()
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculates the delay before retry number `retry` (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let base_delay =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(retry as i32 - 1);

        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            // Deterministic so schedules are reproducible under paused time.
            let jitter_factor = 0.5 + (retry as f64 * 0.618033988749895) % 0.5;
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let backoff = Backoff::new(Duration::from_millis(100)).with_multiplier(2.0);

        assert_eq!(backoff.delay_for_retry(0), Duration::ZERO);
        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let backoff = Backoff::new(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_multiplier(10.0);

        assert_eq!(backoff.delay_for_retry(2), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_below_base() {
        let backoff = Backoff::new(Duration::from_millis(1000)).with_jitter(true);
        for retry in 1..5 {
            let plain = Backoff::new(Duration::from_millis(1000)).delay_for_retry(retry);
            assert!(backoff.delay_for_retry(retry) <= plain);
        }
    }

    #[test]
    fn test_multiplier_floor() {
        let backoff = Backoff::new(Duration::from_millis(100)).with_multiplier(0.1);
        assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(100));
    }
}
