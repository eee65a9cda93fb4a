//! Recurring health passes.

use crate::health::aggregator::HealthAggregator;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs [`HealthAggregator::check_now`] on a fixed interval.
///
/// The first pass runs immediately on [`start`](Self::start).
/// [`stop`](Self::stop) cancels the loop and waits for the running pass to
/// finish.
pub struct HealthScheduler {
    aggregator: Arc<HealthAggregator>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl HealthScheduler {
    /// Creates a stopped scheduler using the aggregator's interval.
    pub fn new(aggregator: Arc<HealthAggregator>) -> Self {
        let interval = aggregator.config().interval;
        Self {
            aggregator,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Returns the interval between passes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` if the loop is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Spawns the loop on the current tokio runtime.
    ///
    /// Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if running.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let aggregator = Arc::clone(&self.aggregator);
        let interval = self.interval;
        let child = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        aggregator.check_now().await;
                    }
                }
            }
            tracing::debug!("Health scheduler stopped");
        });

        tracing::info!(interval_ms = interval.as_millis() as u64, "Health scheduler started");
        *running = Some(Running { token, handle });
        true
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(Running { token, handle }) = running {
            token.cancel();
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Health scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for HealthScheduler {
    fn drop(&mut self) {
        if let Some(running) = self
            .running
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            running.token.cancel();
        }
    }
}

impl std::fmt::Debug for HealthScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MockHealthCheck;
    use crate::events::EventBus;
    use crate::health::HealthConfig;
    use crate::recovery::{
        ComponentHandle, ComponentKind, ComponentRegistry, ComponentRole, OrchestratorConfig,
        RecoveryOrchestrator,
    };

    fn scheduler(check: Arc<MockHealthCheck>) -> HealthScheduler {
        let registry = ComponentRegistry::builder()
            .register(
                ComponentRole::SampleCollector,
                ComponentHandle::new(ComponentKind::Source, check),
            )
            .build()
            .unwrap();
        let orchestrator = Arc::new(
            RecoveryOrchestrator::new(
                registry,
                OrchestratorConfig::default(),
                Arc::new(EventBus::new()),
            )
            .unwrap(),
        );
        let aggregator = HealthAggregator::new(
            orchestrator,
            HealthConfig::default().with_interval(Duration::from_secs(10)),
        )
        .unwrap();
        HealthScheduler::new(Arc::new(aggregator))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_interval_until_stopped() {
        let check = Arc::new(MockHealthCheck::healthy());
        let scheduler = scheduler(check.clone());

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());

        // First tick is immediate, then one every 10s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(check.check_count(), 3);

        scheduler.stop().await;
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(check.check_count(), 3);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let scheduler = scheduler(Arc::new(MockHealthCheck::healthy()));
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let check = Arc::new(MockHealthCheck::healthy());
        let scheduler = scheduler(check.clone());

        // Stopped before the task was ever polled.
        scheduler.start();
        scheduler.stop().await;
        assert_eq!(check.check_count(), 0);

        assert!(scheduler.start());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(check.check_count(), 1);
        scheduler.stop().await;
    }
}
