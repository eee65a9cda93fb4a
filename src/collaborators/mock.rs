//! Mock collaborators for testing.
//!
//! Every mock is deterministic, counts its calls, and can be switched into a
//! failing or slow mode at runtime, so tests can drive the breakers and the
//! merger through outages and recoveries.
//!
//! # Examples
//!
//! ```rust
//! use queuebridge::collaborators::{MockCollector, MockHealthCheck, MockSink};
//! use queuebridge::core::Sample;
//! use std::time::Duration;
//!
//! let collector = MockCollector::new(vec![
//!     Sample::new("KafkaBrokerSample").with("broker.id", 1),
//! ]);
//!
//! let sink = MockSink::new();
//! sink.set_failing(true);
//!
//! let check = MockHealthCheck::healthy();
//! check.set_delay(Duration::from_millis(50));
//! ```

use crate::core::{
    entity_guid, CollaboratorError, CompositeKey, Entity, EntityAttributes, EntityFactory,
    EntitySource, EntityType, HealthCheck, MetricMap, PatternGenerator, Sample, SampleCollector,
    SendAck, TelemetrySink,
};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Runtime switches shared by the mocks.
#[derive(Debug, Default)]
struct Switches {
    failing: AtomicBool,
    delay: RwLock<Option<Duration>>,
    calls: AtomicU64,
}

impl Switches {
    /// Counts the call, waits out the delay, and reports whether to fail.
    async fn enter(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self
            .delay
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.failing.load(Ordering::SeqCst)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn set_delay(&self, delay: Duration) {
        *self
            .delay
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(delay);
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A collector returning a configurable batch of samples.
#[derive(Debug, Default)]
pub struct MockCollector {
    samples: RwLock<Vec<Sample>>,
    switches: Switches,
}

impl MockCollector {
    /// Creates a collector returning `samples`.
    pub fn new(samples: Vec<Sample>) -> Self {
        Self {
            samples: RwLock::new(samples),
            switches: Switches::default(),
        }
    }

    /// Replaces the returned samples.
    pub fn set_samples(&self, samples: Vec<Sample>) {
        *self
            .samples
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = samples;
    }

    /// Makes every collection fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.switches.set_failing(failing);
    }

    /// Delays every collection.
    pub fn set_delay(&self, delay: Duration) {
        self.switches.set_delay(delay);
    }

    /// Returns the number of collections attempted.
    pub fn collect_count(&self) -> u64 {
        self.switches.calls()
    }
}

#[async_trait]
impl SampleCollector for MockCollector {
    async fn collect(&self) -> Result<Vec<Sample>, CollaboratorError> {
        if self.switches.enter().await {
            return Err(CollaboratorError::unavailable(
                "mock-collector",
                "simulated outage",
            ));
        }
        Ok(self
            .samples
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

/// A sink that records every batch it accepts.
#[derive(Debug, Default)]
pub struct MockSink {
    batches: RwLock<Vec<Vec<Entity>>>,
    switches: Switches,
}

impl MockSink {
    /// Creates an accepting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.switches.set_failing(failing);
    }

    /// Delays every send.
    pub fn set_delay(&self, delay: Duration) {
        self.switches.set_delay(delay);
    }

    /// Returns the number of sends attempted.
    pub fn send_count(&self) -> u64 {
        self.switches.calls()
    }

    /// Returns every accepted batch.
    pub fn batches(&self) -> Vec<Vec<Entity>> {
        self.batches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the most recently accepted batch.
    pub fn last_batch(&self) -> Option<Vec<Entity>> {
        self.batches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl TelemetrySink for MockSink {
    async fn send(&self, entities: &[Entity]) -> Result<SendAck, CollaboratorError> {
        if self.switches.enter().await {
            return Err(CollaboratorError::unavailable("mock-sink", "simulated outage"));
        }
        self.batches
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entities.to_vec());
        Ok(SendAck {
            accepted: entities.len(),
            rejected: 0,
        })
    }
}

/// A health probe whose result can be switched.
#[derive(Debug, Default)]
pub struct MockHealthCheck {
    switches: Switches,
}

impl MockHealthCheck {
    /// Creates a passing probe.
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Creates a failing probe.
    pub fn unhealthy() -> Self {
        let check = Self::default();
        check.set_healthy(false);
        check
    }

    /// Sets whether the probe passes.
    pub fn set_healthy(&self, healthy: bool) {
        self.switches.set_failing(!healthy);
    }

    /// Delays every probe.
    pub fn set_delay(&self, delay: Duration) {
        self.switches.set_delay(delay);
    }

    /// Returns the number of probes run.
    pub fn check_count(&self) -> u64 {
        self.switches.calls()
    }
}

#[async_trait]
impl HealthCheck for MockHealthCheck {
    async fn check(&self) -> Result<(), CollaboratorError> {
        if self.switches.enter().await {
            return Err(CollaboratorError::unavailable("mock-check", "probe failed"));
        }
        Ok(())
    }
}

/// A factory that builds placeholders for any key.
#[derive(Debug, Default)]
pub struct MockEntityFactory {
    failing_keys: RwLock<HashSet<CompositeKey>>,
    mismatched: bool,
    switches: Switches,
}

impl MockEntityFactory {
    /// Creates a factory that succeeds for every key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns entities keyed under a different local id.
    pub fn with_mismatched_keys(mut self) -> Self {
        self.mismatched = true;
        self
    }

    /// Makes creation fail for `key`.
    pub fn fail_for(&self, key: CompositeKey) {
        self.failing_keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key);
    }

    /// Makes every creation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.switches.set_failing(failing);
    }

    /// Delays every creation.
    pub fn set_delay(&self, delay: Duration) {
        self.switches.set_delay(delay);
    }

    /// Returns the number of creations attempted.
    pub fn create_count(&self) -> u64 {
        self.switches.calls()
    }
}

#[async_trait]
impl EntityFactory for MockEntityFactory {
    async fn create(
        &self,
        entity_type: EntityType,
        attributes: &EntityAttributes,
    ) -> Result<Entity, CollaboratorError> {
        let failing = self.switches.enter().await;
        let key = &attributes.key;
        let listed = self
            .failing_keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(key);
        if failing || listed {
            return Err(CollaboratorError::Synthesis {
                entity_type: entity_type.to_string(),
                local_id: key.local_id.clone(),
                reason: "simulated factory failure".to_string(),
            });
        }

        let mut key = key.clone();
        if self.mismatched {
            key.local_id.push_str("-other");
        }
        let guid = entity_guid(&key, "mock-account");
        Ok(Entity::new(
            key,
            guid,
            attributes.display_name.clone(),
            EntitySource::Synthesized,
        ))
    }
}

/// A generator returning a fixed metric and a refresh counter.
#[derive(Debug, Default)]
pub struct MockPatternGenerator {
    failing_keys: RwLock<HashSet<CompositeKey>>,
    refreshes: AtomicUsize,
    switches: Switches,
}

impl MockPatternGenerator {
    /// Creates a generator that succeeds for every key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes generation fail for `key`.
    pub fn fail_for(&self, key: CompositeKey) {
        self.failing_keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key);
    }

    /// Makes every call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.switches.set_failing(failing);
    }

    /// Delays every call.
    pub fn set_delay(&self, delay: Duration) {
        self.switches.set_delay(delay);
    }

    /// Returns the number of calls attempted.
    pub fn call_count(&self) -> u64 {
        self.switches.calls()
    }

    fn check(&self, failing: bool, key: &CompositeKey) -> Result<(), CollaboratorError> {
        let listed = self
            .failing_keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(key);
        if failing || listed {
            return Err(CollaboratorError::Synthesis {
                entity_type: key.entity_type.to_string(),
                local_id: key.local_id.clone(),
                reason: "simulated generator failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PatternGenerator for MockPatternGenerator {
    async fn initial_metrics(
        &self,
        _entity_type: EntityType,
        attributes: &EntityAttributes,
    ) -> Result<MetricMap, CollaboratorError> {
        let failing = self.switches.enter().await;
        self.check(failing, &attributes.key)?;
        Ok(MetricMap::from([("mock.value".to_string(), 1.0)]))
    }

    async fn refresh_metrics(&self, entity: &Entity) -> Result<MetricMap, CollaboratorError> {
        let failing = self.switches.enter().await;
        self.check(failing, &entity.key)?;
        let refreshes = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MetricMap::from([
            ("mock.value".to_string(), 1.0),
            ("mock.refreshes".to_string(), refreshes as f64),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collector_switches() {
        let collector = MockCollector::new(vec![Sample::new("KafkaBrokerSample")]);
        assert_eq!(collector.collect().await.unwrap().len(), 1);

        collector.set_failing(true);
        assert!(collector.collect().await.is_err());
        assert_eq!(collector.collect_count(), 2);
    }

    #[tokio::test]
    async fn test_sink_records_batches() {
        let sink = MockSink::new();
        let entity = Entity::new(
            CompositeKey::cluster("AwsMsk", "prod"),
            "guid",
            "prod",
            EntitySource::Observed,
        );

        let ack = sink.send(&[entity.clone()]).await.unwrap();
        assert_eq!(ack.accepted, 1);
        assert_eq!(sink.last_batch(), Some(vec![entity]));

        sink.set_failing(true);
        assert!(sink.send(&[]).await.is_err());
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_health_check_toggle() {
        let check = MockHealthCheck::unhealthy();
        assert!(check.check().await.is_err());
        check.set_healthy(true);
        assert!(check.check().await.is_ok());
        assert_eq!(check.check_count(), 2);
    }

    #[tokio::test]
    async fn test_factory_failing_key() {
        let factory = MockEntityFactory::new();
        let key = CompositeKey::broker("AwsMsk", "prod", 1);
        factory.fail_for(key.clone());

        let attributes = EntityAttributes::for_key(key);
        assert!(factory.create(EntityType::Broker, &attributes).await.is_err());

        let other = EntityAttributes::for_key(CompositeKey::broker("AwsMsk", "prod", 2));
        assert!(factory.create(EntityType::Broker, &other).await.is_ok());
    }
}
