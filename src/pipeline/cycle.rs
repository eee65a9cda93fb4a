//! The end-to-end scheduling cycle.

use crate::circuit_breaker::CircuitState;
use crate::config::EngineConfig;
use crate::core::{
    ArcCollector, ArcEntityFactory, ArcPatternGenerator, ArcSink, DesiredTopology, RecoveryError,
    SampleNormalizer, SendAck,
};
use crate::events::{emit_cycle_completed, emit_cycle_failed};
use crate::health::{ComponentHealth, HealthAggregator, HealthStatus, SystemHealth};
use crate::hybrid::HybridMerger;
use crate::pipeline::guarded::{GuardedEntityFactory, GuardedPatternGenerator};
use crate::reconcile::CoverageReport;
use crate::recovery::{
    ComponentRole, ExecuteOptions, FallbackStrategy, OutcomeKind, RecoveryOrchestrator,
};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Roles a pipeline calls on every cycle.
const REQUIRED_ROLES: [ComponentRole; 4] = [
    ComponentRole::SampleCollector,
    ComponentRole::TelemetrySink,
    ComponentRole::EntityFactory,
    ComponentRole::PatternGenerator,
];

/// What one cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Unique id of the cycle, also used in audit records.
    pub cycle_id: Uuid,
    /// Samples returned by the collector (zero when it fell back).
    pub collected: usize,
    /// Observed entities written into the merged set.
    pub observed: usize,
    /// Placeholders dropped because the topology no longer asks for them.
    pub pruned: usize,
    /// Placeholders inserted for new gaps.
    pub filled: usize,
    /// Gaps that could not be filled.
    pub skipped: usize,
    /// Existing placeholders whose metrics were recomputed.
    pub refreshed: usize,
    /// Sink acknowledgement for the merged set.
    pub sent: SendAck,
    /// Coverage of the observed entities against the desired topology.
    pub coverage: CoverageReport,
    /// Whether the samples were fresh or a fallback.
    pub collect_outcome: OutcomeKind,
    /// Whether the send result was fresh.
    pub send_outcome: OutcomeKind,
    /// System health when the cycle finished.
    pub health: HealthStatus,
    /// Wall time of the cycle.
    pub duration: Duration,
}

/// Builder for a [`Pipeline`].
pub struct PipelineBuilder {
    orchestrator: Arc<RecoveryOrchestrator>,
    collector: Option<ArcCollector>,
    sink: Option<ArcSink>,
    factory: Option<ArcEntityFactory>,
    generator: Option<ArcPatternGenerator>,
    desired: Option<DesiredTopology>,
    normalizer: SampleNormalizer,
    merger: Option<Arc<HybridMerger>>,
    health: Option<Arc<HealthAggregator>>,
    send_retries: u32,
}

impl PipelineBuilder {
    /// Creates a builder around `orchestrator`.
    pub fn new(orchestrator: Arc<RecoveryOrchestrator>) -> Self {
        let defaults = EngineConfig::default();
        Self {
            orchestrator,
            collector: None,
            sink: None,
            factory: None,
            generator: None,
            desired: None,
            normalizer: SampleNormalizer::new(
                defaults.provider,
                defaults.account_id,
                defaults.default_cluster,
            ),
            merger: None,
            health: None,
            send_retries: 0,
        }
    }

    /// Sets the sample collector.
    pub fn with_collector(mut self, collector: ArcCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Sets the telemetry sink.
    pub fn with_sink(mut self, sink: ArcSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the entity factory used for gaps.
    pub fn with_entity_factory(mut self, factory: ArcEntityFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the pattern generator used for placeholders.
    pub fn with_pattern_generator(mut self, generator: ArcPatternGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Sets the desired topology.
    pub fn with_desired_topology(mut self, desired: DesiredTopology) -> Self {
        self.desired = Some(desired);
        self
    }

    /// Takes the provider, account and default cluster from `config`.
    pub fn with_engine_config(mut self, config: &EngineConfig) -> Self {
        self.normalizer = SampleNormalizer::new(
            config.provider.clone(),
            config.account_id.clone(),
            config.default_cluster.clone(),
        );
        self
    }

    /// Shares an existing merger instead of creating one.
    pub fn with_merger(mut self, merger: Arc<HybridMerger>) -> Self {
        self.merger = Some(merger);
        self
    }

    /// Reports the aggregator's latest snapshot in each cycle report.
    pub fn with_health(mut self, health: Arc<HealthAggregator>) -> Self {
        self.health = Some(health);
        self
    }

    /// Sets how many times a failed send is retried within a cycle.
    pub fn with_send_retries(mut self, retries: u32) -> Self {
        self.send_retries = retries;
        self
    }

    /// Builds the pipeline.
    ///
    /// Fails if a collaborator or the topology is missing, the topology is
    /// invalid, or the orchestrator does not guard one of the roles a cycle
    /// calls.
    pub fn build(self) -> Result<Pipeline, RecoveryError> {
        let missing = |what: &str| RecoveryError::configuration(format!("pipeline needs {what}"));

        let collector = self.collector.ok_or_else(|| missing("a sample collector"))?;
        let sink = self.sink.ok_or_else(|| missing("a telemetry sink"))?;
        let factory = self.factory.ok_or_else(|| missing("an entity factory"))?;
        let generator = self.generator.ok_or_else(|| missing("a pattern generator"))?;
        let desired = self.desired.ok_or_else(|| missing("a desired topology"))?;

        desired
            .validate()
            .map_err(|e| RecoveryError::configuration(e.to_string()))?;

        for role in REQUIRED_ROLES {
            if self.orchestrator.handle(role).is_err() {
                return Err(RecoveryError::configuration(format!(
                    "component '{role}' must be registered to run a pipeline"
                )));
            }
        }

        Ok(Pipeline {
            orchestrator: self.orchestrator,
            collector,
            sink,
            factory,
            generator,
            desired,
            normalizer: self.normalizer,
            merger: self.merger.unwrap_or_default(),
            health: self.health,
            send_retries: self.send_retries,
        })
    }
}

/// Runs collect, normalize, merge, fill, refresh and send as one cycle.
///
/// Every collaborator call goes through the orchestrator. A collector
/// outage degrades to an empty sample set so the merged topology is still
/// sent; a sink failure fails the cycle.
pub struct Pipeline {
    orchestrator: Arc<RecoveryOrchestrator>,
    collector: ArcCollector,
    sink: ArcSink,
    factory: ArcEntityFactory,
    generator: ArcPatternGenerator,
    desired: DesiredTopology,
    normalizer: SampleNormalizer,
    merger: Arc<HybridMerger>,
    health: Option<Arc<HealthAggregator>>,
    send_retries: u32,
}

impl Pipeline {
    /// Returns a builder.
    pub fn builder(orchestrator: Arc<RecoveryOrchestrator>) -> PipelineBuilder {
        PipelineBuilder::new(orchestrator)
    }

    /// Returns the merged entity set.
    pub fn merger(&self) -> &Arc<HybridMerger> {
        &self.merger
    }

    /// Returns the orchestrator.
    pub fn orchestrator(&self) -> &Arc<RecoveryOrchestrator> {
        &self.orchestrator
    }

    /// Returns the desired topology.
    pub fn desired_topology(&self) -> &DesiredTopology {
        &self.desired
    }

    /// Runs one cycle and writes its audit record.
    pub async fn run_cycle(&self) -> Result<CycleReport, RecoveryError> {
        let cycle_id = Uuid::new_v4();
        match self.cycle(cycle_id).await {
            Ok(report) => {
                emit_cycle_completed(&report);
                Ok(report)
            }
            Err(error) => {
                emit_cycle_failed(&cycle_id, &error);
                Err(error)
            }
        }
    }

    /// Runs a cycle every `interval` until `shutdown` is cancelled.
    ///
    /// A failed cycle does not stop the loop. Returns the number of cycles
    /// started.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    cycles += 1;
                    if let Err(error) = self.run_cycle().await {
                        tracing::debug!(cycle = cycles, error = %error, "Continuing after failed cycle");
                    }
                }
            }
        }

        tracing::info!(cycles, "Pipeline stopped");
        cycles
    }

    async fn cycle(&self, cycle_id: Uuid) -> Result<CycleReport, RecoveryError> {
        let started = Instant::now();

        let samples = self
            .orchestrator
            .execute(
                ComponentRole::SampleCollector,
                || self.collector.collect(),
                ExecuteOptions::new().with_fallback(FallbackStrategy::degrade_empty()),
            )
            .await?;
        let collect_outcome = samples.kind();
        let samples = samples.into_inner();

        let observed = self
            .merger
            .update_infrastructure_entities(self.normalizer.normalize_all(&samples));
        let pruned = self.merger.prune_synthesized(&self.desired).len();

        let factory = GuardedEntityFactory::new(&self.orchestrator, self.factory.as_ref());
        let generator = GuardedPatternGenerator::new(&self.orchestrator, self.generator.as_ref());

        // Placeholders created below are refreshed from the next cycle on.
        let refresh = self.merger.refresh_synthesized(&generator).await;
        let fill = self
            .merger
            .analyze_and_fill_gaps(&self.desired, &factory, &generator)
            .await;

        let entities = self.merger.all_entities();
        let sent = self
            .orchestrator
            .execute(
                ComponentRole::TelemetrySink,
                || self.sink.send(&entities),
                ExecuteOptions::new().with_retries(self.send_retries),
            )
            .await?;

        Ok(CycleReport {
            cycle_id,
            collected: samples.len(),
            observed,
            pruned,
            filled: fill.filled,
            skipped: fill.skipped_count(),
            refreshed: refresh.refreshed,
            send_outcome: sent.kind(),
            sent: sent.into_inner(),
            coverage: fill.coverage,
            collect_outcome,
            health: self.health_status(),
            duration: started.elapsed(),
        })
    }

    /// Latest aggregated status, or an estimate from the breakers when no
    /// aggregator snapshot exists yet.
    fn health_status(&self) -> HealthStatus {
        if let Some(snapshot) = self.health.as_ref().and_then(|h| h.system_health()) {
            return snapshot.status;
        }

        let components = self
            .orchestrator
            .roles()
            .into_iter()
            .filter_map(|role| {
                let handle = self.orchestrator.handle(role).ok()?;
                let circuit_state = self.orchestrator.breaker(role).ok()?.snapshot().state;
                let status = match circuit_state {
                    CircuitState::Closed => HealthStatus::Healthy,
                    CircuitState::HalfOpen => HealthStatus::Degraded,
                    CircuitState::Open => HealthStatus::Unhealthy,
                };
                Some(ComponentHealth {
                    name: role,
                    status,
                    circuit_state,
                    critical: handle.critical,
                    last_checked_at: None,
                    last_error: None,
                    latency_ms: None,
                })
            })
            .collect();
        SystemHealth::from_components(components).status
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("orchestrator", &self.orchestrator)
            .field("desired_entities", &self.desired.len())
            .field("merged_entities", &self.merger.len())
            .field("send_retries", &self.send_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::collaborators::{
        MockCollector, MockEntityFactory, MockHealthCheck, MockPatternGenerator, MockSink,
    };
    use crate::core::{CompositeKey, DesiredCluster, EntitySource, Sample};
    use crate::events::EventBus;
    use crate::recovery::{
        ComponentHandle, ComponentKind, ComponentRegistry, OrchestratorConfig,
    };

    struct Fixture {
        pipeline: Arc<Pipeline>,
        collector: Arc<MockCollector>,
        sink: Arc<MockSink>,
        factory: Arc<MockEntityFactory>,
    }

    fn orchestrator(collector_circuit: CircuitBreakerConfig) -> Arc<RecoveryOrchestrator> {
        let handle = |kind| ComponentHandle::new(kind, Arc::new(MockHealthCheck::healthy()));
        let registry = ComponentRegistry::builder()
            .register(
                ComponentRole::SampleCollector,
                handle(ComponentKind::Source)
                    .critical(true)
                    .with_circuit(collector_circuit),
            )
            .register(
                ComponentRole::TelemetrySink,
                handle(ComponentKind::Sink).critical(true),
            )
            .register(ComponentRole::EntityFactory, handle(ComponentKind::Synthesis))
            .register(ComponentRole::PatternGenerator, handle(ComponentKind::Synthesis))
            .build()
            .unwrap();
        Arc::new(
            RecoveryOrchestrator::new(
                registry,
                OrchestratorConfig::default(),
                Arc::new(EventBus::new()),
            )
            .unwrap(),
        )
    }

    fn desired() -> DesiredTopology {
        DesiredTopology::new("AwsMsk")
            .with_cluster(DesiredCluster::new("prod").with_brokers([1, 2, 3]))
    }

    fn samples() -> Vec<Sample> {
        vec![
            Sample::new("KafkaClusterSample").with("clusterName", "prod"),
            Sample::new("KafkaBrokerSample")
                .with("clusterName", "prod")
                .with("broker.id", 1)
                .with("bytesIn", 42.0),
        ]
    }

    fn fixture(collector_circuit: CircuitBreakerConfig) -> Fixture {
        let collector = Arc::new(MockCollector::new(samples()));
        let sink = Arc::new(MockSink::new());
        let factory = Arc::new(MockEntityFactory::new());
        let pipeline = Pipeline::builder(orchestrator(collector_circuit))
            .with_collector(collector.clone())
            .with_sink(sink.clone())
            .with_entity_factory(factory.clone())
            .with_pattern_generator(Arc::new(MockPatternGenerator::new()))
            .with_desired_topology(desired())
            .build()
            .unwrap();

        Fixture {
            pipeline: Arc::new(pipeline),
            collector,
            sink,
            factory,
        }
    }

    #[tokio::test]
    async fn test_cycle_fills_gaps_and_sends() {
        let f = fixture(CircuitBreakerConfig::default());

        let report = f.pipeline.run_cycle().await.unwrap();

        assert_eq!(report.collected, 2);
        assert_eq!(report.observed, 2);
        assert_eq!(report.filled, 2);
        assert_eq!(report.coverage.overall.coverage, 50);
        assert_eq!(report.collect_outcome, OutcomeKind::Fresh);
        assert_eq!(report.send_outcome, OutcomeKind::Fresh);
        assert_eq!(report.sent.accepted, 4);
        assert_eq!(report.health, HealthStatus::Healthy);

        let batch = f.sink.last_batch().unwrap();
        assert_eq!(batch.len(), 4);
        let observed = batch.iter().filter(|e| e.is_observed()).count();
        assert_eq!(observed, 2);
    }

    #[tokio::test]
    async fn test_second_cycle_refreshes_existing_placeholders() {
        let f = fixture(CircuitBreakerConfig::default());

        let first = f.pipeline.run_cycle().await.unwrap();
        assert_eq!(first.refreshed, 0);

        let second = f.pipeline.run_cycle().await.unwrap();
        assert_eq!(second.filled, 0);
        assert_eq!(second.refreshed, 2);
        assert_eq!(f.factory.create_count(), 2);

        let counts = f.pipeline.merger().source_counts();
        assert_eq!(counts.observed, 2);
        assert_eq!(counts.synthesized_refresh, 2);
    }

    #[tokio::test]
    async fn test_collector_outage_still_sends_merged_topology() {
        let f = fixture(CircuitBreakerConfig::default());
        f.pipeline.run_cycle().await.unwrap();

        f.collector.set_failing(true);
        let report = f.pipeline.run_cycle().await.unwrap();

        assert_eq!(report.collect_outcome, OutcomeKind::Degraded);
        assert_eq!(report.collected, 0);
        assert_eq!(f.sink.last_batch().unwrap().len(), 4);
        let broker = f
            .pipeline
            .merger()
            .get(&CompositeKey::broker("AwsMsk", "prod", 1))
            .unwrap();
        assert_eq!(broker.source, EntitySource::Observed);
    }

    #[tokio::test]
    async fn test_open_collector_circuit_skips_collection() {
        let f = fixture(CircuitBreakerConfig::default().with_failure_threshold(1));
        f.collector.set_failing(true);

        let first = f.pipeline.run_cycle().await.unwrap();
        assert_eq!(first.collect_outcome, OutcomeKind::Degraded);
        assert_eq!(first.health, HealthStatus::Unhealthy);

        let second = f.pipeline.run_cycle().await.unwrap();
        assert_eq!(second.collect_outcome, OutcomeKind::Degraded);
        assert_eq!(f.collector.collect_count(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_fails_cycle() {
        let f = fixture(CircuitBreakerConfig::default());
        f.sink.set_failing(true);

        let err = f.pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, RecoveryError::Operation { .. }));
        assert_eq!(err.component(), Some("telemetry_sink"));

        // The merged set is kept for the next attempt.
        assert_eq!(f.pipeline.merger().len(), 4);
    }

    #[tokio::test]
    async fn test_factory_failure_skips_gap_only() {
        let f = fixture(CircuitBreakerConfig::default());
        f.factory.fail_for(CompositeKey::broker("AwsMsk", "prod", 3));

        let report = f.pipeline.run_cycle().await.unwrap();
        assert_eq!(report.filled, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(f.sink.last_batch().unwrap().len(), 3);
    }

    #[test]
    fn test_builder_requires_registered_roles() {
        let registry = ComponentRegistry::builder()
            .register(
                ComponentRole::TelemetrySink,
                ComponentHandle::new(ComponentKind::Sink, Arc::new(MockHealthCheck::healthy())),
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

        let result = Pipeline::builder(orchestrator)
            .with_collector(Arc::new(MockCollector::default()))
            .with_sink(Arc::new(MockSink::new()))
            .with_entity_factory(Arc::new(MockEntityFactory::new()))
            .with_pattern_generator(Arc::new(MockPatternGenerator::new()))
            .with_desired_topology(desired())
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("sample_collector"));
    }

    #[test]
    fn test_builder_requires_topology() {
        let result = Pipeline::builder(orchestrator(CircuitBreakerConfig::default()))
            .with_collector(Arc::new(MockCollector::default()))
            .with_sink(Arc::new(MockSink::new()))
            .with_entity_factory(Arc::new(MockEntityFactory::new()))
            .with_pattern_generator(Arc::new(MockPatternGenerator::new()))
            .build();
        assert!(matches!(result, Err(RecoveryError::Configuration { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled() {
        let f = fixture(CircuitBreakerConfig::default());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn({
            let pipeline = f.pipeline.clone();
            let shutdown = shutdown.clone();
            async move { pipeline.run(Duration::from_secs(1), shutdown).await }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.cancel();
        let cycles = task.await.unwrap();

        assert_eq!(cycles, 3);
        assert_eq!(f.sink.send_count(), 3);
    }
}
