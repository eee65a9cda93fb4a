//! End-to-end cycles with file-based configuration and the MSK collaborators.

use queuebridge::collaborators::{
    BaselinePatternGenerator, MockCollector, MockHealthCheck, MockSink, MskEntityFactory,
};
use queuebridge::prelude::*;
use queuebridge::recovery::OutcomeKind;

use std::io::Write;
use std::sync::Arc;

const ENGINE: &str = r#"
account_id = "210987654321"
default_cluster = "orders-prod"

[circuit]
failure_threshold = 2
success_threshold = 1
open_timeout_ms = 60000

[orchestrator]
max_concurrent_recoveries = 2
default_timeout_ms = 2000
"#;

const TOPOLOGY: &str = r#"
provider = "AwsMsk"

[[clusters]]
name = "orders-prod"
brokers = [1, 2]
topics = ["orders", "payments"]
"#;

fn registry(config: &EngineConfig) -> ComponentRegistry {
    let handle = |kind| ComponentHandle::new(kind, Arc::new(MockHealthCheck::healthy()));
    ComponentRegistry::builder()
        .with_default_circuit(config.circuit.clone())
        .register(
            ComponentRole::SampleCollector,
            handle(ComponentKind::Source).critical(true),
        )
        .register(
            ComponentRole::TelemetrySink,
            handle(ComponentKind::Sink).critical(true),
        )
        .register(ComponentRole::EntityFactory, handle(ComponentKind::Synthesis))
        .register(ComponentRole::PatternGenerator, handle(ComponentKind::Synthesis))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_cycles_with_file_configuration() {
    let config = EngineConfig::from_toml_str(ENGINE).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TOPOLOGY.as_bytes()).unwrap();
    let desired = DesiredTopology::load(file.path()).unwrap();

    let collector = Arc::new(MockCollector::new(vec![
        Sample::new("AwsMskBrokerSample")
            .with("provider.brokerId", 1)
            .with("provider.bytesInPerSec.Average", 900.0),
        Sample::new("KafkaTopicSample").with("topic.name", "orders"),
    ]));
    let sink = Arc::new(MockSink::new());

    let orchestrator = Arc::new(
        RecoveryOrchestrator::new(
            registry(&config),
            config.orchestrator.clone(),
            Arc::new(EventBus::with_audit_log()),
        )
        .unwrap(),
    );
    let pipeline = Pipeline::builder(orchestrator.clone())
        .with_engine_config(&config)
        .with_collector(collector.clone())
        .with_sink(sink.clone())
        .with_entity_factory(Arc::new(MskEntityFactory::new(config.account_id.clone())))
        .with_pattern_generator(Arc::new(BaselinePatternGenerator::new()))
        .with_desired_topology(desired)
        .build()
        .unwrap();

    // Desired: cluster, 2 brokers, 2 topics. Observed: broker 1 and "orders".
    let first = pipeline.run_cycle().await.unwrap();
    assert_eq!(first.coverage.overall.coverage, 40);
    assert_eq!(first.filled, 3);
    assert_eq!(first.sent.accepted, 5);

    let placeholder = pipeline
        .merger()
        .get(&CompositeKey::broker("AwsMsk", "orders-prod", 2))
        .unwrap();
    assert!(placeholder.guid.starts_with("210987654321|INFRA|AWSMSKBROKER|"));
    assert_eq!(
        placeholder.metrics.get("provider.leaderCount"),
        Some(&10.0)
    );

    // Two collector failures open its breaker; the third cycle skips it.
    collector.set_failing(true);
    for _ in 0..3 {
        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.collect_outcome, OutcomeKind::Degraded);
        assert_eq!(report.sent.accepted, 5);
    }
    assert_eq!(collector.collect_count(), 3);
    assert!(orchestrator
        .breaker(ComponentRole::SampleCollector)
        .unwrap()
        .state()
        .is_open());

    let batch = sink.last_batch().unwrap();
    let observed: Vec<&Entity> = batch.iter().filter(|e| e.is_observed()).collect();
    assert_eq!(observed.len(), 2);
    assert!(batch
        .iter()
        .filter(|e| e.is_synthesized())
        .all(|e| e.source == EntitySource::SynthesizedRefresh));
}

#[test]
fn test_invalid_engine_config_is_rejected() {
    let result = EngineConfig::from_toml_str("[circuit]\nfailure_threshold = 0\n");
    assert!(matches!(result, Err(RecoveryError::Configuration { .. })));
}
