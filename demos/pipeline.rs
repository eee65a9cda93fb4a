//! Pipeline example running a few cycles through simulated outages.
//!
//! This example shows how to:
//! - Register components with their own breaker settings
//! - Build a pipeline around the recovery orchestrator
//! - Keep sending a complete topology while the collector is down
//! - Watch breakers open and close through lifecycle events
//!
//! Run with: RUST_LOG=queuebridge=debug cargo run --example pipeline

use queuebridge::collaborators::{
    BaselinePatternGenerator, MockCollector, MockHealthCheck, MockSink, MskEntityFactory,
};
use queuebridge::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn samples() -> Vec<Sample> {
    vec![
        Sample::new("AwsMskClusterSample")
            .with("provider.clusterName", "orders-prod")
            .with("provider.activeControllerCount.Sum", 1.0),
        Sample::new("AwsMskBrokerSample")
            .with("provider.clusterName", "orders-prod")
            .with("provider.brokerId", 1)
            .with("provider.bytesInPerSec.Average", 5120.0),
        Sample::new("AwsMskTopicSample")
            .with("provider.clusterName", "orders-prod")
            .with("topic.name", "orders")
            .with("provider.bytesInPerSec.Sum", 2048.0),
    ]
}

fn print_report(label: &str, report: &CycleReport) {
    println!("{label}:");
    println!(
        "  collected {} samples ({}), filled {}, refreshed {}, skipped {}",
        report.collected,
        report.collect_outcome,
        report.filled,
        report.refreshed,
        report.skipped
    );
    println!(
        "  coverage {}%, sent {} entities, health {}",
        report.coverage.overall.coverage, report.sent.accepted, report.health
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("queuebridge=info")),
        )
        .init();

    println!("=== Pipeline Example ===\n");

    let config = EngineConfig::new().with_circuit(
        CircuitBreakerConfig::default()
            .with_failure_threshold(2)
            .with_open_timeout(Duration::from_secs(1)),
    );

    let collector = Arc::new(MockCollector::new(samples()));
    let sink = Arc::new(MockSink::new());
    let collector_check = Arc::new(MockHealthCheck::healthy());

    let registry = ComponentRegistry::builder()
        .with_default_circuit(config.circuit.clone())
        .register(
            ComponentRole::SampleCollector,
            ComponentHandle::new(ComponentKind::Source, collector_check.clone()).critical(true),
        )
        .register(
            ComponentRole::TelemetrySink,
            ComponentHandle::new(ComponentKind::Sink, Arc::new(MockHealthCheck::healthy()))
                .critical(true),
        )
        .register(
            ComponentRole::EntityFactory,
            ComponentHandle::new(ComponentKind::Synthesis, Arc::new(MockHealthCheck::healthy())),
        )
        .register(
            ComponentRole::PatternGenerator,
            ComponentHandle::new(ComponentKind::Synthesis, Arc::new(MockHealthCheck::healthy())),
        )
        .build()?;

    let events = Arc::new(EventBus::with_audit_log());
    events.on_event(EventKind::CircuitOpened, |event| {
        println!("  >> circuit opened for {:?}", event.component());
    });
    events.on_event(EventKind::CircuitClosed, |event| {
        println!("  >> circuit closed for {:?}", event.component());
    });

    let orchestrator = Arc::new(RecoveryOrchestrator::new(
        registry,
        config.orchestrator.clone(),
        events,
    )?);
    let health = Arc::new(HealthAggregator::new(
        orchestrator.clone(),
        config.health.clone(),
    )?);

    let desired = DesiredTopology::new("AwsMsk").with_cluster(
        DesiredCluster::new("orders-prod")
            .with_brokers([1, 2, 3])
            .with_topics(["orders", "payments"]),
    );

    let pipeline = Pipeline::builder(orchestrator.clone())
        .with_engine_config(&config)
        .with_collector(collector.clone())
        .with_sink(sink.clone())
        .with_entity_factory(Arc::new(MskEntityFactory::new(config.account_id.clone())))
        .with_pattern_generator(Arc::new(BaselinePatternGenerator::new()))
        .with_desired_topology(desired)
        .with_health(health.clone())
        .build()?;

    let report = pipeline.run_cycle().await?;
    print_report("Cycle 1 (all healthy)", &report);

    println!("\nSimulating a collector outage...");
    collector.set_failing(true);
    collector_check.set_healthy(false);
    for cycle in 2..=3 {
        let report = pipeline.run_cycle().await?;
        print_report(&format!("Cycle {cycle} (collector down)"), &report);
    }

    let snapshot = health.check_now().await;
    println!("\nSystem health: {}", snapshot.status);
    for issue in &snapshot.issues {
        println!("  - {issue}");
    }

    println!("\nCollector recovers; waiting for the breaker to allow a probe...");
    collector.set_failing(false);
    collector_check.set_healthy(true);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    for cycle in 4..=5 {
        let report = pipeline.run_cycle().await?;
        print_report(&format!("Cycle {cycle} (recovering)"), &report);
    }

    let counts = pipeline.merger().source_counts();
    println!(
        "\nMerged set: {} observed, {} synthesized, {} refreshed placeholders",
        counts.observed, counts.synthesized, counts.synthesized_refresh
    );

    println!("\nRecovery stats:");
    for (role, stats) in orchestrator.recovery_stats() {
        println!(
            "  {role}: {} attempts, {} fallbacks, circuit {}",
            stats.stats.attempts, stats.stats.fallbacks, stats.circuit.state
        );
    }

    println!("\nSink received {} batches", sink.batches().len());
    Ok(())
}
