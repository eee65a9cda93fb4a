//! Reconciliation and merging of observed and synthesized entities.

use queuebridge::collaborators::{MockEntityFactory, MockPatternGenerator};
use queuebridge::core::{
    CompositeKey, DesiredCluster, DesiredTopology, Entity, EntitySource, EntityType,
};
use queuebridge::hybrid::HybridMerger;
use queuebridge::reconcile::TopologyReconciler;

use std::collections::HashSet;
use std::time::Duration;

fn observed(key: CompositeKey) -> Entity {
    let name = key.local_id.clone();
    Entity::new(key, "guid", name, EntitySource::Observed)
}

fn three_brokers() -> DesiredTopology {
    DesiredTopology::new("AwsMsk")
        .with_cluster(DesiredCluster::new("prod").with_brokers([1, 2, 3]))
}

fn assert_unique(entities: &[Entity]) {
    let keys: HashSet<&CompositeKey> = entities.iter().map(|e| &e.key).collect();
    assert_eq!(keys.len(), entities.len(), "duplicate composite keys");
}

#[tokio::test]
async fn test_partial_observation_is_filled_to_desired() {
    let merger = HybridMerger::new();
    merger.update_infrastructure_entities([
        observed(CompositeKey::cluster("AwsMsk", "prod")),
        observed(CompositeKey::broker("AwsMsk", "prod", 1)),
    ]);

    let analysis = merger.analyze(&three_brokers());
    assert_eq!(analysis.coverage_report.overall.coverage, 50);
    let missing: Vec<CompositeKey> = analysis
        .missing_entities
        .iter()
        .map(|e| e.key.clone())
        .collect();
    assert_eq!(
        missing,
        vec![
            CompositeKey::broker("AwsMsk", "prod", 2),
            CompositeKey::broker("AwsMsk", "prod", 3),
        ]
    );

    let summary = merger
        .analyze_and_fill_gaps(
            &three_brokers(),
            &MockEntityFactory::new(),
            &MockPatternGenerator::new(),
        )
        .await;
    assert_eq!(summary.filled, 2);
    assert_eq!(summary.coverage.overall.coverage, 50);

    let all = merger.all_entities();
    assert_eq!(all.len(), 4);
    assert_eq!(all.iter().filter(|e| e.is_observed()).count(), 2);
    assert_eq!(
        all.iter()
            .filter(|e| e.source == EntitySource::Synthesized)
            .count(),
        2
    );
    assert_unique(&all);
}

#[tokio::test]
async fn test_observed_update_replaces_placeholder() {
    let merger = HybridMerger::new();
    let factory = MockEntityFactory::new();
    let generator = MockPatternGenerator::new();

    merger
        .analyze_and_fill_gaps(&three_brokers(), &factory, &generator)
        .await;
    merger.refresh_synthesized(&generator).await;

    let key = CompositeKey::broker("AwsMsk", "prod", 2);
    assert_eq!(
        merger.get(&key).unwrap().source,
        EntitySource::SynthesizedRefresh
    );

    merger.update_infrastructure_entities([observed(key.clone()).with_metric("bytesIn", 7.0)]);
    let stored = merger.get(&key).unwrap();
    assert_eq!(stored.source, EntitySource::Observed);
    assert_eq!(stored.metrics.get("bytesIn"), Some(&7.0));

    // Later fills and refreshes leave it alone.
    merger
        .analyze_and_fill_gaps(&three_brokers(), &factory, &generator)
        .await;
    merger.refresh_synthesized(&generator).await;
    let stored = merger.get(&key).unwrap();
    assert_eq!(stored.source, EntitySource::Observed);
    assert_eq!(stored.metrics.get("bytesIn"), Some(&7.0));
    assert_unique(&merger.all_entities());
}

#[tokio::test(start_paused = true)]
async fn test_observation_during_fill_wins() {
    let merger = HybridMerger::new();
    let factory = MockEntityFactory::new();
    factory.set_delay(Duration::from_millis(50));
    let generator = MockPatternGenerator::new();
    let late = CompositeKey::broker("AwsMsk", "prod", 2);

    let desired = three_brokers();
    let (summary, _) = futures::join!(
        merger.analyze_and_fill_gaps(&desired, &factory, &generator),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            merger.update_infrastructure_entities([observed(late.clone())])
        }
    );

    // Cluster and brokers 1 and 3 are placeholders; broker 2 arrived first.
    assert_eq!(summary.filled, 3);
    assert_eq!(merger.get(&late).unwrap().source, EntitySource::Observed);
    assert_eq!(merger.len(), 4);
    assert_unique(&merger.all_entities());
}

#[test]
fn test_coverage_is_idempotent() {
    let reconciler = TopologyReconciler::new();
    let desired = DesiredTopology::new("AwsMsk").with_cluster(
        DesiredCluster::new("prod")
            .with_brokers([1, 2])
            .with_topics(["orders", "payments", "audit"]),
    );
    let entities = vec![
        observed(CompositeKey::cluster("AwsMsk", "prod")),
        observed(CompositeKey::topic("AwsMsk", "prod", "orders")),
        observed(CompositeKey::topic("AwsMsk", "staging", "orders")),
    ];

    let first = reconciler.analyze_gaps(&entities, &desired);
    let second = reconciler.analyze_gaps(&entities, &desired);

    assert_eq!(
        first.coverage_report.overall.coverage,
        second.coverage_report.overall.coverage
    );
    assert_eq!(first.coverage_report, second.coverage_report);
    assert_eq!(first.coverage_report.overall.coverage, 33);
    assert_eq!(
        first.extra_entities,
        vec![CompositeKey::topic("AwsMsk", "staging", "orders")]
    );
    assert_eq!(
        first.coverage_report.for_type(EntityType::Topic).matched,
        1
    );
}

#[tokio::test]
async fn test_topology_change_prunes_placeholders_only() {
    let merger = HybridMerger::new();
    merger.update_infrastructure_entities([observed(CompositeKey::broker("AwsMsk", "prod", 1))]);
    merger
        .analyze_and_fill_gaps(
            &three_brokers(),
            &MockEntityFactory::new(),
            &MockPatternGenerator::new(),
        )
        .await;

    let shrunk = DesiredTopology::new("AwsMsk")
        .with_cluster(DesiredCluster::new("prod").with_brokers([2]));
    let pruned = merger.prune_synthesized(&shrunk);

    assert_eq!(pruned, vec![CompositeKey::broker("AwsMsk", "prod", 3)]);
    assert!(merger.get(&CompositeKey::broker("AwsMsk", "prod", 1)).is_some());
    assert!(merger.get(&CompositeKey::broker("AwsMsk", "prod", 2)).is_some());
    assert!(merger.get(&CompositeKey::cluster("AwsMsk", "prod")).is_some());
}
