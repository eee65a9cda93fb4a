//! Observed-versus-desired topology diff.

use crate::core::{CompositeKey, DesiredEntity, DesiredTopology, Entity, EntityType};
use crate::reconcile::coverage::{CoverageReport, TypeCoverage};

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The result of comparing observed entities to a desired topology.
#[derive(Debug, Clone, PartialEq)]
pub struct GapAnalysis {
    /// Desired entities with no observed counterpart, in topology order.
    pub missing_entities: Vec<DesiredEntity>,
    /// Observed entities the topology does not ask for, sorted by key.
    pub extra_entities: Vec<CompositeKey>,
    /// Coverage counts.
    pub coverage_report: CoverageReport,
}

impl GapAnalysis {
    /// Returns `true` if nothing is missing.
    pub fn is_complete(&self) -> bool {
        self.missing_entities.is_empty()
    }
}

/// Diffs observed entities against a desired topology.
///
/// The reconciler is stateless and side-effect free: extra entities are
/// reported, never removed, and the same inputs always give the same
/// analysis.
///
/// # Example
///
/// ```rust
/// use queuebridge::core::{DesiredCluster, DesiredTopology};
/// use queuebridge::reconcile::TopologyReconciler;
///
/// let desired = DesiredTopology::new("AwsMsk")
///     .with_cluster(DesiredCluster::new("prod").with_brokers([1, 2]));
///
/// let analysis = TopologyReconciler::new().analyze_gaps(&[], &desired);
/// assert_eq!(analysis.missing_entities.len(), 3);
/// assert_eq!(analysis.coverage_report.overall.coverage, 0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyReconciler;

impl TopologyReconciler {
    /// Creates a reconciler.
    pub fn new() -> Self {
        Self
    }

    /// Compares `observed` with `desired`.
    ///
    /// Observed entities are looked up by composite key; when several share a
    /// key, the last one wins.
    pub fn analyze_gaps(&self, observed: &[Entity], desired: &DesiredTopology) -> GapAnalysis {
        let lookup: HashMap<&CompositeKey, &Entity> =
            observed.iter().map(|entity| (&entity.key, entity)).collect();

        let wanted = desired.entities();
        let wanted_keys: BTreeSet<&CompositeKey> = wanted.iter().map(|e| &e.key).collect();

        let mut counts: BTreeMap<EntityType, (usize, usize)> = EntityType::ALL
            .iter()
            .map(|entity_type| (*entity_type, (0, 0)))
            .collect();
        let mut missing_entities = Vec::new();

        for entity in &wanted {
            let slot = counts.entry(entity.entity_type()).or_insert((0, 0));
            slot.0 += 1;
            if lookup.contains_key(&entity.key) {
                slot.1 += 1;
            } else {
                missing_entities.push(entity.clone());
            }
        }

        let extra_entities: Vec<CompositeKey> = lookup
            .keys()
            .filter(|key| !wanted_keys.contains(*key))
            .map(|key| (*key).clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let by_type: BTreeMap<EntityType, TypeCoverage> = counts
            .into_iter()
            .map(|(entity_type, (desired, matched))| {
                (entity_type, TypeCoverage::new(desired, matched))
            })
            .collect();
        let overall = TypeCoverage::new(wanted.len(), wanted.len() - missing_entities.len());

        let coverage_report = CoverageReport {
            missing: missing_entities.len(),
            extra: extra_entities.len(),
            by_type,
            overall,
        };

        tracing::debug!(
            desired = wanted.len(),
            missing = coverage_report.missing,
            extra = coverage_report.extra,
            coverage = coverage_report.overall.coverage,
            "Topology analyzed"
        );

        GapAnalysis {
            missing_entities,
            extra_entities,
            coverage_report,
        }
    }
}
