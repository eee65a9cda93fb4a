//! The merged observed + synthesized entity set.

use crate::core::{
    CompositeKey, DesiredTopology, Entity, EntityFactory, EntitySource, GapFillError,
    GapFillStage, PatternGenerator,
};
use crate::events::{emit_gap_fill, emit_synthesized_pruned};
use crate::reconcile::{CoverageReport, GapAnalysis, TopologyReconciler};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Result of a gap fill pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FillSummary {
    /// Coverage of the observed entities before filling.
    pub coverage: CoverageReport,
    /// Number of placeholders inserted.
    pub filled: usize,
    /// Number of gaps already held by a placeholder.
    pub already_synthesized: usize,
    /// Gaps that could not be filled.
    pub skipped: Vec<GapFillError>,
}

impl FillSummary {
    /// Returns the number of skipped gaps.
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Result of a refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSummary {
    /// Placeholders whose metrics were recomputed.
    pub refreshed: usize,
    /// Placeholders the generator failed on.
    pub failed: usize,
}

/// Entity counts by source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    /// Entities built from real samples.
    pub observed: usize,
    /// Placeholders never refreshed.
    pub synthesized: usize,
    /// Placeholders refreshed at least once.
    pub synthesized_refresh: usize,
}

impl SourceCounts {
    /// Returns the total number of entities.
    pub fn total(&self) -> usize {
        self.observed + self.synthesized + self.synthesized_refresh
    }
}

/// Owns the authoritative merged entity set.
///
/// Holds at most one entity per composite key. An observed entity always
/// replaces a placeholder at the same key, and a placeholder is never
/// written over an observed entity. The map lock is never held across an
/// `.await`, so every insert re-checks the key.
#[derive(Debug, Default)]
pub struct HybridMerger {
    entities: RwLock<BTreeMap<CompositeKey, Entity>>,
    reconciler: TopologyReconciler,
}

impl HybridMerger {
    /// Creates an empty merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts real entities, replacing any placeholder at the same key.
    ///
    /// Returns the number of entities written.
    pub fn update_infrastructure_entities<I>(&self, entities: I) -> usize
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut map = self.write();
        let mut written = 0;
        let mut replaced = 0;

        for mut entity in entities {
            entity.source = EntitySource::Observed;
            entity.updated_at = Utc::now();
            if let Some(previous) = map.insert(entity.key.clone(), entity) {
                if previous.is_synthesized() {
                    replaced += 1;
                }
            }
            written += 1;
        }

        if replaced > 0 {
            tracing::debug!(replaced, "Observed entities replaced placeholders");
        }
        written
    }

    /// Compares the observed entities with `desired`.
    pub fn analyze(&self, desired: &DesiredTopology) -> GapAnalysis {
        self.reconciler
            .analyze_gaps(&self.observed_entities(), desired)
    }

    /// Fills every gap between the observed entities and `desired` with a
    /// placeholder.
    ///
    /// Gaps that already hold a placeholder are left alone. A gap whose
    /// factory or generator call fails is skipped and reported in the
    /// summary; the other gaps are still filled.
    pub async fn analyze_and_fill_gaps(
        &self,
        desired: &DesiredTopology,
        factory: &dyn EntityFactory,
        generator: &dyn PatternGenerator,
    ) -> FillSummary {
        let analysis = self.analyze(desired);
        let mut summary = FillSummary {
            coverage: analysis.coverage_report,
            filled: 0,
            already_synthesized: 0,
            skipped: Vec::new(),
        };

        for gap in analysis.missing_entities {
            if self.read().contains_key(&gap.key) {
                summary.already_synthesized += 1;
                continue;
            }

            let entity_type = gap.entity_type();
            let mut entity = match factory.create(entity_type, &gap.attributes).await {
                Ok(entity) => entity,
                Err(e) => {
                    summary.skipped.push(skip(&gap.key, GapFillStage::Factory, e));
                    continue;
                }
            };

            if entity.key != gap.key {
                let reason = format!("factory returned an entity for {}", entity.key);
                summary.skipped.push(skip(&gap.key, GapFillStage::KeyMismatch, reason));
                continue;
            }

            entity.metrics = match generator.initial_metrics(entity_type, &gap.attributes).await {
                Ok(metrics) => metrics,
                Err(e) => {
                    summary.skipped.push(skip(&gap.key, GapFillStage::Generator, e));
                    continue;
                }
            };
            entity.source = EntitySource::Synthesized;
            entity.updated_at = Utc::now();

            let mut map = self.write();
            match map.get(&gap.key) {
                Some(existing) if existing.is_observed() => {
                    tracing::debug!(key = %gap.key, "Entity observed during gap fill; placeholder dropped");
                }
                Some(_) => summary.already_synthesized += 1,
                None => {
                    map.insert(gap.key, entity);
                    summary.filled += 1;
                }
            }
        }

        emit_gap_fill(&summary);
        summary
    }

    /// Recomputes metrics for every placeholder.
    ///
    /// A refreshed placeholder is tagged `synthesized_refresh`. Observed
    /// entities are not touched.
    pub async fn refresh_synthesized(&self, generator: &dyn PatternGenerator) -> RefreshSummary {
        let placeholders: Vec<Entity> = self
            .read()
            .values()
            .filter(|entity| entity.is_synthesized())
            .cloned()
            .collect();

        let mut summary = RefreshSummary::default();
        for placeholder in placeholders {
            let metrics = match generator.refresh_metrics(&placeholder).await {
                Ok(metrics) => metrics,
                Err(e) => {
                    tracing::warn!(key = %placeholder.key, error = %e, "Placeholder refresh failed");
                    summary.failed += 1;
                    continue;
                }
            };

            let mut map = self.write();
            if let Some(entity) = map.get_mut(&placeholder.key) {
                // Replaced by an observed entity while the generator ran.
                if !entity.is_synthesized() {
                    continue;
                }
                entity.metrics = metrics;
                entity.source = EntitySource::SynthesizedRefresh;
                entity.updated_at = Utc::now();
                summary.refreshed += 1;
            }
        }
        summary
    }

    /// Drops placeholders that `desired` no longer asks for.
    ///
    /// Observed entities are never dropped. Returns the dropped keys.
    pub fn prune_synthesized(&self, desired: &DesiredTopology) -> Vec<CompositeKey> {
        let wanted: BTreeSet<CompositeKey> =
            desired.entities().into_iter().map(|e| e.key).collect();

        let mut map = self.write();
        let stale: Vec<CompositeKey> = map
            .values()
            .filter(|entity| entity.is_synthesized() && !wanted.contains(&entity.key))
            .map(|entity| entity.key.clone())
            .collect();

        for key in &stale {
            map.remove(key);
            emit_synthesized_pruned(key);
        }
        stale
    }

    /// Returns a snapshot of the merged set, sorted by key.
    pub fn all_entities(&self) -> Vec<Entity> {
        self.read().values().cloned().collect()
    }

    /// Returns the observed entities, sorted by key.
    pub fn observed_entities(&self) -> Vec<Entity> {
        self.read()
            .values()
            .filter(|entity| entity.is_observed())
            .cloned()
            .collect()
    }

    /// Returns the entity at `key`.
    pub fn get(&self, key: &CompositeKey) -> Option<Entity> {
        self.read().get(key).cloned()
    }

    /// Returns entity counts by source.
    pub fn source_counts(&self) -> SourceCounts {
        let mut counts = SourceCounts::default();
        for entity in self.read().values() {
            match entity.source {
                EntitySource::Observed => counts.observed += 1,
                EntitySource::Synthesized => counts.synthesized += 1,
                EntitySource::SynthesizedRefresh => counts.synthesized_refresh += 1,
            }
        }
        counts
    }

    /// Returns the number of entities.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<CompositeKey, Entity>> {
        self.entities
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<CompositeKey, Entity>> {
        self.entities
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn skip(key: &CompositeKey, stage: GapFillStage, reason: impl ToString) -> GapFillError {
    let error = GapFillError {
        key: key.clone(),
        stage,
        reason: reason.to_string(),
    };
    tracing::warn!(key = %key, stage = %stage, reason = %error.reason, "Gap fill skipped");
    error
}
