//! Coverage reports.

use crate::core::EntityType;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coverage of one slice of the desired topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCoverage {
    /// Number of desired entities.
    pub desired: usize,
    /// Number of desired entities that were observed.
    pub matched: usize,
    /// `matched / desired` as a rounded percentage; 100 when nothing is desired.
    pub coverage: u32,
}

impl TypeCoverage {
    /// Computes coverage from counts.
    pub fn new(desired: usize, matched: usize) -> Self {
        Self {
            desired,
            matched,
            coverage: percentage(matched, desired),
        }
    }

    /// Returns `true` if every desired entity was observed.
    pub fn is_complete(&self) -> bool {
        self.matched >= self.desired
    }
}

/// How much of the desired topology is backed by observed entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Number of desired entities that were not observed.
    pub missing: usize,
    /// Number of observed entities that are not desired.
    pub extra: usize,
    /// Coverage per entity type.
    pub by_type: BTreeMap<EntityType, TypeCoverage>,
    /// Coverage over all types.
    pub overall: TypeCoverage,
}

impl CoverageReport {
    /// Returns coverage for `entity_type`.
    pub fn for_type(&self, entity_type: EntityType) -> TypeCoverage {
        self.by_type
            .get(&entity_type)
            .copied()
            .unwrap_or_else(|| TypeCoverage::new(0, 0))
    }
}

fn percentage(matched: usize, desired: usize) -> u32 {
    if desired == 0 {
        return 100;
    }
    (matched as f64 / desired as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(TypeCoverage::new(3, 2).coverage, 67);
        assert_eq!(TypeCoverage::new(3, 1).coverage, 33);
        assert_eq!(TypeCoverage::new(8, 1).coverage, 13);
        assert_eq!(TypeCoverage::new(4, 4).coverage, 100);
    }

    #[test]
    fn test_empty_is_full_coverage() {
        let coverage = TypeCoverage::new(0, 0);
        assert_eq!(coverage.coverage, 100);
        assert!(coverage.is_complete());
    }
}
