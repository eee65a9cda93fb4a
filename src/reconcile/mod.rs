//! Topology reconciliation.
//!
//! [`TopologyReconciler`] compares what is observed with what the
//! [`DesiredTopology`](crate::core::DesiredTopology) asks for and reports the
//! gaps plus a [`CoverageReport`].

mod coverage;
mod reconciler;

pub use coverage::{CoverageReport, TypeCoverage};
pub use reconciler::{GapAnalysis, TopologyReconciler};
