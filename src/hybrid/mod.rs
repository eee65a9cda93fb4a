//! Hybrid real + synthesized topology.
//!
//! [`HybridMerger`] keeps the authoritative entity set. Real entities come in
//! through [`HybridMerger::update_infrastructure_entities`]; gaps against the
//! desired topology are filled with placeholders from an
//! [`EntityFactory`](crate::core::EntityFactory) and a
//! [`PatternGenerator`](crate::core::PatternGenerator).

mod merger;

pub use merger::{FillSummary, HybridMerger, RefreshSummary, SourceCounts};
