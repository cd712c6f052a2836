//! Diff module for stackdiff.
//!
//! This module computes the structured difference between two templates:
//! - Structural value comparison
//! - Keyed-section and resource differs
//! - Replacement classification and fixed-point propagation
//! - Summaries and guardrail checks

mod difference;
mod engine;
mod keyed;
mod propagation;
mod resource;
mod sections;
mod summary;
mod value;

pub use difference::{
    Difference, DifferenceCollection, PropertyDifference, ResourceDifference, ResourceImpact,
    ResourceTypeChange, TemplateDiff,
};
pub use engine::{DiffEngine, DiffOptions, TemplateDiffer};
pub use keyed::diff_keyed_entities;
pub use propagation::replacement_marker;
pub use resource::ResourceDiffer;
pub use sections::{diff_attribute, diff_value_section};
pub use summary::{DiffSummary, ImpactCounts};
pub use value::{StructuralEq, deep_equal, maps_equal, optional_equal};
