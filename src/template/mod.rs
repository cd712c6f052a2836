//! Template module for stackdiff.
//!
//! This module handles everything about the input documents:
//! - Parsing JSON and YAML templates into documents
//! - The typed section and resource model
//! - Reference expressions and intrinsic normalization
//! - Static replacement metadata for resource properties
//! - Fingerprints for reporting

mod hash;
mod model;
mod normalize;
mod parser;
mod references;
mod registry;

pub use hash::TemplateHasher;
pub use model::{
    DELETION_POLICY_ATTRIBUTE, DEPENDS_ON_ATTRIBUTE, METADATA_ATTRIBUTE, PROPERTIES_ATTRIBUTE,
    Resource, Section, TYPE_ATTRIBUTE, Template,
};
pub use normalize::normalize_intrinsics;
pub use parser::TemplateParser;
pub(crate) use parser::looks_like_json;
pub use references::rewrite_references;
pub use registry::{ReplacementBehavior, ReplacementRegistry, ReplacementSource};

#[cfg(test)]
pub use registry::MockReplacementSource;
