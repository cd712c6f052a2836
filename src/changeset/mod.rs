//! Change-set module for stackdiff.
//!
//! A change set is an externally computed deployment plan. This module loads
//! it and turns it into the [`ResourceReplacements`] oracle the diff engine
//! consults before its own static metadata.

mod loader;
mod replacements;
mod types;

pub use loader::ChangeSetLoader;
pub use replacements::{ResourceReplacement, ResourceReplacements};
pub use types::{ChangeSet, Evaluation, PropertyChange, Replacement, RequiresRecreation, ResourceChange};
