// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is reported
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are reported
#![warn(unused_variables)]            // Unused variables are reported
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # stackdiff
//!
//! Semantic diff and replacement analysis for declarative infrastructure
//! templates.
//!
//! ## Overview
//!
//! Given the deployed and the target version of a template, stackdiff
//! computes a structured difference and decides, for every resource, whether
//! deploying the target will add it, remove it, update it in place, or
//! replace it (destroy and recreate it with a new physical identity).
//!
//! ## Architecture
//!
//! 1. **Templates**: JSON or YAML documents split into typed sections
//! 2. **Diff engine**: keyed section differs plus a resource differ that
//!    classifies every property change
//! 3. **Propagation**: a fixed-point pass that follows references from
//!    replaced resources to the resources that consume them
//! 4. **Reconciler**: an optional change set sharpens the classification
//!
//! ## Modules
//!
//! - [`template`]: Template model, parsing and replacement metadata
//! - [`diff`]: Diff types, engine and propagation
//! - [`changeset`]: Change sets and the replacement oracle
//! - [`reconciler`]: Change-set aware diffing
//! - [`config`]: Settings loading and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//!
//! let old = json!({
//!     "Resources": {
//!         "Logs": { "Type": "AWS::S3::Bucket", "Properties": { "BucketName": "logs-v1" } }
//!     }
//! });
//! let new = json!({
//!     "Resources": {
//!         "Logs": { "Type": "AWS::S3::Bucket", "Properties": { "BucketName": "logs-v2" } }
//!     }
//! });
//!
//! let diff = stackdiff::diff_template(&old, &new, None).unwrap();
//! assert!(diff.resources.get("Logs").change_impact().is_replacement());
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod changeset;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod reconciler;
pub mod template;

// ============================================================================
// Re-exports
// ============================================================================

pub use changeset::{ChangeSet, ChangeSetLoader, ResourceReplacements};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{DiffSettings, SettingsLoader};
pub use diff::{DiffEngine, DiffOptions, DiffSummary, ResourceImpact, TemplateDiff};
pub use error::{Result, StackDiffError};
pub use reconciler::ChangeSetReconciler;
pub use template::{ReplacementRegistry, Template, TemplateParser};

use serde_json::Value;

/// Diffs two template documents with the builtin replacement metadata.
///
/// When a change set is supplied it becomes the authoritative replacement
/// oracle.
///
/// # Errors
///
/// Returns an error if either document is malformed or propagation fails.
pub fn diff_template(old: &Value, new: &Value, change_set: Option<&ChangeSet>) -> Result<TemplateDiff> {
    let engine = DiffEngine::new();
    ChangeSetReconciler::new(&engine).reconcile(old, new, change_set)
}
