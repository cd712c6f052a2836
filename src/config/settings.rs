//! Diff settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::diff::DiffOptions;
use crate::error::ConfigError;

/// Settings for a diff run, usually read from `stackdiff.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffSettings {
    /// Additional replacement metadata merged over the builtin table.
    #[serde(default)]
    pub replacement_specs: Option<PathBuf>,
    /// Overrides whether resource `Metadata` is diffed.
    #[serde(default)]
    pub keep_metadata: Option<bool>,
    /// Resource types excluded from the diff on both sides.
    #[serde(default)]
    pub ignore_resource_types: Vec<String>,
    /// Drop property changes a supplied change set does not confirm.
    #[serde(default)]
    pub filter_false_positives: bool,
    /// Policy checks on the resulting diff.
    #[serde(default)]
    pub guardrails: GuardrailSettings,
}

/// Guardrails checked against a diff summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuardrailSettings {
    /// Fail if any resource will be replaced.
    #[serde(default)]
    pub fail_on_replacement: bool,
    /// Fail if any resource is removed without being retained.
    #[serde(default)]
    pub fail_on_removal: bool,
    /// Maximum number of resources that may or will be replaced.
    #[serde(default)]
    pub max_replacements: Option<usize>,
}

impl DiffSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for resource_type in &self.ignore_resource_types {
            if !is_resource_type(resource_type) {
                return Err(ConfigError::validation(
                    format!("'{resource_type}' is not a resource type (expected Vendor::Service::Resource)"),
                    "ignore_resource_types",
                ));
            }
        }

        if let Some(path) = &self.replacement_specs {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::validation(
                    "replacement_specs must not be empty",
                    "replacement_specs",
                ));
            }
        }

        Ok(())
    }

    /// Resolves relative paths against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if let Some(path) = &self.replacement_specs {
            if path.is_relative() {
                self.replacement_specs = Some(base_dir.join(path));
            }
        }
    }

    /// Returns the engine options these settings describe.
    #[must_use]
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            keep_metadata: self.keep_metadata,
            ignore_resource_types: self.ignore_resource_types.clone(),
        }
    }
}

fn is_resource_type(value: &str) -> bool {
    let segments: Vec<&str> = value.split("::").collect();
    segments.len() >= 2 && segments.iter().all(|segment| !segment.is_empty())
}
