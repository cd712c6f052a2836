//! Reconciler between the static diff and an authoritative change set.
//!
//! The reconciler turns a change set into the replacement oracle, runs the
//! diff engine with it and, when asked to, drops the property changes the
//! change set does not confirm.

use serde_json::Value;
use tracing::{debug, info};

use crate::changeset::{ChangeSet, ResourceReplacements};
use crate::diff::{DiffEngine, ResourceDifference, ResourceImpact, TemplateDiff};
use crate::error::Result;
use crate::template::{METADATA_ATTRIBUTE, ReplacementRegistry, ReplacementSource};

/// Resource type prefix of transform-expanded resources; the change set
/// describes their expansion, not the template entries themselves.
const SERVERLESS_TYPE_PREFIX: &str = "AWS::Serverless";

/// Reconciler for change-set aware diffs.
pub struct ChangeSetReconciler<'a, S: ReplacementSource = ReplacementRegistry> {
    /// Diff engine.
    engine: &'a DiffEngine<S>,
    /// Whether unconfirmed property changes are dropped.
    filter_false_positives: bool,
}

impl<'a, S: ReplacementSource> ChangeSetReconciler<'a, S> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(engine: &'a DiffEngine<S>) -> Self {
        Self {
            engine,
            filter_false_positives: false,
        }
    }

    /// Enables or disables false-positive filtering.
    #[must_use]
    pub const fn with_false_positive_filter(mut self, enabled: bool) -> Self {
        self.filter_false_positives = enabled;
        self
    }

    /// Diffs two template documents, using the change set as the oracle.
    ///
    /// # Errors
    ///
    /// Returns an error if either document is malformed or propagation
    /// fails.
    pub fn reconcile(&self, old: &Value, new: &Value, change_set: Option<&ChangeSet>) -> Result<TemplateDiff> {
        let oracle = change_set.map(ResourceReplacements::from_change_set);
        if let Some(oracle) = &oracle {
            info!("Reconciling diff with change set covering {} resources", oracle.len());
        }

        let mut diff = self.engine.diff_template(old, new, oracle.as_ref())?;

        if self.filter_false_positives {
            if let Some(oracle) = &oracle {
                let dropped = filter_false_positives(&mut diff, oracle);
                info!("Dropped {dropped} resource changes not confirmed by the change set");
            }
        }

        Ok(diff)
    }
}

/// Drops property changes the oracle does not mention and resources left
/// without any change. Returns the number of dropped resources.
///
/// Updated `Metadata` never shows up in a change set, so it is dropped too.
pub fn filter_false_positives(diff: &mut TemplateDiff, oracle: &ResourceReplacements) -> usize {
    let candidates: Vec<String> = diff
        .resources
        .iter()
        .filter(|(_, resource)| is_filterable(resource))
        .map(|(logical_id, _)| logical_id.to_string())
        .collect();

    for logical_id in &candidates {
        let Some(resource) = diff.resources.find_mut(logical_id) else {
            continue;
        };

        let unconfirmed: Vec<String> = resource
            .property_updates()
            .keys()
            .filter(|property| !oracle.mentions_property(logical_id, property))
            .cloned()
            .collect();
        for property in unconfirmed {
            debug!("{logical_id}.{property}: not in change set, ignoring");
            resource.clear_property_change(&property);
        }
        resource.clear_other_change(METADATA_ATTRIBUTE);
    }

    let before = diff.resources.len();
    diff.resources
        .retain(|_, resource| resource.change_impact() != ResourceImpact::NoChange);
    before - diff.resources.len()
}

fn is_filterable(resource: &ResourceDifference) -> bool {
    resource.old_value().is_some()
        && resource.new_value().is_some()
        && !resource.resource_type().is_changed()
        && !resource
            .resource_type()
            .display_type()
            .starts_with(SERVERLESS_TYPE_PREFIX)
}

impl<S: ReplacementSource> std::fmt::Debug for ChangeSetReconciler<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSetReconciler")
            .field("engine", self.engine)
            .field("filter_false_positives", &self.filter_false_positives)
            .finish()
    }
}
