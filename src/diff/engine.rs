//! Whole-template diff engine.
//!
//! The [`DiffEngine`] is the entry point: it builds typed templates from the
//! two documents, computes the base diff, runs replacement propagation on a
//! working copy and folds the propagated replacements back into the base
//! diff.

use serde_json::Value;
use tracing::{debug, info};

use crate::changeset::ResourceReplacements;
use crate::error::Result;
use crate::template::{ReplacementRegistry, ReplacementSource, Template};

use super::difference::{DifferenceCollection, ResourceImpact, TemplateDiff};
use super::keyed::diff_keyed_entities;
use super::propagation::{backfill, propagate};
use super::resource::ResourceDiffer;
use super::sections::{diff_attribute, diff_value_section};

/// Computes a single, unpropagated diff between two templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateDiffer<'a> {
    resources: ResourceDiffer<'a>,
}

impl<'a> TemplateDiffer<'a> {
    /// Creates a template differ around a resource differ.
    #[must_use]
    pub const fn new(resources: ResourceDiffer<'a>) -> Self {
        Self { resources }
    }

    /// Diffs every section of the two templates.
    ///
    /// # Errors
    ///
    /// Propagates errors from the section differs.
    pub fn calculate(&self, old: &Template, new: &Template) -> Result<TemplateDiff> {
        let resources = diff_keyed_entities(&old.resources, &new.resources, |id, a, b| {
            self.resources.diff_resource(id, a, b)
        })?;

        Ok(TemplateDiff {
            format_version: diff_attribute(old.format_version.as_ref(), new.format_version.as_ref()),
            description: diff_attribute(old.description.as_ref(), new.description.as_ref()),
            transform: diff_attribute(old.transform.as_ref(), new.transform.as_ref()),
            metadata: diff_value_section(&old.metadata, &new.metadata)?,
            parameters: diff_value_section(&old.parameters, &new.parameters)?,
            mappings: diff_value_section(&old.mappings, &new.mappings)?,
            conditions: diff_value_section(&old.conditions, &new.conditions)?,
            resources: DifferenceCollection::new(resources),
            outputs: diff_value_section(&old.outputs, &new.outputs)?,
            unknown_top_level_keys: diff_value_section(&old.unknown, &new.unknown)?,
        })
    }
}

/// Options that shape the templates before they are diffed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Keep resource `Metadata` attributes. Defaults to keeping them only when
    /// a change-set oracle is supplied.
    pub keep_metadata: Option<bool>,
    /// Resource types dropped from both templates before diffing.
    pub ignore_resource_types: Vec<String>,
}

/// Template diff engine with replacement propagation.
pub struct DiffEngine<S = ReplacementRegistry> {
    source: S,
    options: DiffOptions,
}

impl DiffEngine<ReplacementRegistry> {
    /// Creates an engine backed by the builtin replacement metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::with_source(ReplacementRegistry::builtin())
    }
}

impl Default for DiffEngine<ReplacementRegistry> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ReplacementSource> DiffEngine<S> {
    /// Creates an engine backed by a custom metadata source.
    #[must_use]
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            options: DiffOptions::default(),
        }
    }

    /// Sets the diff options.
    #[must_use]
    pub fn with_options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the replacement metadata source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Returns the diff options.
    pub const fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Diffs two template documents.
    ///
    /// The documents are borrowed and never modified.
    ///
    /// # Errors
    ///
    /// Returns an error if either document is malformed or propagation
    /// fails. No partial diff is returned.
    pub fn diff_template(
        &self,
        old: &Value,
        new: &Value,
        oracle: Option<&ResourceReplacements>,
    ) -> Result<TemplateDiff> {
        let old = Template::from_value(old)?;
        let new = Template::from_value(new)?;
        self.diff_templates(old, new, oracle)
    }

    /// Diffs two typed templates, taking ownership of them.
    ///
    /// # Errors
    ///
    /// Returns an error if propagation fails.
    pub fn diff_templates(
        &self,
        mut old: Template,
        mut new: Template,
        oracle: Option<&ResourceReplacements>,
    ) -> Result<TemplateDiff> {
        old.remove_resource_types(&self.options.ignore_resource_types);
        new.remove_resource_types(&self.options.ignore_resource_types);

        let keep_metadata = self.options.keep_metadata.unwrap_or(oracle.is_some());
        if !keep_metadata {
            debug!("Dropping resource metadata before diffing");
            old.strip_resource_metadata();
            new.strip_resource_metadata();
        }

        let differ = TemplateDiffer::new(ResourceDiffer::new(&self.source, oracle));

        let mut diff = differ.calculate(&old, &new)?;
        let propagated = propagate(&differ, &old, &new)?;
        backfill(&mut diff, &propagated, &old, &new);

        info!(
            "Computed diff: {} differences, {} resources replaced, {} added, {} removed",
            diff.differences_count(),
            diff.replaced_resources().len(),
            diff.count_resources(ResourceImpact::Added),
            diff.count_resources(ResourceImpact::Removed)
        );

        Ok(diff)
    }
}

impl<S> std::fmt::Debug for DiffEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{ChangeSet, Evaluation, PropertyChange, Replacement, RequiresRecreation, ResourceChange};
    use crate::template::{MockReplacementSource, ReplacementBehavior};
    use serde_json::json;

    fn engine() -> DiffEngine {
        let mut registry = ReplacementRegistry::new();
        registry.register("X::Y", "Name", ReplacementBehavior::Always);
        registry.register("X::Consumer", "Source", ReplacementBehavior::Conditionally);
        DiffEngine::with_source(registry)
    }

    fn stack(name: &str) -> Value {
        json!({
            "Parameters": { "Env": { "Type": "String" } },
            "Resources": {
                "Bucket1": {
                    "Type": "X::Y",
                    "Properties": { "Name": name },
                    "Metadata": { "aws:cdk:path": format!("Stack/{name}") }
                },
                "Consumer": { "Type": "X::Consumer", "Properties": { "Source": { "Ref": "Bucket1" } } }
            },
            "Outputs": { "BucketRef": { "Value": { "Ref": "Bucket1" } } }
        })
    }

    #[test]
    fn test_identical_templates_yield_empty_diff() {
        let template = stack("foo");
        let diff = engine().diff_template(&template, &template, None).unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.differences_count(), 0);
    }

    #[test]
    fn test_always_replace_property() {
        let diff = engine().diff_template(&stack("foo"), &stack("bar"), None).unwrap();
        assert_eq!(
            diff.resources.get("Bucket1").change_impact(),
            ResourceImpact::WillReplace
        );
    }

    #[test]
    fn test_replacement_propagates_to_referencing_resource() {
        let diff = engine().diff_template(&stack("foo"), &stack("bar"), None).unwrap();
        let consumer = diff.resources.find("Consumer").unwrap();
        assert!(consumer.change_impact().is_replacement());
        assert_eq!(consumer.change_impact(), ResourceImpact::MayReplace);
        assert!(diff.outputs.is_empty());
    }

    #[test]
    fn test_removed_resource_has_only_old_value() {
        let old = json!({ "Resources": { "Gone": { "Type": "X::Y" } } });
        let new = json!({ "Resources": {} });

        let diff = engine().diff_template(&old, &new, None).unwrap();
        assert_eq!(diff.resources.len(), 1);
        let gone = diff.resources.find("Gone").unwrap();
        assert_eq!(gone.change_impact(), ResourceImpact::Removed);
        assert!(gone.old_value().is_some());
        assert!(gone.new_value().is_none());
    }

    #[test]
    fn test_add_remove_symmetry() {
        let a = json!({ "Resources": { "OnlyA": { "Type": "X::Y" }, "Both": { "Type": "X::Y" } } });
        let b = json!({ "Resources": { "OnlyB": { "Type": "X::Y" }, "Both": { "Type": "X::Y" } } });

        let forward = engine().diff_template(&a, &b, None).unwrap();
        let backward = engine().diff_template(&b, &a, None).unwrap();

        assert_eq!(forward.resources.get("OnlyB").change_impact(), ResourceImpact::Added);
        assert_eq!(forward.resources.get("OnlyA").change_impact(), ResourceImpact::Removed);
        assert_eq!(backward.resources.get("OnlyA").change_impact(), ResourceImpact::Added);
        assert_eq!(backward.resources.get("OnlyB").change_impact(), ResourceImpact::Removed);
        assert!(forward.resources.find("Both").is_none());
    }

    #[test]
    fn test_dynamic_change_set_yields_may_replace() {
        let change_set = ChangeSet::new(vec![ResourceChange::new("Bucket1", Replacement::Conditional).with_detail(
            PropertyChange::property("Name", RequiresRecreation::Always, Evaluation::Dynamic),
        )]);
        let oracle = ResourceReplacements::from_change_set(&change_set);

        let diff = engine()
            .diff_template(&stack("foo"), &stack("bar"), Some(&oracle))
            .unwrap();
        let bucket = diff.resources.find("Bucket1").unwrap();
        assert_eq!(
            bucket.property_update("Name").unwrap().change_impact,
            ResourceImpact::MayReplace
        );
        assert_eq!(bucket.change_impact(), ResourceImpact::MayReplace);
    }

    #[test]
    fn test_oracle_overrides_static_metadata() {
        let mut oracle = ResourceReplacements::new();
        oracle.insert_property("Bucket1", "Name", ReplacementBehavior::Never);

        let diff = engine()
            .diff_template(&stack("foo"), &stack("bar"), Some(&oracle))
            .unwrap();
        assert_eq!(
            diff.resources.get("Bucket1").change_impact(),
            ResourceImpact::WillUpdate
        );
        assert!(diff.resources.find("Consumer").is_none());
        assert!(!diff.has_replacements());
    }

    #[test]
    fn test_metadata_kept_only_with_oracle() {
        let old = json!({ "Resources": { "Q": { "Type": "X::Y", "Metadata": { "v": 1 } } } });
        let new = json!({ "Resources": { "Q": { "Type": "X::Y", "Metadata": { "v": 2 } } } });

        let without = engine().diff_template(&old, &new, None).unwrap();
        assert!(without.is_empty());

        let oracle = ResourceReplacements::new();
        let with = engine().diff_template(&old, &new, Some(&oracle)).unwrap();
        assert_eq!(with.resources.get("Q").change_impact(), ResourceImpact::WillUpdate);

        let forced = engine()
            .with_options(DiffOptions {
                keep_metadata: Some(true),
                ..DiffOptions::default()
            })
            .diff_template(&old, &new, None)
            .unwrap();
        assert!(!forced.is_empty());
    }

    #[test]
    fn test_ignored_resource_types() {
        let old = json!({ "Resources": { "Meta": { "Type": "AWS::CDK::Metadata", "Properties": { "A": 1 } } } });
        let new = json!({ "Resources": { "Meta": { "Type": "AWS::CDK::Metadata", "Properties": { "A": 2 } } } });

        let diff = engine()
            .with_options(DiffOptions {
                ignore_resource_types: vec![String::from("AWS::CDK::Metadata")],
                ..DiffOptions::default()
            })
            .diff_template(&old, &new, None)
            .unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_deterministic_serialization() {
        let first = engine().diff_template(&stack("foo"), &stack("bar"), None).unwrap();
        let second = engine().diff_template(&stack("foo"), &stack("bar"), None).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_propagation_is_monotonic_and_idempotent() {
        let mut registry = ReplacementRegistry::new();
        registry.register("X::Y", "Name", ReplacementBehavior::Always);
        registry.register("X::Consumer", "Source", ReplacementBehavior::Always);
        let differ = TemplateDiffer::new(ResourceDiffer::new(&registry, None));

        let old = Template::from_value(&stack("foo")).unwrap();
        let new = Template::from_value(&stack("bar")).unwrap();

        let base = differ.calculate(&old, &new).unwrap();
        let once = propagate(&differ, &old, &new).unwrap();
        let twice = propagate(&differ, &old, &new).unwrap();

        let before = base.replaced_resources().len();
        let mut after = base.clone();
        backfill(&mut after, &once, &old, &new);
        assert!(after.replaced_resources().len() >= before);
        assert_eq!(once, twice);

        let mut again = after.clone();
        backfill(&mut again, &twice, &old, &new);
        assert_eq!(again, after);
    }

    #[test]
    fn test_malformed_input_aborts() {
        let err = engine()
            .diff_template(&json!({ "Resources": [] }), &json!({}), None)
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_unknown_top_level_keys_are_diffed() {
        let old = json!({ "Rules": { "A": { "Assertions": [] } } });
        let new = json!({ "Rules": { "A": { "Assertions": [1] } } });

        let diff = engine().diff_template(&old, &new, None).unwrap();
        assert!(diff.unknown_top_level_keys.find("Rules").unwrap().is_update());
    }

    #[test]
    fn test_caller_documents_are_not_mutated() {
        let old = stack("foo");
        let new = stack("bar");
        let snapshot = new.clone();
        engine().diff_template(&old, &new, None).unwrap();
        assert_eq!(new, snapshot);
    }

    #[test]
    fn test_mock_source_drives_classification() {
        let mut source = MockReplacementSource::new();
        source
            .expect_property_behavior()
            .returning(|_, property| {
                if property == "Name" {
                    ReplacementBehavior::Never
                } else {
                    ReplacementBehavior::Unknown
                }
            });

        let diff = DiffEngine::with_source(source)
            .diff_template(&stack("foo"), &stack("bar"), None)
            .unwrap();
        assert_eq!(
            diff.resources.get("Bucket1").change_impact(),
            ResourceImpact::WillUpdate
        );
        assert!(diff.resources.find("Consumer").is_none());
    }
}
