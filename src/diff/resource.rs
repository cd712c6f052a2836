//! Resource differ: property diffs and replacement classification.

use std::collections::BTreeMap;
use tracing::trace;

use crate::changeset::ResourceReplacements;
use crate::error::Result;
use crate::template::{Resource, ReplacementSource};

use super::difference::{Difference, PropertyDifference, ResourceDifference, ResourceImpact};
use super::keyed::diff_keyed_entities;

/// Diffs single resources and classifies their property changes.
///
/// Classification precedence is: the change-set oracle, then the static
/// replacement metadata, then an in-place update.
#[derive(Clone, Copy)]
pub struct ResourceDiffer<'a> {
    source: &'a dyn ReplacementSource,
    oracle: Option<&'a ResourceReplacements>,
}

impl<'a> ResourceDiffer<'a> {
    /// Creates a differ over a metadata source and an optional oracle.
    #[must_use]
    pub fn new(source: &'a dyn ReplacementSource, oracle: Option<&'a ResourceReplacements>) -> Self {
        Self { source, oracle }
    }

    /// Diffs two versions of the resource `logical_id`.
    ///
    /// A type change replaces the resource and its properties are not
    /// inspected.
    ///
    /// # Errors
    ///
    /// Propagates errors from the keyed differ.
    pub fn diff_resource(
        &self,
        logical_id: &str,
        old: Option<&Resource>,
        new: Option<&Resource>,
    ) -> Result<ResourceDifference> {
        let (Some(old_resource), Some(new_resource)) = (old, new) else {
            return Ok(ResourceDifference::new(
                old.cloned(),
                new.cloned(),
                BTreeMap::new(),
                BTreeMap::new(),
            ));
        };

        if old_resource.resource_type != new_resource.resource_type {
            trace!(
                "{logical_id}: type changed from {} to {}",
                old_resource.resource_type, new_resource.resource_type
            );
            return Ok(ResourceDifference::new(
                Some(old_resource.clone()),
                Some(new_resource.clone()),
                BTreeMap::new(),
                BTreeMap::new(),
            ));
        }

        let resource_type = new_resource.resource_type.as_str();
        let property_updates = diff_keyed_entities(
            &old_resource.properties,
            &new_resource.properties,
            |property, a, b| {
                let impact = self.classify_property(logical_id, resource_type, property);
                Ok(PropertyDifference::new(a.cloned(), b.cloned(), impact))
            },
        )?;

        let other_changes = diff_keyed_entities(&old_resource.rest, &new_resource.rest, |_, a, b| {
            Ok(Difference::new(a.cloned(), b.cloned()))
        })?;

        Ok(ResourceDifference::new(
            Some(old_resource.clone()),
            Some(new_resource.clone()),
            property_updates,
            other_changes,
        ))
    }

    /// Classifies the impact of changing `property` on a resource.
    #[must_use]
    pub fn classify_property(&self, logical_id: &str, resource_type: &str, property: &str) -> ResourceImpact {
        if let Some(impact) = self
            .oracle
            .and_then(|oracle| oracle.property_behavior(logical_id, property))
            .and_then(ResourceImpact::from_behavior)
        {
            trace!("{logical_id}.{property}: {impact} (change set)");
            return impact;
        }

        let impact = ResourceImpact::from_behavior(self.source.property_behavior(resource_type, property))
            .unwrap_or(ResourceImpact::WillUpdate);
        trace!("{logical_id}.{property}: {impact}");
        impact
    }
}

impl std::fmt::Debug for ResourceDiffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDiffer")
            .field("oracle", &self.oracle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{MockReplacementSource, ReplacementBehavior, ReplacementRegistry};
    use mockall::predicate::eq;
    use serde_json::json;

    fn resource(resource_type: &str, name: &str) -> Resource {
        Resource::new(resource_type).with_property("Name", json!(name))
    }

    #[test]
    fn test_static_metadata_forces_replacement() {
        let mut registry = ReplacementRegistry::new();
        registry.register("X::Y", "Name", ReplacementBehavior::Always);
        let differ = ResourceDiffer::new(&registry, None);

        let diff = differ
            .diff_resource("A", Some(&resource("X::Y", "foo")), Some(&resource("X::Y", "bar")))
            .unwrap();

        assert_eq!(diff.change_impact(), ResourceImpact::WillReplace);
        assert_eq!(
            diff.property_update("Name").unwrap().change_impact,
            ResourceImpact::WillReplace
        );
    }

    #[test]
    fn test_unknown_property_defaults_to_update() {
        let registry = ReplacementRegistry::new();
        let differ = ResourceDiffer::new(&registry, None);

        let diff = differ
            .diff_resource("A", Some(&resource("X::Y", "foo")), Some(&resource("X::Y", "bar")))
            .unwrap();
        assert_eq!(diff.change_impact(), ResourceImpact::WillUpdate);
    }

    #[test]
    fn test_oracle_takes_precedence() {
        let mut source = MockReplacementSource::new();
        source.expect_property_behavior().never();

        let mut oracle = ResourceReplacements::new();
        oracle.insert_property("A", "Name", ReplacementBehavior::Never);
        let differ = ResourceDiffer::new(&source, Some(&oracle));

        assert_eq!(differ.classify_property("A", "X::Y", "Name"), ResourceImpact::WillUpdate);
    }

    #[test]
    fn test_unknown_static_verdict_falls_through() {
        let mut source = MockReplacementSource::new();
        source
            .expect_property_behavior()
            .with(eq("X::Y"), eq("Name"))
            .times(1)
            .return_const(ReplacementBehavior::Unknown);
        let differ = ResourceDiffer::new(&source, None);

        assert_eq!(differ.classify_property("A", "X::Y", "Name"), ResourceImpact::WillUpdate);
    }

    #[test]
    fn test_oracle_for_other_resource_is_ignored() {
        let mut source = MockReplacementSource::new();
        source
            .expect_property_behavior()
            .return_const(ReplacementBehavior::Conditionally);

        let mut oracle = ResourceReplacements::new();
        oracle.insert_property("Other", "Name", ReplacementBehavior::Never);
        let differ = ResourceDiffer::new(&source, Some(&oracle));

        assert_eq!(differ.classify_property("A", "X::Y", "Name"), ResourceImpact::MayReplace);
    }

    #[test]
    fn test_type_change_skips_properties() {
        let mut source = MockReplacementSource::new();
        source.expect_property_behavior().never();
        let differ = ResourceDiffer::new(&source, None);

        let diff = differ
            .diff_resource("A", Some(&resource("X::Y", "foo")), Some(&resource("X::Z", "bar")))
            .unwrap();
        assert_eq!(diff.change_impact(), ResourceImpact::WillReplace);
        assert!(diff.property_updates().is_empty());
    }

    #[test]
    fn test_attribute_changes_update_only() {
        let registry = ReplacementRegistry::builtin();
        let differ = ResourceDiffer::new(&registry, None);

        let old = resource("X::Y", "foo");
        let mut new = old.clone();
        new.rest.insert(String::from("UpdateReplacePolicy"), json!("Retain"));

        let diff = differ.diff_resource("A", Some(&old), Some(&new)).unwrap();
        assert_eq!(diff.change_impact(), ResourceImpact::WillUpdate);
        assert!(diff.other_changes().contains_key("UpdateReplacePolicy"));
    }
}
