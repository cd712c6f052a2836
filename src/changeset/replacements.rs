//! Authoritative replacement verdicts derived from a change set.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::template::ReplacementBehavior;

use super::types::{ChangeSet, Replacement};

/// Replacement verdicts for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReplacement {
    /// Whether the planner replaces the resource as a whole.
    pub resource_replaced: bool,
    /// Verdict per top-level property name.
    pub properties_replaced: BTreeMap<String, ReplacementBehavior>,
}

/// Replacement oracle keyed by logical id.
///
/// A missing entry means there is no authoritative information and static
/// analysis applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResourceReplacements {
    replacements: BTreeMap<String, ResourceReplacement>,
}

impl ResourceReplacements {
    /// Creates an empty oracle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the oracle from a change set.
    ///
    /// Only records targeting the property map contribute. Several records
    /// for the same property keep the most severe verdict.
    #[must_use]
    pub fn from_change_set(change_set: &ChangeSet) -> Self {
        let mut oracle = Self::new();

        for change in &change_set.changes {
            let entry = oracle
                .replacements
                .entry(change.logical_resource_id.clone())
                .or_default();
            entry.resource_replaced |= change.replacement == Replacement::True;

            for detail in change.details.iter().filter(|d| d.targets_properties()) {
                let Some(name) = detail.property_name() else {
                    continue;
                };
                let behavior = detail.replacement_behavior();
                entry
                    .properties_replaced
                    .entry(name.to_string())
                    .and_modify(|existing| *existing = existing.most_severe(behavior))
                    .or_insert(behavior);
            }
        }

        debug!("Built replacement oracle for {} resources", oracle.len());
        oracle
    }

    /// Records a verdict for one property.
    pub fn insert_property(
        &mut self,
        logical_id: impl Into<String>,
        property: impl Into<String>,
        behavior: ReplacementBehavior,
    ) {
        self.replacements
            .entry(logical_id.into())
            .or_default()
            .properties_replaced
            .insert(property.into(), behavior);
    }

    /// Returns the verdicts for a resource.
    #[must_use]
    pub fn get(&self, logical_id: &str) -> Option<&ResourceReplacement> {
        self.replacements.get(logical_id)
    }

    /// Returns the verdict for one property of a resource.
    #[must_use]
    pub fn property_behavior(&self, logical_id: &str, property: &str) -> Option<ReplacementBehavior> {
        self.replacements
            .get(logical_id)?
            .properties_replaced
            .get(property)
            .copied()
    }

    /// Returns true if the oracle mentions the property at all.
    #[must_use]
    pub fn mentions_property(&self, logical_id: &str, property: &str) -> bool {
        self.property_behavior(logical_id, property).is_some()
    }

    /// Returns true if the resource is replaced as a whole.
    #[must_use]
    pub fn resource_replaced(&self, logical_id: &str) -> bool {
        self.replacements
            .get(logical_id)
            .is_some_and(|replacement| replacement.resource_replaced)
    }

    /// Returns the number of resources the oracle knows about.
    #[must_use]
    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    /// Returns true if the oracle knows about no resource.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{Evaluation, PropertyChange, RequiresRecreation, ResourceChange};

    #[test]
    fn test_from_change_set() {
        let change_set = ChangeSet::new(vec![
            ResourceChange::new("A", Replacement::Conditional).with_detail(PropertyChange::property(
                "Name",
                RequiresRecreation::Always,
                Evaluation::Dynamic,
            )),
            ResourceChange::new("B", Replacement::True).with_detail(PropertyChange::property(
                "Key",
                RequiresRecreation::Always,
                Evaluation::Static,
            )),
        ]);

        let oracle = ResourceReplacements::from_change_set(&change_set);
        assert_eq!(oracle.property_behavior("A", "Name"), Some(ReplacementBehavior::Conditionally));
        assert_eq!(oracle.property_behavior("B", "Key"), Some(ReplacementBehavior::Always));
        assert!(!oracle.resource_replaced("A"));
        assert!(oracle.resource_replaced("B"));
        assert_eq!(oracle.property_behavior("C", "Key"), None);
    }

    #[test]
    fn test_repeated_property_keeps_most_severe() {
        let change_set = ChangeSet::new(vec![
            ResourceChange::new("A", Replacement::True)
                .with_detail(PropertyChange::property("Tags", RequiresRecreation::Never, Evaluation::Static))
                .with_detail(PropertyChange::property(
                    "/Properties/Tags/0",
                    RequiresRecreation::Always,
                    Evaluation::Static,
                )),
        ]);

        let oracle = ResourceReplacements::from_change_set(&change_set);
        assert_eq!(oracle.property_behavior("A", "Tags"), Some(ReplacementBehavior::Always));
    }

    #[test]
    fn test_non_property_targets_are_ignored() {
        let mut detail = PropertyChange::property("Foo", RequiresRecreation::Always, Evaluation::Static);
        detail.attribute = String::from("Metadata");
        let change_set = ChangeSet::new(vec![ResourceChange::new("A", Replacement::False).with_detail(detail)]);

        let oracle = ResourceReplacements::from_change_set(&change_set);
        assert!(!oracle.mentions_property("A", "Foo"));
        assert_eq!(oracle.len(), 1);
    }
}
