//! Difference types produced by the diff engine.
//!
//! Every collection is keyed by logical id and ordered (`BTreeMap`), so a
//! serialized [`TemplateDiff`] is byte-identical across runs for identical
//! inputs.

use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::template::{ReplacementBehavior, Resource};

use super::value::StructuralEq;

/// Impact of a change on a deployed resource.
///
/// `NoChange < WillUpdate < MayReplace < WillReplace` by severity. `Added` and
/// `Removed` are terminal and not comparable with the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceImpact {
    /// Nothing changes.
    #[default]
    NoChange,
    /// The resource is updated in place.
    WillUpdate,
    /// The resource may be replaced, depending on runtime values.
    MayReplace,
    /// The resource is destroyed and recreated.
    WillReplace,
    /// The resource is created.
    Added,
    /// The resource is deleted.
    Removed,
}

impl ResourceImpact {
    /// Severity rank, or `None` for the terminal `Added`/`Removed` states.
    #[must_use]
    pub const fn severity(self) -> Option<u8> {
        match self {
            Self::NoChange => Some(0),
            Self::WillUpdate => Some(1),
            Self::MayReplace => Some(2),
            Self::WillReplace => Some(3),
            Self::Added | Self::Removed => None,
        }
    }

    /// Returns the worst of two impacts. Terminal impacts always win.
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        match (self.severity(), other.severity()) {
            (Some(a), Some(b)) => {
                if b > a {
                    other
                } else {
                    self
                }
            }
            (None, _) => self,
            (_, None) => other,
        }
    }

    /// Returns true for `MayReplace` and `WillReplace`.
    #[must_use]
    pub const fn is_replacement(self) -> bool {
        matches!(self, Self::MayReplace | Self::WillReplace)
    }

    /// Maps a replacement verdict to an impact; `Unknown` has no mapping.
    #[must_use]
    pub const fn from_behavior(behavior: ReplacementBehavior) -> Option<Self> {
        match behavior {
            ReplacementBehavior::Always => Some(Self::WillReplace),
            ReplacementBehavior::Conditionally => Some(Self::MayReplace),
            ReplacementBehavior::Never => Some(Self::WillUpdate),
            ReplacementBehavior::Unknown => None,
        }
    }
}

impl std::fmt::Display for ResourceImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoChange => "no change",
            Self::WillUpdate => "will update",
            Self::MayReplace => "may replace",
            Self::WillReplace => "will replace",
            Self::Added => "added",
            Self::Removed => "removed",
        };
        write!(f, "{s}")
    }
}

/// Difference between two versions of a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference<T> {
    /// Value in the old template; absent for additions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<T>,
    /// Value in the new template; absent for removals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<T>,
}

impl<T> Default for Difference<T> {
    fn default() -> Self {
        Self {
            old_value: None,
            new_value: None,
        }
    }
}

impl<T> Difference<T> {
    /// Creates a new difference.
    #[must_use]
    pub const fn new(old_value: Option<T>, new_value: Option<T>) -> Self {
        Self {
            old_value,
            new_value,
        }
    }

    /// Returns true if the value only exists in the new template.
    #[must_use]
    pub const fn is_addition(&self) -> bool {
        self.old_value.is_none() && self.new_value.is_some()
    }

    /// Returns true if the value only exists in the old template.
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_none()
    }

    /// Returns true if the value exists in both templates.
    #[must_use]
    pub const fn is_update(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_some()
    }
}

impl<T: StructuralEq> Difference<T> {
    /// Returns true if the two sides differ.
    #[must_use]
    pub fn is_different(&self) -> bool {
        match (&self.old_value, &self.new_value) {
            (None, None) => false,
            (Some(a), Some(b)) => !a.structurally_eq(b),
            _ => true,
        }
    }
}

/// Difference of a single resource property, with its replacement impact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDifference {
    /// The value difference.
    #[serde(flatten)]
    pub difference: Difference<Value>,
    /// Impact of this property change on the resource.
    pub change_impact: ResourceImpact,
}

impl PropertyDifference {
    /// Creates a property difference.
    #[must_use]
    pub const fn new(old_value: Option<Value>, new_value: Option<Value>, change_impact: ResourceImpact) -> Self {
        Self {
            difference: Difference::new(old_value, new_value),
            change_impact,
        }
    }
}

/// Old and new resource type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeChange {
    /// Type in the old template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_type: Option<String>,
    /// Type in the new template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_type: Option<String>,
}

impl ResourceTypeChange {
    /// Returns true if the type differs between the two templates.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.old_type != self.new_type
    }

    /// Returns the most relevant type for display (new, falling back to old).
    #[must_use]
    pub fn display_type(&self) -> &str {
        self.new_type
            .as_deref()
            .or(self.old_type.as_deref())
            .unwrap_or("")
    }
}

/// Difference of a single resource.
///
/// The impact is derived from the other fields and kept in sync by every
/// mutator.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDifference {
    #[serde(skip_serializing_if = "Option::is_none")]
    old_value: Option<Resource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_value: Option<Resource>,
    resource_type: ResourceTypeChange,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    property_updates: BTreeMap<String, PropertyDifference>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    other_changes: BTreeMap<String, Difference<Value>>,
    change_impact: ResourceImpact,
}

impl ResourceDifference {
    /// Creates a resource difference and derives its impact.
    #[must_use]
    pub fn new(
        old_value: Option<Resource>,
        new_value: Option<Resource>,
        property_updates: BTreeMap<String, PropertyDifference>,
        other_changes: BTreeMap<String, Difference<Value>>,
    ) -> Self {
        let resource_type = ResourceTypeChange {
            old_type: old_value.as_ref().map(|r| r.resource_type.clone()),
            new_type: new_value.as_ref().map(|r| r.resource_type.clone()),
        };
        let mut difference = Self {
            old_value,
            new_value,
            resource_type,
            property_updates,
            other_changes,
            change_impact: ResourceImpact::NoChange,
        };
        difference.change_impact = difference.compute_impact();
        difference
    }

    fn compute_impact(&self) -> ResourceImpact {
        match (&self.old_value, &self.new_value) {
            (None, None) => ResourceImpact::NoChange,
            (None, Some(_)) => ResourceImpact::Added,
            (Some(_), None) => ResourceImpact::Removed,
            (Some(_), Some(_)) if self.resource_type.is_changed() => ResourceImpact::WillReplace,
            (Some(_), Some(_)) => {
                let base = if self.other_changes.is_empty() {
                    ResourceImpact::NoChange
                } else {
                    ResourceImpact::WillUpdate
                };
                self.property_updates
                    .values()
                    .map(|property| property.change_impact)
                    .fold(base, ResourceImpact::worst)
            }
        }
    }

    /// Returns the aggregated impact of this resource change.
    #[must_use]
    pub const fn change_impact(&self) -> ResourceImpact {
        self.change_impact
    }

    /// Returns the resource in the old template.
    #[must_use]
    pub const fn old_value(&self) -> Option<&Resource> {
        self.old_value.as_ref()
    }

    /// Returns the resource in the new template.
    #[must_use]
    pub const fn new_value(&self) -> Option<&Resource> {
        self.new_value.as_ref()
    }

    /// Returns the type change.
    #[must_use]
    pub const fn resource_type(&self) -> &ResourceTypeChange {
        &self.resource_type
    }

    /// Returns all property differences.
    #[must_use]
    pub const fn property_updates(&self) -> &BTreeMap<String, PropertyDifference> {
        &self.property_updates
    }

    /// Returns the difference of a single property.
    #[must_use]
    pub fn property_update(&self, name: &str) -> Option<&PropertyDifference> {
        self.property_updates.get(name)
    }

    /// Returns all non-property attribute differences.
    #[must_use]
    pub const fn other_changes(&self) -> &BTreeMap<String, Difference<Value>> {
        &self.other_changes
    }

    /// Returns true if the resource changes at all.
    #[must_use]
    pub fn is_different(&self) -> bool {
        self.change_impact != ResourceImpact::NoChange
    }

    /// Returns true if the resource is removed but kept by its deletion policy.
    #[must_use]
    pub fn is_retained(&self) -> bool {
        self.change_impact == ResourceImpact::Removed
            && self
                .old_value
                .as_ref()
                .and_then(Resource::deletion_policy)
                .is_some_and(|policy| policy == "Retain")
    }

    /// Overwrites the recorded difference of one property and re-derives the
    /// resource impact.
    pub fn set_property_change(&mut self, name: impl Into<String>, difference: PropertyDifference) {
        self.property_updates.insert(name.into(), difference);
        self.change_impact = self.compute_impact();
    }

    /// Drops the recorded difference of one property and re-derives the
    /// resource impact.
    pub fn clear_property_change(&mut self, name: &str) -> Option<PropertyDifference> {
        let removed = self.property_updates.remove(name);
        self.change_impact = self.compute_impact();
        removed
    }

    /// Drops the recorded difference of one non-property attribute and
    /// re-derives the resource impact.
    pub fn clear_other_change(&mut self, attribute: &str) -> Option<Difference<Value>> {
        let removed = self.other_changes.remove(attribute);
        self.change_impact = self.compute_impact();
        removed
    }
}

/// Ordered collection of differences keyed by logical id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DifferenceCollection<T> {
    diffs: BTreeMap<String, T>,
}

impl<T> Default for DifferenceCollection<T> {
    fn default() -> Self {
        Self {
            diffs: BTreeMap::new(),
        }
    }
}

impl<T> DifferenceCollection<T> {
    /// Creates a collection from a map of differences.
    #[must_use]
    pub const fn new(diffs: BTreeMap<String, T>) -> Self {
        Self { diffs }
    }

    /// Returns the number of differences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    /// Returns true if the collection holds no differences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Returns the difference recorded for `logical_id`, if any.
    #[must_use]
    pub fn find(&self, logical_id: &str) -> Option<&T> {
        self.diffs.get(logical_id)
    }

    /// Iterates over the differences in logical id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> + '_ {
        self.diffs.iter().map(|(id, diff)| (id.as_str(), diff))
    }

    /// Mutable access for the propagation and reconciliation passes.
    pub(crate) fn find_mut(&mut self, logical_id: &str) -> Option<&mut T> {
        self.diffs.get_mut(logical_id)
    }

    /// Returns the entry for `logical_id`, inserting one built by `make` if absent.
    pub(crate) fn entry_or_insert_with(&mut self, logical_id: &str, make: impl FnOnce() -> T) -> &mut T {
        self.diffs.entry(logical_id.to_string()).or_insert_with(make)
    }

    /// Keeps only the differences for which `keep` returns true.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str, &T) -> bool) {
        self.diffs.retain(|id, diff| keep(id, diff));
    }
}

impl<T: Clone> DifferenceCollection<T> {
    /// Returns a new collection holding only the matching differences.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Self {
        Self::new(
            self.diffs
                .iter()
                .filter(|(_, diff)| predicate(diff))
                .map(|(id, diff)| (id.clone(), diff.clone()))
                .collect(),
        )
    }
}

impl<T: Clone + Default> DifferenceCollection<T> {
    /// Returns the difference for `logical_id`, synthesizing an unchanged
    /// difference when none was recorded.
    #[must_use]
    pub fn get(&self, logical_id: &str) -> Cow<'_, T> {
        self.diffs
            .get(logical_id)
            .map_or_else(|| Cow::Owned(T::default()), Cow::Borrowed)
    }
}

impl<'a, T> IntoIterator for &'a DifferenceCollection<T> {
    type Item = (&'a String, &'a T);
    type IntoIter = std::collections::btree_map::Iter<'a, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.iter()
    }
}

/// Whole-template difference.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDiff {
    /// `AWSTemplateFormatVersion` difference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<Difference<Value>>,
    /// `Description` difference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Difference<Value>>,
    /// `Transform` difference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Difference<Value>>,
    /// Template-level metadata differences.
    pub metadata: DifferenceCollection<Difference<Value>>,
    /// Parameter differences.
    pub parameters: DifferenceCollection<Difference<Value>>,
    /// Mapping differences.
    pub mappings: DifferenceCollection<Difference<Value>>,
    /// Condition differences.
    pub conditions: DifferenceCollection<Difference<Value>>,
    /// Resource differences.
    pub resources: DifferenceCollection<ResourceDifference>,
    /// Output differences.
    pub outputs: DifferenceCollection<Difference<Value>>,
    /// Differences of top-level keys that are not a known section.
    pub unknown_top_level_keys: DifferenceCollection<Difference<Value>>,
}

impl TemplateDiff {
    /// Returns true if the two templates are structurally identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.differences_count() == 0
    }

    /// Returns the total number of differences across all sections.
    #[must_use]
    pub fn differences_count(&self) -> usize {
        let attributes = [&self.format_version, &self.description, &self.transform]
            .into_iter()
            .filter(|difference| difference.is_some())
            .count();
        attributes
            + self.metadata.len()
            + self.parameters.len()
            + self.mappings.len()
            + self.conditions.len()
            + self.resources.len()
            + self.outputs.len()
            + self.unknown_top_level_keys.len()
    }

    /// Counts the resources with the given impact.
    #[must_use]
    pub fn count_resources(&self, impact: ResourceImpact) -> usize {
        self.resources
            .iter()
            .filter(|(_, diff)| diff.change_impact() == impact)
            .count()
    }

    /// Returns the logical ids of resources that may or will be replaced.
    #[must_use]
    pub fn replaced_resources(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, diff)| diff.change_impact().is_replacement())
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns true if any resource may or will be replaced.
    #[must_use]
    pub fn has_replacements(&self) -> bool {
        self.resources
            .iter()
            .any(|(_, diff)| diff.change_impact().is_replacement())
    }
}
