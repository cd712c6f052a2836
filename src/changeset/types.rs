//! Change-set data model.
//!
//! Two vocabularies are accepted on input: the compact camelCase form
//! (`logicalResourceId`, `propertyPath`, `requiresRecreation: true`) and the
//! PascalCase form returned by `describe-change-set`, where every change is
//! wrapped in a `ResourceChange` object and property records carry a nested
//! `Target`.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::template::{PROPERTIES_ATTRIBUTE, ReplacementBehavior};

/// A planned change set for a stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Change set name.
    #[serde(default, alias = "ChangeSetName", skip_serializing_if = "Option::is_none")]
    pub change_set_name: Option<String>,
    /// Stack the change set applies to.
    #[serde(default, alias = "StackName", skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,
    /// Planned resource changes, in the order the planner reported them.
    #[serde(default, alias = "Changes", deserialize_with = "deserialize_changes")]
    pub changes: Vec<ResourceChange>,
}

impl ChangeSet {
    /// Creates a change set from a list of resource changes.
    #[must_use]
    pub const fn new(changes: Vec<ResourceChange>) -> Self {
        Self {
            change_set_name: None,
            stack_name: None,
            changes,
        }
    }

    /// Returns the change recorded for `logical_id`, if any.
    #[must_use]
    pub fn change_for(&self, logical_id: &str) -> Option<&ResourceChange> {
        self.changes
            .iter()
            .find(|change| change.logical_resource_id == logical_id)
    }

    /// Returns true if the change set lists no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// A planned change to one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChange {
    /// Logical id of the resource.
    #[serde(alias = "LogicalResourceId", alias = "logicalId")]
    pub logical_resource_id: String,
    /// Planned action (`Add`, `Modify`, `Remove`, ...).
    #[serde(default, alias = "Action", skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Resource type.
    #[serde(default, alias = "ResourceType", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Whether the resource as a whole is replaced.
    #[serde(default, alias = "Replacement", deserialize_with = "deserialize_replacement")]
    pub replacement: Replacement,
    /// Per-property planned changes.
    #[serde(default, alias = "Details")]
    pub details: Vec<PropertyChange>,
}

impl ResourceChange {
    /// Creates a resource change with no details.
    #[must_use]
    pub fn new(logical_resource_id: impl Into<String>, replacement: Replacement) -> Self {
        Self {
            logical_resource_id: logical_resource_id.into(),
            replacement,
            ..Self::default()
        }
    }

    /// Adds a property change, returning the resource change.
    #[must_use]
    pub fn with_detail(mut self, detail: PropertyChange) -> Self {
        self.details.push(detail);
        self
    }
}

/// Whole-resource replacement verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Replacement {
    /// The resource is replaced.
    True,
    /// The resource is updated in place.
    #[default]
    False,
    /// Replacement depends on runtime values.
    Conditional,
}

/// How a property change was evaluated by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Evaluation {
    /// The new value is known at planning time.
    #[default]
    Static,
    /// The new value is only known at deploy time.
    Dynamic,
}

/// Whether a property change requires recreating the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequiresRecreation {
    /// Always recreated.
    Always,
    /// Never recreated.
    #[default]
    Never,
    /// Recreated depending on the new value.
    Conditionally,
}

impl RequiresRecreation {
    /// Converts to the equivalent replacement verdict.
    #[must_use]
    pub const fn behavior(self) -> ReplacementBehavior {
        match self {
            Self::Always => ReplacementBehavior::Always,
            Self::Never => ReplacementBehavior::Never,
            Self::Conditionally => ReplacementBehavior::Conditionally,
        }
    }
}

/// A planned change to one property of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPropertyChange")]
pub struct PropertyChange {
    /// Resource attribute the change targets (usually `Properties`).
    pub attribute: String,
    /// Property path (`BucketName`, `/Properties/BucketName`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_path: Option<String>,
    /// Recreation verdict.
    pub requires_recreation: RequiresRecreation,
    /// Evaluation mode.
    pub evaluation: Evaluation,
}

impl PropertyChange {
    /// Creates a change targeting a property.
    #[must_use]
    pub fn property(
        path: impl Into<String>,
        requires_recreation: RequiresRecreation,
        evaluation: Evaluation,
    ) -> Self {
        Self {
            attribute: PROPERTIES_ATTRIBUTE.to_string(),
            property_path: Some(path.into()),
            requires_recreation,
            evaluation,
        }
    }

    /// Returns true if the change targets the resource property map.
    #[must_use]
    pub fn targets_properties(&self) -> bool {
        self.attribute == PROPERTIES_ATTRIBUTE
    }

    /// Returns the top-level property name of the path.
    ///
    /// `/Properties/Tags/0` and `Tags.0` both yield `Tags`.
    #[must_use]
    pub fn property_name(&self) -> Option<&str> {
        let path = self.property_path.as_deref()?.trim_start_matches('/');
        let path = path
            .strip_prefix("Properties/")
            .or_else(|| path.strip_prefix("Properties."))
            .unwrap_or(path);
        path.split(['/', '.']).next().filter(|name| !name.is_empty())
    }

    /// Replacement verdict for this change.
    ///
    /// A required recreation is certain for a static evaluation and only
    /// possible for a dynamic one; every other verdict passes through.
    #[must_use]
    pub const fn replacement_behavior(&self) -> ReplacementBehavior {
        match (self.requires_recreation, self.evaluation) {
            (RequiresRecreation::Always, Evaluation::Static) => ReplacementBehavior::Always,
            (RequiresRecreation::Always, Evaluation::Dynamic) => ReplacementBehavior::Conditionally,
            (other, _) => other.behavior(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecreationFlag {
    Flag(bool),
    Verdict(RequiresRecreation),
}

impl From<RecreationFlag> for RequiresRecreation {
    fn from(flag: RecreationFlag) -> Self {
        match flag {
            RecreationFlag::Flag(true) => Self::Always,
            RecreationFlag::Flag(false) => Self::Never,
            RecreationFlag::Verdict(verdict) => verdict,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTarget {
    #[serde(default, alias = "Attribute")]
    attribute: Option<String>,
    #[serde(default, alias = "Name", alias = "PropertyPath", alias = "propertyPath")]
    name: Option<String>,
    #[serde(default, alias = "RequiresRecreation")]
    requires_recreation: Option<RecreationFlag>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPropertyChange {
    #[serde(default, alias = "Target")]
    target: Option<RawTarget>,
    #[serde(default, alias = "Attribute")]
    attribute: Option<String>,
    #[serde(default, alias = "PropertyPath", alias = "name", alias = "Name")]
    property_path: Option<String>,
    #[serde(default, alias = "RequiresRecreation")]
    requires_recreation: Option<RecreationFlag>,
    #[serde(default, alias = "Evaluation")]
    evaluation: Evaluation,
}

#[derive(Debug)]
struct MissingRecreation;

impl fmt::Display for MissingRecreation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "property change has no requiresRecreation verdict")
    }
}

impl TryFrom<RawPropertyChange> for PropertyChange {
    type Error = MissingRecreation;

    fn try_from(raw: RawPropertyChange) -> Result<Self, Self::Error> {
        let (target_attribute, target_name, target_recreation) = match raw.target {
            Some(target) => (target.attribute, target.name, target.requires_recreation),
            None => (None, None, None),
        };

        let requires_recreation = raw
            .requires_recreation
            .or(target_recreation)
            .ok_or(MissingRecreation)?;

        Ok(Self {
            attribute: raw
                .attribute
                .or(target_attribute)
                .unwrap_or_else(|| PROPERTIES_ATTRIBUTE.to_string()),
            property_path: raw.property_path.or(target_name),
            requires_recreation: requires_recreation.into(),
            evaluation: raw.evaluation,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplacementFlag {
    Flag(bool),
    Verdict(Replacement),
}

fn deserialize_replacement<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Replacement, D::Error> {
    Ok(match ReplacementFlag::deserialize(deserializer)? {
        ReplacementFlag::Flag(true) => Replacement::True,
        ReplacementFlag::Flag(false) => Replacement::False,
        ReplacementFlag::Verdict(verdict) => verdict,
    })
}

#[derive(Deserialize)]
struct WrappedChange {
    #[serde(rename = "resourceChange", alias = "ResourceChange")]
    resource_change: ResourceChange,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChangeRecord {
    Wrapped(WrappedChange),
    Direct(ResourceChange),
}

fn deserialize_changes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ResourceChange>, D::Error> {
    let records = Vec::<ChangeRecord>::deserialize(deserializer)?;
    Ok(records
        .into_iter()
        .map(|record| match record {
            ChangeRecord::Wrapped(wrapped) => wrapped.resource_change,
            ChangeRecord::Direct(change) => change,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compact_vocabulary() {
        let change_set: ChangeSet = serde_json::from_value(json!({
            "changes": [{
                "logicalResourceId": "Bucket",
                "replacement": true,
                "details": [
                    { "propertyPath": "BucketName", "requiresRecreation": true, "evaluation": "Static" }
                ]
            }]
        }))
        .unwrap();

        let change = change_set.change_for("Bucket").unwrap();
        assert_eq!(change.replacement, Replacement::True);
        assert_eq!(change.details[0].property_name(), Some("BucketName"));
        assert_eq!(change.details[0].requires_recreation, RequiresRecreation::Always);
        assert!(change.details[0].targets_properties());
    }

    #[test]
    fn test_describe_change_set_vocabulary() {
        let change_set: ChangeSet = serde_json::from_value(json!({
            "ChangeSetName": "cs-1",
            "StackName": "demo",
            "Changes": [{
                "Type": "Resource",
                "ResourceChange": {
                    "Action": "Modify",
                    "LogicalResourceId": "Queue",
                    "ResourceType": "AWS::SQS::Queue",
                    "Replacement": "Conditional",
                    "Details": [{
                        "Target": {
                            "Attribute": "Properties",
                            "Name": "QueueName",
                            "RequiresRecreation": "Always"
                        },
                        "Evaluation": "Dynamic",
                        "ChangeSource": "DirectModification"
                    }]
                }
            }]
        }))
        .unwrap();

        assert_eq!(change_set.stack_name.as_deref(), Some("demo"));
        let change = change_set.change_for("Queue").unwrap();
        assert_eq!(change.replacement, Replacement::Conditional);
        assert_eq!(change.action.as_deref(), Some("Modify"));
        let detail = &change.details[0];
        assert_eq!(detail.property_name(), Some("QueueName"));
        assert_eq!(detail.evaluation, Evaluation::Dynamic);
        assert_eq!(detail.replacement_behavior(), ReplacementBehavior::Conditionally);
    }

    #[test]
    fn test_replacement_behavior_classification() {
        let static_always = PropertyChange::property("A", RequiresRecreation::Always, Evaluation::Static);
        let never = PropertyChange::property("A", RequiresRecreation::Never, Evaluation::Dynamic);
        let conditional = PropertyChange::property("A", RequiresRecreation::Conditionally, Evaluation::Static);

        assert_eq!(static_always.replacement_behavior(), ReplacementBehavior::Always);
        assert_eq!(never.replacement_behavior(), ReplacementBehavior::Never);
        assert_eq!(conditional.replacement_behavior(), ReplacementBehavior::Conditionally);
    }

    #[test]
    fn test_property_name_from_paths() {
        let nested = PropertyChange::property("/Properties/Tags/0", RequiresRecreation::Never, Evaluation::Static);
        let dotted = PropertyChange::property("Tags.0", RequiresRecreation::Never, Evaluation::Static);
        assert_eq!(nested.property_name(), Some("Tags"));
        assert_eq!(dotted.property_name(), Some("Tags"));
    }

    #[test]
    fn test_missing_recreation_verdict_is_rejected() {
        let result: Result<PropertyChange, _> = serde_json::from_value(json!({ "propertyPath": "A" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_property_target() {
        let detail: PropertyChange = serde_json::from_value(json!({
            "Target": { "Attribute": "Metadata", "RequiresRecreation": "Never" },
            "Evaluation": "Static"
        }))
        .unwrap();
        assert!(!detail.targets_properties());
        assert_eq!(detail.property_name(), None);
    }
}
