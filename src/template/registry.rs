//! Static replacement metadata for resource properties.
//!
//! For a resource type and property name, the registry answers whether
//! changing that property replaces the resource, updates it in place, or
//! depends on the new value. The engine only sees the [`ReplacementSource`]
//! trait; [`ReplacementRegistry`] is the table-backed implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::parser::looks_like_json;

/// How a property change affects the physical identity of its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReplacementBehavior {
    /// The resource is always replaced.
    #[serde(alias = "Immutable")]
    Always,
    /// The resource is updated in place.
    #[serde(alias = "Mutable")]
    Never,
    /// The resource may be replaced depending on the new value.
    #[serde(alias = "Conditional")]
    Conditionally,
    /// No information is available.
    #[default]
    Unknown,
}

impl ReplacementBehavior {
    /// Rank used when several verdicts apply to the same property.
    const fn rank(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Never => 1,
            Self::Conditionally => 2,
            Self::Always => 3,
        }
    }

    /// Returns the more severe of two verdicts.
    #[must_use]
    pub const fn most_severe(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }
}

impl std::fmt::Display for ReplacementBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Always => "Always",
            Self::Never => "Never",
            Self::Conditionally => "Conditionally",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Lookup of static replacement metadata.
#[cfg_attr(test, mockall::automock)]
pub trait ReplacementSource {
    /// Returns the replacement behavior of `property` on `resource_type`.
    fn property_behavior(&self, resource_type: &str, property: &str) -> ReplacementBehavior;
}

/// Builtin replacement metadata for commonly used resource types.
const BUILTIN_SPECS: &[(&str, &str, ReplacementBehavior)] = &[
    ("AWS::S3::Bucket", "BucketName", ReplacementBehavior::Always),
    ("AWS::S3::Bucket", "ObjectLockEnabled", ReplacementBehavior::Always),
    ("AWS::S3::Bucket", "VersioningConfiguration", ReplacementBehavior::Never),
    ("AWS::S3::Bucket", "Tags", ReplacementBehavior::Never),
    ("AWS::S3::BucketPolicy", "Bucket", ReplacementBehavior::Always),
    ("AWS::S3::BucketPolicy", "PolicyDocument", ReplacementBehavior::Never),
    ("AWS::SQS::Queue", "QueueName", ReplacementBehavior::Always),
    ("AWS::SQS::Queue", "FifoQueue", ReplacementBehavior::Always),
    ("AWS::SQS::Queue", "VisibilityTimeout", ReplacementBehavior::Never),
    ("AWS::SNS::Topic", "TopicName", ReplacementBehavior::Always),
    ("AWS::SNS::Topic", "FifoTopic", ReplacementBehavior::Always),
    ("AWS::SNS::Topic", "DisplayName", ReplacementBehavior::Never),
    ("AWS::SNS::Subscription", "TopicArn", ReplacementBehavior::Always),
    ("AWS::SNS::Subscription", "Endpoint", ReplacementBehavior::Always),
    ("AWS::SNS::Subscription", "Protocol", ReplacementBehavior::Always),
    ("AWS::Lambda::Function", "FunctionName", ReplacementBehavior::Always),
    ("AWS::Lambda::Function", "PackageType", ReplacementBehavior::Always),
    ("AWS::Lambda::Function", "Code", ReplacementBehavior::Never),
    ("AWS::Lambda::Function", "Role", ReplacementBehavior::Never),
    ("AWS::Lambda::Function", "Runtime", ReplacementBehavior::Never),
    ("AWS::Lambda::Function", "Environment", ReplacementBehavior::Never),
    ("AWS::Lambda::Permission", "FunctionName", ReplacementBehavior::Always),
    ("AWS::Lambda::Permission", "Action", ReplacementBehavior::Always),
    ("AWS::Lambda::Permission", "Principal", ReplacementBehavior::Always),
    ("AWS::Lambda::Permission", "SourceArn", ReplacementBehavior::Always),
    ("AWS::IAM::Role", "RoleName", ReplacementBehavior::Always),
    ("AWS::IAM::Role", "Path", ReplacementBehavior::Always),
    ("AWS::IAM::Role", "AssumeRolePolicyDocument", ReplacementBehavior::Never),
    ("AWS::IAM::Role", "Policies", ReplacementBehavior::Never),
    ("AWS::IAM::Policy", "PolicyName", ReplacementBehavior::Never),
    ("AWS::IAM::Policy", "PolicyDocument", ReplacementBehavior::Never),
    ("AWS::DynamoDB::Table", "TableName", ReplacementBehavior::Always),
    ("AWS::DynamoDB::Table", "KeySchema", ReplacementBehavior::Always),
    ("AWS::DynamoDB::Table", "AttributeDefinitions", ReplacementBehavior::Conditionally),
    ("AWS::DynamoDB::Table", "BillingMode", ReplacementBehavior::Never),
    ("AWS::EC2::Instance", "ImageId", ReplacementBehavior::Always),
    ("AWS::EC2::Instance", "SubnetId", ReplacementBehavior::Always),
    ("AWS::EC2::Instance", "AvailabilityZone", ReplacementBehavior::Always),
    ("AWS::EC2::Instance", "InstanceType", ReplacementBehavior::Conditionally),
    ("AWS::EC2::Instance", "UserData", ReplacementBehavior::Conditionally),
    ("AWS::EC2::SecurityGroup", "GroupName", ReplacementBehavior::Always),
    ("AWS::EC2::SecurityGroup", "GroupDescription", ReplacementBehavior::Always),
    ("AWS::EC2::SecurityGroup", "VpcId", ReplacementBehavior::Always),
    ("AWS::EC2::SecurityGroup", "SecurityGroupIngress", ReplacementBehavior::Conditionally),
    ("AWS::Logs::LogGroup", "LogGroupName", ReplacementBehavior::Always),
    ("AWS::Logs::LogGroup", "RetentionInDays", ReplacementBehavior::Never),
    ("AWS::ECS::Service", "ServiceName", ReplacementBehavior::Always),
    ("AWS::ECS::Service", "Cluster", ReplacementBehavior::Always),
    ("AWS::ECS::Service", "LaunchType", ReplacementBehavior::Always),
    ("AWS::ECS::Service", "TaskDefinition", ReplacementBehavior::Never),
    ("AWS::Events::Rule", "Name", ReplacementBehavior::Always),
    ("AWS::Events::Rule", "EventBusName", ReplacementBehavior::Always),
    ("AWS::Events::Rule", "Targets", ReplacementBehavior::Never),
    ("AWS::KMS::Key", "KeySpec", ReplacementBehavior::Conditionally),
    ("AWS::KMS::Key", "KeyPolicy", ReplacementBehavior::Never),
];

/// Table-backed replacement metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementRegistry {
    /// Resource type -> property -> behavior.
    types: HashMap<String, HashMap<String, ReplacementBehavior>>,
}

/// Resource specification document (`ResourceTypes` -> `Properties` -> `UpdateType`).
#[derive(Debug, Deserialize)]
struct SpecificationDocument {
    #[serde(rename = "ResourceTypes")]
    resource_types: HashMap<String, SpecificationResourceType>,
}

#[derive(Debug, Deserialize)]
struct SpecificationResourceType {
    #[serde(rename = "Properties", default)]
    properties: HashMap<String, SpecificationProperty>,
}

#[derive(Debug, Deserialize)]
struct SpecificationProperty {
    #[serde(rename = "UpdateType", default)]
    update_type: ReplacementBehavior,
}

impl ReplacementRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the builtin replacement table.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (resource_type, property, behavior) in BUILTIN_SPECS {
            registry.register(*resource_type, *property, *behavior);
        }
        registry
    }

    /// Registers the behavior of a single property.
    pub fn register(
        &mut self,
        resource_type: impl Into<String>,
        property: impl Into<String>,
        behavior: ReplacementBehavior,
    ) {
        self.types
            .entry(resource_type.into())
            .or_default()
            .insert(property.into(), behavior);
    }

    /// Merges another registry into this one; entries of `other` win.
    pub fn merge(&mut self, other: Self) {
        for (resource_type, properties) in other.types {
            self.types.entry(resource_type).or_default().extend(properties);
        }
    }

    /// Loads a registry from a JSON or YAML file.
    ///
    /// Two layouts are accepted: a flat `{type: {property: behavior}}` table, or
    /// a resource specification document with `ResourceTypes` whose properties
    /// carry an `UpdateType` of `Immutable`, `Mutable` or `Conditional`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has neither layout.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading replacement metadata from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content, Some(path))
    }

    /// Parses a registry from a JSON or YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content has neither supported layout.
    pub fn parse_str(content: &str, source: Option<&Path>) -> Result<Self> {
        let location = source.map(|p| p.display().to_string());
        let parse_error = |message: String| ConfigError::ParseError {
            message,
            location: location.clone(),
        };

        let document: Value = if looks_like_json(content) {
            serde_json::from_str(content).map_err(|e| parse_error(format!("JSON parse error: {e}")))?
        } else {
            serde_yaml::from_str(content).map_err(|e| parse_error(format!("YAML parse error: {e}")))?
        };

        let mut registry = Self::new();
        if document.get("ResourceTypes").is_some() {
            let specification: SpecificationDocument = serde_json::from_value(document)
                .map_err(|e| parse_error(format!("Invalid resource specification: {e}")))?;
            for (resource_type, spec) in specification.resource_types {
                for (property, property_spec) in spec.properties {
                    registry.register(resource_type.clone(), property, property_spec.update_type);
                }
            }
        } else {
            let table: HashMap<String, HashMap<String, ReplacementBehavior>> =
                serde_json::from_value(document)
                    .map_err(|e| parse_error(format!("Invalid replacement table: {e}")))?;
            registry.types = table;
        }

        debug!("Loaded replacement metadata for {} resource types", registry.types.len());
        Ok(registry)
    }

    /// Returns all known resource types, sorted.
    #[must_use]
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.types.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Returns the known properties of a resource type, sorted by name.
    #[must_use]
    pub fn properties(&self, resource_type: &str) -> Option<BTreeMap<&str, ReplacementBehavior>> {
        self.types.get(resource_type).map(|properties| {
            properties
                .iter()
                .map(|(name, behavior)| (name.as_str(), *behavior))
                .collect()
        })
    }

    /// Returns true if the registry holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl ReplacementSource for ReplacementRegistry {
    fn property_behavior(&self, resource_type: &str, property: &str) -> ReplacementBehavior {
        self.types
            .get(resource_type)
            .and_then(|properties| properties.get(property))
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = ReplacementRegistry::builtin();
        assert_eq!(
            registry.property_behavior("AWS::S3::Bucket", "BucketName"),
            ReplacementBehavior::Always
        );
        assert_eq!(
            registry.property_behavior("AWS::S3::Bucket", "Unheard"),
            ReplacementBehavior::Unknown
        );
        assert_eq!(
            registry.property_behavior("Custom::Thing", "Name"),
            ReplacementBehavior::Unknown
        );
    }

    #[test]
    fn test_parse_flat_table() {
        let registry = ReplacementRegistry::parse_str(
            r#"{ "X::Y": { "Name": "Always", "Size": "Conditionally", "Tags": "Never" } }"#,
            None,
        )
        .unwrap();
        assert_eq!(registry.property_behavior("X::Y", "Name"), ReplacementBehavior::Always);
        assert_eq!(
            registry.property_behavior("X::Y", "Size"),
            ReplacementBehavior::Conditionally
        );
        assert_eq!(registry.property_behavior("X::Y", "Tags"), ReplacementBehavior::Never);
    }

    #[test]
    fn test_parse_specification_document() {
        let yaml = r"
ResourceTypes:
  X::Y:
    Properties:
      Name:
        UpdateType: Immutable
      Size:
        UpdateType: Conditional
      Tags:
        UpdateType: Mutable
      Docs: {}
";
        let registry = ReplacementRegistry::parse_str(yaml, None).unwrap();
        assert_eq!(registry.property_behavior("X::Y", "Name"), ReplacementBehavior::Always);
        assert_eq!(
            registry.property_behavior("X::Y", "Size"),
            ReplacementBehavior::Conditionally
        );
        assert_eq!(registry.property_behavior("X::Y", "Tags"), ReplacementBehavior::Never);
        assert_eq!(registry.property_behavior("X::Y", "Docs"), ReplacementBehavior::Unknown);
    }

    #[test]
    fn test_invalid_behavior_is_rejected() {
        let err = ReplacementRegistry::parse_str(r#"{ "X::Y": { "Name": "Sometimes" } }"#, None)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid replacement table"));
    }

    #[test]
    fn test_merge_overrides_builtin() {
        let mut registry = ReplacementRegistry::builtin();
        let mut overrides = ReplacementRegistry::new();
        overrides.register("AWS::S3::Bucket", "BucketName", ReplacementBehavior::Never);
        registry.merge(overrides);

        assert_eq!(
            registry.property_behavior("AWS::S3::Bucket", "BucketName"),
            ReplacementBehavior::Never
        );
        assert_eq!(
            registry.property_behavior("AWS::S3::Bucket", "ObjectLockEnabled"),
            ReplacementBehavior::Always
        );
    }

    #[test]
    fn test_most_severe() {
        assert_eq!(
            ReplacementBehavior::Never.most_severe(ReplacementBehavior::Always),
            ReplacementBehavior::Always
        );
        assert_eq!(
            ReplacementBehavior::Conditionally.most_severe(ReplacementBehavior::Unknown),
            ReplacementBehavior::Conditionally
        );
    }

    #[test]
    fn test_listing_is_sorted() {
        let registry = ReplacementRegistry::builtin();
        let types = registry.resource_types();
        let mut sorted = types.clone();
        sorted.sort_unstable();
        assert_eq!(types, sorted);
        assert!(registry.properties("AWS::SQS::Queue").unwrap().contains_key("QueueName"));
    }
}
