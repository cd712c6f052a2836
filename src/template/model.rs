//! Typed view of an infrastructure template.
//!
//! A template is a JSON document with a handful of well-known sections. Keyed
//! sections map logical ids to entity bodies; everything the engine does not
//! know about is kept verbatim in [`Template::unknown`] so it can be diffed
//! generically.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::TemplateError;

use super::normalize::normalize_intrinsics;
use super::references::rewrite_references;

/// Resource attribute holding the resource type.
pub const TYPE_ATTRIBUTE: &str = "Type";
/// Resource attribute holding the property map.
pub const PROPERTIES_ATTRIBUTE: &str = "Properties";
/// Resource attribute holding resource-level metadata.
pub const METADATA_ATTRIBUTE: &str = "Metadata";
/// Resource attribute listing explicit dependencies.
pub const DEPENDS_ON_ATTRIBUTE: &str = "DependsOn";
/// Resource attribute controlling what happens on removal.
pub const DELETION_POLICY_ATTRIBUTE: &str = "DeletionPolicy";

/// Well-known top-level template sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// `AWSTemplateFormatVersion`.
    FormatVersion,
    /// `Description`.
    Description,
    /// `Metadata`.
    Metadata,
    /// `Parameters`.
    Parameters,
    /// `Mappings`.
    Mappings,
    /// `Conditions`.
    Conditions,
    /// `Transform`.
    Transform,
    /// `Resources`.
    Resources,
    /// `Outputs`.
    Outputs,
}

impl Section {
    /// All known sections, in document order.
    pub const ALL: [Self; 9] = [
        Self::FormatVersion,
        Self::Description,
        Self::Metadata,
        Self::Parameters,
        Self::Mappings,
        Self::Conditions,
        Self::Transform,
        Self::Resources,
        Self::Outputs,
    ];

    /// Returns the top-level key of this section.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::FormatVersion => "AWSTemplateFormatVersion",
            Self::Description => "Description",
            Self::Metadata => "Metadata",
            Self::Parameters => "Parameters",
            Self::Mappings => "Mappings",
            Self::Conditions => "Conditions",
            Self::Transform => "Transform",
            Self::Resources => "Resources",
            Self::Outputs => "Outputs",
        }
    }

    /// Looks up a section by its top-level key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.key() == key)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    /// `AWSTemplateFormatVersion` value.
    pub format_version: Option<Value>,
    /// `Description` value.
    pub description: Option<Value>,
    /// `Transform` value.
    pub transform: Option<Value>,
    /// Template-level metadata entries.
    pub metadata: BTreeMap<String, Value>,
    /// Parameter declarations.
    pub parameters: BTreeMap<String, Value>,
    /// Mapping tables.
    pub mappings: BTreeMap<String, Value>,
    /// Condition definitions.
    pub conditions: BTreeMap<String, Value>,
    /// Managed resources.
    pub resources: BTreeMap<String, Resource>,
    /// Output declarations.
    pub outputs: BTreeMap<String, Value>,
    /// Top-level keys that are not a known section.
    pub unknown: BTreeMap<String, Value>,
}

/// A single managed resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// The resource type (e.g. `AWS::S3::Bucket`).
    pub resource_type: String,
    /// The resource property map.
    pub properties: BTreeMap<String, Value>,
    /// Every other resource attribute (policies, `DependsOn`, `Condition`,
    /// `Metadata`, unknown attributes).
    pub rest: BTreeMap<String, Value>,
}

impl Template {
    /// Builds a template from a JSON document.
    ///
    /// Intrinsic functions are normalized to their canonical long form before
    /// the sections are split out.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MalformedInput`] if the document is not a
    /// mapping, a keyed section is not a mapping, or a resource is malformed.
    pub fn from_value(document: &Value) -> Result<Self, TemplateError> {
        let mut document = document.clone();
        normalize_intrinsics(&mut document);

        let Value::Object(root) = document else {
            return Err(TemplateError::malformed(
                "<root>",
                format!("expected a mapping, found {}", value_kind(&document)),
            ));
        };

        let mut template = Self::default();
        for (key, value) in root {
            match Section::from_key(&key) {
                Some(Section::FormatVersion) => template.format_version = Some(value),
                Some(Section::Description) => template.description = Some(value),
                Some(Section::Transform) => template.transform = Some(value),
                Some(Section::Metadata) => template.metadata = keyed_section(Section::Metadata, value)?,
                Some(Section::Parameters) => {
                    template.parameters = keyed_section(Section::Parameters, value)?;
                }
                Some(Section::Mappings) => template.mappings = keyed_section(Section::Mappings, value)?,
                Some(Section::Conditions) => {
                    template.conditions = keyed_section(Section::Conditions, value)?;
                }
                Some(Section::Outputs) => template.outputs = keyed_section(Section::Outputs, value)?,
                Some(Section::Resources) => {
                    for (logical_id, body) in keyed_section(Section::Resources, value)? {
                        let resource = Resource::from_value(&logical_id, &body)?;
                        template.resources.insert(logical_id, resource);
                    }
                }
                None => {
                    template.unknown.insert(key, value);
                }
            }
        }

        Ok(template)
    }

    /// Converts the template back into a JSON document.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        let attributes = [
            (Section::FormatVersion, &self.format_version),
            (Section::Description, &self.description),
            (Section::Transform, &self.transform),
        ];
        for (section, value) in attributes {
            if let Some(value) = value {
                root.insert(section.key().to_string(), value.clone());
            }
        }

        let keyed = [
            (Section::Metadata, &self.metadata),
            (Section::Parameters, &self.parameters),
            (Section::Mappings, &self.mappings),
            (Section::Conditions, &self.conditions),
            (Section::Outputs, &self.outputs),
        ];
        for (section, entries) in keyed {
            if !entries.is_empty() {
                root.insert(section.key().to_string(), map_to_value(entries));
            }
        }

        if !self.resources.is_empty() {
            let resources = self
                .resources
                .iter()
                .map(|(id, resource)| (id.clone(), resource.to_value()))
                .collect();
            root.insert(Section::Resources.key().to_string(), Value::Object(resources));
        }

        for (key, value) in &self.unknown {
            root.insert(key.clone(), value.clone());
        }

        Value::Object(root)
    }

    /// Returns the number of resources declared in the template.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if `id` is declared in any keyed section that can be
    /// referenced from a resource.
    #[must_use]
    pub fn declares_logical_id(&self, id: &str) -> bool {
        self.resources.contains_key(id)
            || self.parameters.contains_key(id)
            || self.conditions.contains_key(id)
            || self.mappings.contains_key(id)
            || self.outputs.contains_key(id)
    }

    /// Rewrites every reference expression pointing at `logical_id` so that it
    /// points at `marker` instead.
    ///
    /// Returns the number of rewritten references.
    pub fn rewrite_references(&mut self, logical_id: &str, marker: &str) -> usize {
        let mut rewritten = 0;

        for resource in self.resources.values_mut() {
            rewritten += resource
                .properties
                .values_mut()
                .chain(resource.rest.values_mut())
                .map(|value| rewrite_references(value, logical_id, marker))
                .sum::<usize>();
        }

        let sections = [
            &mut self.metadata,
            &mut self.parameters,
            &mut self.mappings,
            &mut self.conditions,
            &mut self.outputs,
            &mut self.unknown,
        ];
        for entries in sections {
            rewritten += entries
                .values_mut()
                .map(|value| rewrite_references(value, logical_id, marker))
                .sum::<usize>();
        }

        rewritten
    }

    /// Removes the `Metadata` attribute from every resource.
    pub fn strip_resource_metadata(&mut self) {
        for resource in self.resources.values_mut() {
            resource.rest.remove(METADATA_ATTRIBUTE);
        }
    }

    /// Drops every resource whose type is listed in `resource_types`.
    pub fn remove_resource_types(&mut self, resource_types: &[String]) {
        if resource_types.is_empty() {
            return;
        }
        self.resources
            .retain(|_, resource| !resource_types.iter().any(|t| *t == resource.resource_type));
    }
}

impl Resource {
    /// Creates a resource with the given type and no properties.
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: BTreeMap::new(),
            rest: BTreeMap::new(),
        }
    }

    /// Sets a property, returning the resource.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Builds a resource from its template body.
    ///
    /// A string `DependsOn` is normalized to a one-element list.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MalformedInput`] if the body is not a mapping,
    /// has no string `Type`, or has a non-mapping `Properties`.
    pub fn from_value(logical_id: &str, body: &Value) -> Result<Self, TemplateError> {
        let path = format!("{}.{logical_id}", Section::Resources.key());
        let Value::Object(attributes) = body else {
            return Err(TemplateError::malformed(
                path,
                format!("expected a mapping, found {}", value_kind(body)),
            ));
        };

        let mut resource_type = None;
        let mut properties = BTreeMap::new();
        let mut rest = BTreeMap::new();

        for (key, value) in attributes {
            match key.as_str() {
                TYPE_ATTRIBUTE => match value {
                    Value::String(t) => resource_type = Some(t.clone()),
                    other => {
                        return Err(TemplateError::malformed(
                            path,
                            format!("Type must be a string, found {}", value_kind(other)),
                        ));
                    }
                },
                PROPERTIES_ATTRIBUTE => match value {
                    Value::Object(map) => {
                        properties = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    }
                    Value::Null => {}
                    other => {
                        return Err(TemplateError::malformed(
                            path,
                            format!("Properties must be a mapping, found {}", value_kind(other)),
                        ));
                    }
                },
                DEPENDS_ON_ATTRIBUTE => {
                    let normalized = match value {
                        Value::String(dependency) => Value::Array(vec![Value::String(dependency.clone())]),
                        other => other.clone(),
                    };
                    rest.insert(key.clone(), normalized);
                }
                _ => {
                    rest.insert(key.clone(), value.clone());
                }
            }
        }

        let resource_type = resource_type
            .ok_or_else(|| TemplateError::malformed(path, "resource has no Type"))?;

        Ok(Self {
            resource_type,
            properties,
            rest,
        })
    }

    /// Converts the resource back into its template body.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert(TYPE_ATTRIBUTE.to_string(), Value::String(self.resource_type.clone()));
        if !self.properties.is_empty() {
            body.insert(PROPERTIES_ATTRIBUTE.to_string(), map_to_value(&self.properties));
        }
        for (key, value) in &self.rest {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }

    /// Returns the `DeletionPolicy` attribute, if it is a string.
    #[must_use]
    pub fn deletion_policy(&self) -> Option<&str> {
        self.rest.get(DELETION_POLICY_ATTRIBUTE).and_then(Value::as_str)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Splits a keyed section into its entries.
fn keyed_section(section: Section, value: Value) -> Result<BTreeMap<String, Value>, TemplateError> {
    match value {
        Value::Object(entries) => Ok(entries.into_iter().collect()),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(TemplateError::malformed(
            section.key(),
            format!("expected a mapping, found {}", value_kind(&other)),
        )),
    }
}

fn map_to_value(entries: &BTreeMap<String, Value>) -> Value {
    Value::Object(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Human-readable name of a JSON value kind, for error messages.
pub(crate) const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
