//! Template loader for JSON and YAML documents.
//!
//! Templates are read into a plain [`serde_json::Value`]; the diff engine works
//! on documents, not on files. YAML short-form intrinsic tags such as `!Ref` or
//! `!GetAtt` are expanded into their long JSON form while loading.

use serde_json::{Map, Value};
use serde_yaml::value::TaggedValue;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, TemplateError};

use super::model::Template;

/// Loader for template documents.
#[derive(Debug, Default)]
pub struct TemplateParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl TemplateParser {
    /// Creates a new template parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Resolves a path against the base path.
    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Loads a template document from a JSON or YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = self.resolve(path.as_ref());
        info!("Loading template from: {}", path.display());

        if !path.exists() {
            return Err(TemplateError::FileNotFound { path }.into());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            TemplateError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            )
        })?;

        self.parse_str(&content, Some(&path))
    }

    /// Loads and structurally checks a template file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is malformed.
    pub fn load_template(&self, path: impl AsRef<Path>) -> Result<Template> {
        let document = self.load_file(path)?;
        Ok(Template::from_value(&document)?)
    }

    /// Parses a template document from a string, detecting JSON or YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is neither valid JSON nor valid YAML.
    pub fn parse_str(&self, content: &str, source: Option<&Path>) -> Result<Value> {
        let location = source.map(|p| p.display().to_string());

        if content.trim().is_empty() {
            debug!("Empty template document, treating as an empty mapping");
            return Ok(Value::Object(Map::new()));
        }

        if looks_like_json(content) {
            debug!("Parsing JSON template");
            return serde_json::from_str(content)
                .map_err(|e| TemplateError::parse(format!("JSON parse error: {e}"), location).into());
        }

        debug!("Parsing YAML template");
        let yaml: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| TemplateError::parse(format!("YAML parse error: {e}"), location.clone()))?;

        Ok(yaml_to_json(yaml, location.as_deref())?)
    }
}

/// Returns true if the document starts like a JSON object or array.
pub(crate) fn looks_like_json(content: &str) -> bool {
    matches!(content.trim_start().chars().next(), Some('{' | '['))
}

/// Converts a YAML value into JSON, expanding intrinsic tags.
fn yaml_to_json(value: serde_yaml::Value, location: Option<&str>) -> std::result::Result<Value, TemplateError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n, location)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(|item| yaml_to_json(item, location))
                .collect::<std::result::Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    _ => {
                        return Err(TemplateError::parse(
                            "YAML mapping keys must be scalars",
                            location.map(String::from),
                        ));
                    }
                };
                map.insert(key, yaml_to_json(value, location)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => expand_intrinsic(*tagged, location)?,
    })
}

/// JSON has no spelling for `.inf` or `.nan`, so those are rejected.
fn yaml_number(n: &serde_yaml::Number, location: Option<&str>) -> std::result::Result<Value, TemplateError> {
    if let Some(i) = n.as_i64() {
        Ok(Value::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::from(u))
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| {
                TemplateError::parse(
                    format!("YAML number {n} has no JSON representation"),
                    location.map(String::from),
                )
            })
    }
}

/// Expands a short-form intrinsic tag (`!Ref X`, `!GetAtt X.Arn`, `!Sub ...`).
fn expand_intrinsic(tagged: TaggedValue, location: Option<&str>) -> std::result::Result<Value, TemplateError> {
    let tag = tagged.tag.to_string();
    let name = tag.trim_start_matches('!').to_string();
    let argument = yaml_to_json(tagged.value, location)?;

    let (key, argument) = match name.as_str() {
        "Ref" | "Condition" => (name, argument),
        "GetAtt" => {
            let argument = match argument {
                Value::String(target) => match target.split_once('.') {
                    Some((logical_id, attribute)) => Value::Array(vec![
                        Value::String(logical_id.to_string()),
                        Value::String(attribute.to_string()),
                    ]),
                    None => Value::String(target),
                },
                other => other,
            };
            (String::from("Fn::GetAtt"), argument)
        }
        _ => (format!("Fn::{name}"), argument),
    };

    let mut map = Map::new();
    map.insert(key, argument);
    Ok(Value::Object(map))
}
