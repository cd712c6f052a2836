//! Loader for change-set documents.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{ChangeSetError, Result};
use crate::template::looks_like_json;

use super::types::ChangeSet;

/// Loader for change sets stored as JSON or YAML.
#[derive(Debug, Default)]
pub struct ChangeSetLoader;

impl ChangeSetLoader {
    /// Creates a new loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a change set from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ChangeSet> {
        let path = path.as_ref();
        info!("Loading change set from: {}", path.display());

        if !path.exists() {
            return Err(ChangeSetError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content, Some(path))
    }

    /// Parses a change set from a string, detecting JSON or YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid change set.
    pub fn parse_str(&self, content: &str, source: Option<&Path>) -> Result<ChangeSet> {
        let location = source.map(|p| p.display().to_string());

        let change_set: ChangeSet = if looks_like_json(content) {
            serde_json::from_str(content)
                .map_err(|e| ChangeSetError::parse(format!("JSON parse error: {e}"), location))?
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| ChangeSetError::parse(format!("YAML parse error: {e}"), location))?
        };

        debug!("Parsed change set with {} resource changes", change_set.changes.len());
        Ok(change_set)
    }
}
