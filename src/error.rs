//! Error types for the stackdiff engine.
//!
//! This module provides the error hierarchy for every stage of a diff:
//! template loading, replacement propagation, change-set handling and
//! settings.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stackdiff.
#[derive(Debug, Error)]
pub enum StackDiffError {
    /// Template-related errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Replacement propagation errors.
    #[error("Propagation error: {0}")]
    Propagation(#[from] PropagationError),

    /// Change-set errors.
    #[error("Change set error: {0}")]
    ChangeSet(#[from] ChangeSetError),

    /// Settings errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Template-related errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template file was not found.
    #[error("Template file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The template document could not be parsed.
    #[error("Failed to parse template: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A section or entity does not have the required shape.
    #[error("Malformed template input at {path}: {message}")]
    MalformedInput {
        /// Location inside the template (e.g. `Resources` or `Resources.Bucket`).
        path: String,
        /// Description of the problem.
        message: String,
    },
}

/// Replacement propagation errors.
#[derive(Debug, Error)]
pub enum PropagationError {
    /// The synthetic replacement marker collides with a real logical id.
    #[error("Replacement marker '{marker}' for '{logical_id}' collides with an existing logical id")]
    AmbiguousReplacementMarker {
        /// The logical id being marked as replaced.
        logical_id: String,
        /// The colliding marker.
        marker: String,
    },

    /// The fixed-point loop did not converge within its bound.
    #[error("Replacement propagation did not converge after {limit} iterations")]
    IterationLimitExceeded {
        /// The iteration bound that was exceeded.
        limit: usize,
    },
}

/// Change-set errors.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// The change-set file was not found.
    #[error("Change set file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The change set could not be parsed.
    #[error("Failed to parse change set: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },
}

/// Settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The settings file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Result type alias for stackdiff operations.
pub type Result<T> = std::result::Result<T, StackDiffError>;

impl StackDiffError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error was caused by the shape of the input documents.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Template(TemplateError::MalformedInput { .. } | TemplateError::ParseError { .. })
                | Self::ChangeSet(ChangeSetError::ParseError { .. })
        )
    }
}

impl TemplateError {
    /// Creates a malformed-input error for a template location.
    #[must_use]
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a parse error with an optional location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl ChangeSetError {
    /// Creates a parse error with an optional location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_is_input_error() {
        let err: StackDiffError = TemplateError::malformed("Resources", "expected a mapping").into();
        assert!(err.is_input_error());
        assert_eq!(
            err.to_string(),
            "Template error: Malformed template input at Resources: expected a mapping"
        );
    }

    #[test]
    fn test_propagation_error_is_not_input_error() {
        let err: StackDiffError = PropagationError::IterationLimitExceeded { limit: 3 }.into();
        assert!(!err.is_input_error());
    }
}
