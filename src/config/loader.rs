//! Settings loader.
//!
//! Settings are read from the first `stackdiff.yaml` found while walking up
//! from the working directory, falling back to the user configuration
//! directory. `STACKDIFF_*` environment variables (including those from a
//! `.env` file) override file values.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::settings::DiffSettings;

/// Default settings file names to search for.
pub const DEFAULT_SETTINGS_FILES: &[&str] = &["stackdiff.yaml", "stackdiff.yml", ".stackdiff.yaml"];

/// Prefix of environment variables overriding settings.
pub const ENV_PREFIX: &str = "STACKDIFF_";

/// Loader for diff settings.
#[derive(Debug, Default)]
pub struct SettingsLoader {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl SettingsLoader {
    /// Creates a new settings loader.
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

    /// Loads settings from a YAML file.
    ///
    /// Relative paths inside the file are resolved against its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DiffSettings> {
        let path = match &self.base_path {
            Some(base) if path.as_ref().is_relative() => base.join(path),
            _ => path.as_ref().to_path_buf(),
        };
        info!("Loading settings from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound { path }.into());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        let mut settings = self.parse_yaml(&content, Some(&path))?;
        if let Some(dir) = path.parent() {
            settings.resolve_paths(dir);
        }
        Ok(settings)
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or fails validation.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DiffSettings> {
        debug!("Parsing YAML settings");

        if content.trim().is_empty() {
            return Ok(DiffSettings::default());
        }

        let settings: DiffSettings = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings for a run starting in `start_dir`.
    ///
    /// Uses the first settings file found walking up from `start_dir`, then
    /// the user settings file, then defaults; environment overrides are
    /// applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but is invalid, or an
    /// override has an invalid value.
    pub fn discover(&self, start_dir: impl AsRef<Path>) -> Result<DiffSettings> {
        self.load_dotenv()?;

        let candidate = find_settings_file(start_dir).or_else(|| user_settings_file().filter(|p| p.exists()));
        let mut settings = match candidate {
            Some(path) => self.load_file(path)?,
            None => {
                debug!("No settings file found, using defaults");
                DiffSettings::default()
            }
        };

        apply_env_overrides(&mut settings, |name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Finds a settings file in `start_dir` or one of its ancestors.
#[must_use]
pub fn find_settings_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_SETTINGS_FILES {
            let settings_path = current.join(filename);
            if settings_path.exists() {
                info!("Found settings file: {}", settings_path.display());
                return Some(settings_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Returns the per-user settings file path, if the platform has one.
#[must_use]
pub fn user_settings_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stackdiff").join("config.yaml"))
}

/// Applies `STACKDIFF_*` overrides read through `lookup`.
///
/// # Errors
///
/// Returns a validation error if an override cannot be parsed.
pub fn apply_env_overrides(
    settings: &mut DiffSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> std::result::Result<(), ConfigError> {
    let var = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

    if let Some(path) = var("REPLACEMENT_SPECS") {
        debug!("Overriding replacement_specs from environment");
        settings.replacement_specs = Some(PathBuf::from(path));
    }

    if let Some(value) = var("KEEP_METADATA") {
        debug!("Overriding keep_metadata from environment");
        settings.keep_metadata = Some(parse_flag(&value, "keep_metadata")?);
    }

    if let Some(value) = var("IGNORE_RESOURCE_TYPES") {
        debug!("Overriding ignore_resource_types from environment");
        settings.ignore_resource_types = value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(value) = var("FILTER_FALSE_POSITIVES") {
        debug!("Overriding filter_false_positives from environment");
        settings.filter_false_positives = parse_flag(&value, "filter_false_positives")?;
    }

    if let Some(value) = var("FAIL_ON_REPLACEMENT") {
        debug!("Overriding guardrails.fail_on_replacement from environment");
        settings.guardrails.fail_on_replacement = parse_flag(&value, "guardrails.fail_on_replacement")?;
    }

    if let Some(value) = var("FAIL_ON_REMOVAL") {
        debug!("Overriding guardrails.fail_on_removal from environment");
        settings.guardrails.fail_on_removal = parse_flag(&value, "guardrails.fail_on_removal")?;
    }

    if let Some(value) = var("MAX_REPLACEMENTS") {
        debug!("Overriding guardrails.max_replacements from environment");
        let max = value.trim().parse::<usize>().map_err(|_| {
            ConfigError::validation(
                format!("'{value}' is not a non-negative integer"),
                "guardrails.max_replacements",
            )
        })?;
        settings.guardrails.max_replacements = Some(max);
    }

    Ok(())
}

fn parse_flag(value: &str, field: &str) -> std::result::Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::validation(format!("'{value}' is not a boolean"), field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_empty_settings() {
        let settings = SettingsLoader::new().parse_yaml("", None).unwrap();
        assert_eq!(settings, DiffSettings::default());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = SettingsLoader::new()
            .parse_yaml("guardrails: [oops", None)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::StackDiffError::Config(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_find_settings_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stackdiff.yaml"), "keep_metadata: true\n").unwrap();
        let nested = dir.path().join("infra").join("stacks");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_settings_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("stackdiff.yaml"));

        let settings = SettingsLoader::new().load_file(&found).unwrap();
        assert_eq!(settings.keep_metadata, Some(true));
    }

    #[test]
    fn test_load_file_resolves_specs_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".stackdiff.yaml"), "replacement_specs: extra.json\n").unwrap();

        let settings = SettingsLoader::new()
            .with_base_path(dir.path())
            .load_file(".stackdiff.yaml")
            .unwrap();
        assert_eq!(settings.replacement_specs, Some(dir.path().join("extra.json")));
    }

    #[test]
    fn test_missing_file() {
        let err = SettingsLoader::new().load_file("/no/such/stackdiff.yaml").unwrap_err();
        assert!(matches!(
            err,
            crate::error::StackDiffError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = DiffSettings::default();
        apply_env_overrides(
            &mut settings,
            env(&[
                ("STACKDIFF_KEEP_METADATA", "yes"),
                ("STACKDIFF_IGNORE_RESOURCE_TYPES", "AWS::CDK::Metadata, Custom::Thing"),
                ("STACKDIFF_FAIL_ON_REPLACEMENT", "true"),
                ("STACKDIFF_MAX_REPLACEMENTS", "3"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.keep_metadata, Some(true));
        assert_eq!(settings.ignore_resource_types, vec!["AWS::CDK::Metadata", "Custom::Thing"]);
        assert!(settings.guardrails.fail_on_replacement);
        assert_eq!(settings.guardrails.max_replacements, Some(3));
        assert!(!settings.filter_false_positives);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut settings = DiffSettings::default();
        let err = apply_env_overrides(&mut settings, env(&[("STACKDIFF_FAIL_ON_REMOVAL", "maybe")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { field: Some(ref field), .. } if field == "guardrails.fail_on_removal"
        ));
    }
}
