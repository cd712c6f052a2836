//! Configuration module for stackdiff.
//!
//! This module handles all settings-related functionality:
//! - Parsing and validating `stackdiff.yaml`
//! - Discovering the settings file and applying environment overrides

mod loader;
mod settings;

pub use loader::{
    DEFAULT_SETTINGS_FILES, ENV_PREFIX, SettingsLoader, apply_env_overrides, find_settings_file,
    user_settings_file,
};
pub use settings::{DiffSettings, GuardrailSettings};
