//! CLI module for the stackdiff tool.
//!
//! This module provides the command-line interface for diffing
//! infrastructure templates.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::{DiffReport, OutputFormatter, TemplateInfo};
