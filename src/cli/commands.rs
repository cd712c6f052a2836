//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// stackdiff - Infrastructure template diff with replacement analysis.
#[derive(Parser, Debug)]
#[command(name = "stackdiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the settings file.
    #[arg(short, long, global = true, env = "STACKDIFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Diff two templates and report replacements.
    Diff {
        /// Current (deployed) template, JSON or YAML.
        old: PathBuf,

        /// Target template, JSON or YAML.
        new: PathBuf,

        /// Change set used as the authoritative replacement oracle.
        #[arg(long)]
        change_set: Option<PathBuf>,

        /// Additional replacement metadata merged over the builtin table.
        #[arg(long)]
        specs: Option<PathBuf>,

        /// Fail if any resource will be replaced.
        #[arg(long)]
        fail_on_replace: bool,

        /// Drop property changes the change set does not confirm.
        #[arg(long, requires = "change_set")]
        filter_false_positives: bool,

        /// Diff resource metadata even without a change set.
        #[arg(long)]
        keep_metadata: bool,
    },

    /// Show the replacement metadata table.
    Specs {
        /// Resource type to show (all types if not specified).
        resource_type: Option<String>,

        /// Additional replacement metadata merged over the builtin table.
        #[arg(long)]
        specs: Option<PathBuf>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diff_command() {
        let cli = Cli::try_parse_from([
            "stackdiff",
            "diff",
            "old.json",
            "new.yaml",
            "--change-set",
            "cs.json",
            "--fail-on-replace",
            "--output",
            "json",
        ])
        .unwrap();

        assert!(matches!(cli.output, OutputFormat::Json));
        match cli.command {
            Commands::Diff {
                old,
                change_set,
                fail_on_replace,
                ..
            } => {
                assert_eq!(old, PathBuf::from("old.json"));
                assert_eq!(change_set, Some(PathBuf::from("cs.json")));
                assert!(fail_on_replace);
            }
            Commands::Specs { .. } => panic!("expected diff command"),
        }
    }

    #[test]
    fn test_filter_requires_change_set() {
        let result = Cli::try_parse_from(["stackdiff", "diff", "a.json", "b.json", "--filter-false-positives"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_specs_command() {
        let cli = Cli::try_parse_from(["stackdiff", "specs", "AWS::S3::Bucket"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Specs { resource_type: Some(ref t), .. } if t == "AWS::S3::Bucket"
        ));
    }
}
