//! stackdiff CLI entrypoint.
//!
//! This is the main entrypoint for the stackdiff command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use stackdiff::changeset::ChangeSetLoader;
use stackdiff::cli::{Cli, Commands, DiffReport, OutputFormatter, TemplateInfo};
use stackdiff::config::{DiffSettings, SettingsLoader, apply_env_overrides};
use stackdiff::diff::{DiffEngine, DiffSummary};
use stackdiff::error::Result;
use stackdiff::reconciler::ChangeSetReconciler;
use stackdiff::template::{ReplacementRegistry, TemplateParser};

use chrono::Utc;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code used when the diff violates a guardrail.
const GUARDRAIL_EXIT_CODE: u8 = 2;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatches the parsed command.
fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Diff {
            old,
            new,
            change_set,
            specs,
            fail_on_replace,
            filter_false_positives,
            keep_metadata,
        } => {
            let mut settings = load_settings(cli.config.as_ref())?;

            // CLI flags override settings
            if specs.is_some() {
                settings.replacement_specs = specs;
            }
            if fail_on_replace {
                settings.guardrails.fail_on_replacement = true;
            }
            if filter_false_positives {
                settings.filter_false_positives = true;
            }
            if keep_metadata {
                settings.keep_metadata = Some(true);
            }

            cmd_diff(&old, &new, change_set.as_deref(), &settings, &formatter)
        }
        Commands::Specs { resource_type, specs } => {
            let registry = load_registry(specs.as_deref())?;
            let output = formatter.format_specs(&registry, resource_type.as_deref());
            write_stdout(&output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Diff two templates.
fn cmd_diff(
    old_path: &Path,
    new_path: &Path,
    change_set_path: Option<&Path>,
    settings: &DiffSettings,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let parser = TemplateParser::new();
    let old = parser.load_file(old_path)?;
    let new = parser.load_file(new_path)?;

    let change_set = change_set_path
        .map(|path| ChangeSetLoader::new().load_file(path))
        .transpose()?;
    if settings.filter_false_positives && change_set.is_none() {
        warn!("filter_false_positives has no effect without a change set");
    }

    let registry = load_registry(settings.replacement_specs.as_deref())?;
    let engine = DiffEngine::with_source(registry).with_options(settings.diff_options());
    debug!("Using {engine:?}");

    let diff = ChangeSetReconciler::new(&engine)
        .with_false_positive_filter(settings.filter_false_positives)
        .reconcile(&old, &new, change_set.as_ref())?;

    let summary = DiffSummary::from_diff(&diff, &settings.guardrails);
    let report = DiffReport {
        generated_at: Utc::now(),
        old_template: TemplateInfo::new(old_path, &old),
        new_template: TemplateInfo::new(new_path, &new),
        change_set: change_set.is_some(),
        summary: &summary,
        diff: &diff,
    };

    write_stdout(&formatter.format_diff(&report))?;

    if summary.passes_guardrails {
        Ok(ExitCode::SUCCESS)
    } else {
        info!(
            "Diff violates {} guardrails",
            summary.guardrail_violations.len()
        );
        Ok(ExitCode::from(GUARDRAIL_EXIT_CODE))
    }
}

/// Loads settings from an explicit file or by discovery.
fn load_settings(config_path: Option<&PathBuf>) -> Result<DiffSettings> {
    match config_path {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            SettingsLoader::new().with_base_path(dir).load_dotenv()?;

            // Base path only scopes .env; the file path is used as given
            let mut settings = SettingsLoader::new().load_file(path)?;
            apply_env_overrides(&mut settings, |name| std::env::var(name).ok())?;
            settings.validate()?;
            Ok(settings)
        }
        None => {
            let current_dir = std::env::current_dir()?;
            SettingsLoader::new().discover(current_dir)
        }
    }
}

/// Builds the replacement registry, merging an optional metadata file.
fn load_registry(specs: Option<&Path>) -> Result<ReplacementRegistry> {
    let mut registry = ReplacementRegistry::builtin();
    if let Some(path) = specs {
        registry.merge(ReplacementRegistry::load_file(path)?);
    }
    Ok(registry)
}

/// Writes command output to stdout.
fn write_stdout(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    stdout.flush()?;
    Ok(())
}
