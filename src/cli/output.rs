//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;
use tabled::{Table, Tabled};

use crate::diff::{Difference, DifferenceCollection, DiffSummary, ResourceDifference, ResourceImpact, TemplateDiff};
use crate::template::{ReplacementBehavior, ReplacementRegistry, TemplateHasher};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Identification of one input template in a report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    /// Path the template was loaded from.
    pub path: String,
    /// SHA-256 fingerprint of the canonical document.
    pub fingerprint: String,
}

impl TemplateInfo {
    /// Fingerprints a loaded template document.
    #[must_use]
    pub fn new(path: &Path, document: &Value) -> Self {
        Self {
            path: path.display().to_string(),
            fingerprint: TemplateHasher::new().fingerprint(document),
        }
    }
}

/// Everything a diff run reports.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport<'a> {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// The current template.
    pub old_template: TemplateInfo,
    /// The target template.
    pub new_template: TemplateInfo,
    /// Whether a change set sharpened the classification.
    pub change_set: bool,
    /// Summary and guardrail results.
    pub summary: &'a DiffSummary,
    /// The full diff.
    pub diff: &'a TemplateDiff,
}

/// Resource change row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "")]
    symbol: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Impact")]
    impact: String,
}

/// Replacement metadata row for table display.
#[derive(Tabled)]
struct SpecRow {
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Replacement")]
    behavior: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a diff report for display.
    #[must_use]
    pub fn format_diff(&self, report: &DiffReport<'_>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_diff_text(report),
        }
    }

    /// Formats a diff report as text.
    fn format_diff_text(report: &DiffReport<'_>) -> String {
        let hasher = TemplateHasher::new();
        let mut output = String::new();

        let _ = writeln!(
            output,
            "{} ({}) -> {} ({})",
            report.old_template.path,
            hasher.short_hash(&report.old_template.fingerprint).dimmed(),
            report.new_template.path,
            hasher.short_hash(&report.new_template.fingerprint).dimmed()
        );

        let diff = report.diff;
        if diff.is_empty() {
            let _ = writeln!(output, "\n{} There were no differences.", "✓".green());
            return output;
        }

        let attributes = [
            ("AWSTemplateFormatVersion", &diff.format_version),
            ("Description", &diff.description),
            ("Transform", &diff.transform),
        ];
        for (name, difference) in attributes {
            if let Some(difference) = difference {
                let _ = writeln!(output, "\n{}", name.bold());
                Self::write_value_change(&mut output, "   ", difference);
            }
        }

        let sections = [
            ("Metadata", &diff.metadata),
            ("Parameters", &diff.parameters),
            ("Mappings", &diff.mappings),
            ("Conditions", &diff.conditions),
        ];
        for (name, collection) in sections {
            Self::write_value_section(&mut output, name, collection);
        }

        if !diff.resources.is_empty() {
            let _ = writeln!(output, "\n{}", "Resources".bold());
            let rows: Vec<ResourceRow> = diff
                .resources
                .iter()
                .map(|(logical_id, resource)| ResourceRow {
                    symbol: Self::format_symbol(resource),
                    logical_id: logical_id.to_string(),
                    resource_type: Self::format_type(resource),
                    impact: Self::format_impact(resource),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');

            for (logical_id, resource) in diff.resources.iter() {
                Self::write_resource_details(&mut output, logical_id, resource);
            }
        }

        Self::write_value_section(&mut output, "Outputs", &diff.outputs);
        Self::write_value_section(&mut output, "Other Changes", &diff.unknown_top_level_keys);

        Self::write_summary(&mut output, report.summary);
        output
    }

    /// Writes the changes of a section without replacement semantics.
    fn write_value_section(output: &mut String, name: &str, collection: &DifferenceCollection<Difference<Value>>) {
        if collection.is_empty() {
            return;
        }

        let _ = writeln!(output, "\n{}", name.bold());
        for (id, difference) in collection.iter() {
            let symbol = if difference.is_addition() {
                "[+]".green()
            } else if difference.is_removal() {
                "[-]".red()
            } else {
                "[~]".yellow()
            };
            let _ = writeln!(output, "{symbol} {id}");
            if difference.is_update() {
                Self::write_value_change(output, "    ", difference);
            }
        }
    }

    /// Writes the property and attribute changes of an updated resource.
    fn write_resource_details(output: &mut String, logical_id: &str, resource: &ResourceDifference) {
        if resource.property_updates().is_empty() && resource.other_changes().is_empty() {
            return;
        }

        let _ = writeln!(output, "\n{} {logical_id}", Self::format_symbol(resource));
        for (property, difference) in resource.property_updates() {
            let impact = match difference.change_impact {
                ResourceImpact::WillReplace => " (requires replacement)".red().bold().to_string(),
                ResourceImpact::MayReplace => " (may cause replacement)".yellow().to_string(),
                _ => String::new(),
            };
            let _ = writeln!(output, " ├─ [~] .{property}{impact}");
            Self::write_value_change(output, " │   ", &difference.difference);
        }
        for (attribute, difference) in resource.other_changes() {
            let _ = writeln!(output, " ├─ [~] {attribute}");
            Self::write_value_change(output, " │   ", difference);
        }
    }

    /// Writes the two sides of a value change.
    fn write_value_change(output: &mut String, indent: &str, difference: &Difference<Value>) {
        if let Some(old) = &difference.old_value {
            let _ = writeln!(output, "{indent}{} {}", "-".red(), Self::truncate(&old.to_string(), 100));
        }
        if let Some(new) = &difference.new_value {
            let _ = writeln!(output, "{indent}{} {}", "+".green(), Self::truncate(&new.to_string(), 100));
        }
    }

    /// Writes the summary and guardrail results.
    fn write_summary(output: &mut String, summary: &DiffSummary) {
        let counts = &summary.resources;
        let _ = write!(
            output,
            "\nDiff: {} to add, {} to update, {} to replace ({} conditionally), {} to remove",
            counts.added.to_string().green(),
            counts.updated.to_string().yellow(),
            counts.will_replace.to_string().red(),
            counts.may_replace.to_string().yellow(),
            counts.removed.to_string().red()
        );
        if counts.retained > 0 {
            let _ = write!(output, ", {} retained", counts.retained);
        }
        output.push('\n');

        if !summary.passes_guardrails {
            let _ = write!(output, "\n{} Guardrail violations:\n", "⚠".yellow());
            for violation in &summary.guardrail_violations {
                let _ = writeln!(output, "   - {violation}");
            }
        }
    }

    /// Formats the replacement metadata table.
    #[must_use]
    pub fn format_specs(&self, registry: &ReplacementRegistry, resource_type: Option<&str>) -> String {
        let types: Vec<&str> = match resource_type {
            Some(t) => vec![t],
            None => registry.resource_types(),
        };

        let table: BTreeMap<&str, BTreeMap<&str, ReplacementBehavior>> = types
            .into_iter()
            .filter_map(|t| registry.properties(t).map(|properties| (t, properties)))
            .collect();

        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&table).unwrap_or_default(),
            OutputFormat::Text => {
                if table.is_empty() {
                    return format!(
                        "{} No replacement metadata for {}\n",
                        "⚠".yellow(),
                        resource_type.unwrap_or("any resource type")
                    );
                }

                let rows: Vec<SpecRow> = table
                    .iter()
                    .flat_map(|(t, properties)| {
                        properties.iter().map(move |(property, behavior)| SpecRow {
                            resource_type: (*t).to_string(),
                            property: (*property).to_string(),
                            behavior: Self::format_behavior(*behavior),
                        })
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats the change symbol of a resource.
    fn format_symbol(resource: &ResourceDifference) -> String {
        match resource.change_impact() {
            ResourceImpact::Added => "[+]".green().to_string(),
            ResourceImpact::Removed => "[-]".red().to_string(),
            ResourceImpact::WillReplace | ResourceImpact::MayReplace => "[~]".red().to_string(),
            ResourceImpact::WillUpdate => "[~]".yellow().to_string(),
            ResourceImpact::NoChange => "[ ]".dimmed().to_string(),
        }
    }

    /// Formats the resource type, showing both sides of a type change.
    fn format_type(resource: &ResourceDifference) -> String {
        let types = resource.resource_type();
        match (&types.old_type, &types.new_type) {
            (Some(old), Some(new)) if old != new => format!("{old} -> {new}"),
            _ => types.display_type().to_string(),
        }
    }

    /// Formats a resource impact with color.
    fn format_impact(resource: &ResourceDifference) -> String {
        let impact = resource.change_impact();
        let text = if resource.is_retained() {
            String::from("removed (retained)")
        } else {
            impact.to_string()
        };
        match impact {
            ResourceImpact::Added => text.green().to_string(),
            ResourceImpact::Removed if resource.is_retained() => text.yellow().to_string(),
            ResourceImpact::Removed | ResourceImpact::WillReplace => text.red().bold().to_string(),
            ResourceImpact::MayReplace | ResourceImpact::WillUpdate => text.yellow().to_string(),
            ResourceImpact::NoChange => text.dimmed().to_string(),
        }
    }

    /// Formats a replacement verdict with color.
    fn format_behavior(behavior: ReplacementBehavior) -> String {
        match behavior {
            ReplacementBehavior::Always => "always".red().to_string(),
            ReplacementBehavior::Conditionally => "conditionally".yellow().to_string(),
            ReplacementBehavior::Never => "never".green().to_string(),
            ReplacementBehavior::Unknown => "unknown".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
