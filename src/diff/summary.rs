//! Diff summaries and guardrail checks.
//!
//! A summary condenses a [`TemplateDiff`] into per-impact counts and checks it
//! against the configured guardrails, so automated callers can fail a
//! pipeline on unwanted replacements or removals.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::GuardrailSettings;

use super::difference::{ResourceImpact, TemplateDiff};

/// Per-impact resource counts for a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactCounts {
    /// Resources added.
    pub added: usize,
    /// Resources removed.
    pub removed: usize,
    /// Removed resources kept by their deletion policy.
    pub retained: usize,
    /// Resources updated in place.
    pub updated: usize,
    /// Resources that may be replaced.
    pub may_replace: usize,
    /// Resources that will be replaced.
    pub will_replace: usize,
}

impl ImpactCounts {
    /// Returns the number of resources that may or will be replaced.
    #[must_use]
    pub const fn replacements(&self) -> usize {
        self.may_replace + self.will_replace
    }
}

/// Summary of a template diff.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    /// When the summary was created.
    pub created_at: DateTime<Utc>,
    /// Total number of differences across all sections.
    pub differences: usize,
    /// Resource counts per impact.
    pub resources: ImpactCounts,
    /// Logical ids of resources that may or will be replaced.
    pub replaced: Vec<String>,
    /// Whether the diff passes guardrails.
    pub passes_guardrails: bool,
    /// Guardrail violations (if any).
    pub guardrail_violations: Vec<String>,
}

impl DiffSummary {
    /// Summarizes a diff and checks it against the guardrails.
    #[must_use]
    pub fn from_diff(diff: &TemplateDiff, guardrails: &GuardrailSettings) -> Self {
        let mut counts = ImpactCounts::default();
        let mut replaced = Vec::new();
        let mut will_replace = Vec::new();

        for (logical_id, resource) in diff.resources.iter() {
            match resource.change_impact() {
                ResourceImpact::Added => counts.added += 1,
                ResourceImpact::Removed if resource.is_retained() => counts.retained += 1,
                ResourceImpact::Removed => counts.removed += 1,
                ResourceImpact::WillUpdate => counts.updated += 1,
                ResourceImpact::MayReplace => counts.may_replace += 1,
                ResourceImpact::WillReplace => counts.will_replace += 1,
                ResourceImpact::NoChange => {}
            }
            if resource.change_impact().is_replacement() {
                replaced.push(logical_id.to_string());
            }
            if resource.change_impact() == ResourceImpact::WillReplace {
                will_replace.push(logical_id);
            }
        }

        let guardrail_violations = Self::check_guardrails(guardrails, &counts, &will_replace);

        Self {
            created_at: Utc::now(),
            differences: diff.differences_count(),
            resources: counts,
            replaced,
            passes_guardrails: guardrail_violations.is_empty(),
            guardrail_violations,
        }
    }

    /// Checks the counts against the guardrails.
    fn check_guardrails(
        guardrails: &GuardrailSettings,
        counts: &ImpactCounts,
        will_replace: &[&str],
    ) -> Vec<String> {
        let mut violations = Vec::new();

        // Only certain replacements trip this gate; MAY_REPLACE counts toward max_replacements
        if guardrails.fail_on_replacement && !will_replace.is_empty() {
            violations.push(format!(
                "{} resources will be replaced: {}",
                will_replace.len(),
                will_replace.join(", ")
            ));
        }

        if guardrails.fail_on_removal && counts.removed > 0 {
            violations.push(format!("{} resources will be removed", counts.removed));
        }

        if let Some(max) = guardrails.max_replacements {
            if counts.replacements() > max {
                violations.push(format!(
                    "Diff replaces {} resources but max_replacements is {max}",
                    counts.replacements()
                ));
            }
        }

        violations
    }

    /// Returns true if the diff has no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.differences == 0
    }
}
