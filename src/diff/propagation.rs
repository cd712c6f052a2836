//! Fixed-point propagation of replacements through reference expressions.
//!
//! When a resource is replaced its physical id changes, so every property that
//! references it receives a new value at deploy time even though the template
//! text is unchanged. The propagation pass simulates this on a working copy of
//! the new template: references to replaced resources are rewritten to a
//! marker id, and the diff is recomputed until no further reference changes.

use tracing::debug;

use crate::error::{PropagationError, Result};
use crate::template::Template;

use super::difference::{ResourceDifference, ResourceImpact, TemplateDiff};
use super::engine::TemplateDiffer;

/// Returns the marker id that stands in for a replaced resource.
#[must_use]
pub fn replacement_marker(logical_id: &str) -> String {
    format!("{logical_id} (replaced)")
}

/// Runs the fixed-point loop and returns the converged diff.
///
/// The loop is bounded by the resource count of `new` plus one; every
/// iteration that changes the working copy retires at least one replaced
/// resource.
///
/// # Errors
///
/// Returns [`PropagationError::AmbiguousReplacementMarker`] if a marker
/// collides with a declared logical id and
/// [`PropagationError::IterationLimitExceeded`] if the loop does not converge.
pub fn propagate(differ: &TemplateDiffer<'_>, old: &Template, new: &Template) -> Result<TemplateDiff> {
    propagate_with_limit(differ, old, new, new.resource_count() + 1)
}

/// Runs the fixed-point loop for at most `limit` iterations.
pub(crate) fn propagate_with_limit(
    differ: &TemplateDiffer<'_>,
    old: &Template,
    new: &Template,
    limit: usize,
) -> Result<TemplateDiff> {
    let mut working = new.clone();

    for iteration in 1..=limit {
        let diff = differ.calculate(old, &working)?;
        let mut changed = false;

        for (logical_id, difference) in diff.resources.iter() {
            if difference.change_impact() != ResourceImpact::WillReplace {
                continue;
            }

            let marker = replacement_marker(logical_id);
            if old.declares_logical_id(&marker) || working.declares_logical_id(&marker) {
                return Err(PropagationError::AmbiguousReplacementMarker {
                    logical_id: logical_id.to_string(),
                    marker,
                }
                .into());
            }

            let rewritten = working.rewrite_references(logical_id, &marker);
            if rewritten > 0 {
                debug!("Rewrote {rewritten} references to replaced resource {logical_id}");
                changed = true;
            }
        }

        if !changed {
            debug!("Replacement propagation converged after {iteration} iterations");
            return Ok(diff);
        }
    }

    Err(PropagationError::IterationLimitExceeded { limit }.into())
}

/// Copies replacement information discovered by propagation into `base`.
///
/// Only resources whose propagated impact is a replacement and differs from
/// their impact in `base` are touched; for those, every replacement-level
/// property difference overwrites the one in `base`. Resources `base` omitted
/// as unchanged are inserted with their original old and new bodies.
pub fn backfill(base: &mut TemplateDiff, propagated: &TemplateDiff, old: &Template, new: &Template) {
    for (logical_id, downstream) in propagated.resources.iter() {
        if !downstream.change_impact().is_replacement() {
            continue;
        }

        let current = base
            .resources
            .find(logical_id)
            .map_or(ResourceImpact::NoChange, ResourceDifference::change_impact);
        if current == downstream.change_impact() {
            continue;
        }

        debug!(
            "Propagated replacement for {logical_id}: {current} -> {}",
            downstream.change_impact()
        );

        let target = base.resources.entry_or_insert_with(logical_id, || {
            ResourceDifference::new(
                old.resources.get(logical_id).cloned(),
                new.resources.get(logical_id).cloned(),
                std::collections::BTreeMap::new(),
                std::collections::BTreeMap::new(),
            )
        });

        for (property, difference) in downstream.property_updates() {
            if difference.change_impact.is_replacement() {
                target.set_property_change(property.clone(), difference.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ResourceDiffer;
    use crate::template::{ReplacementBehavior, ReplacementRegistry};
    use serde_json::json;

    fn registry() -> ReplacementRegistry {
        let mut registry = ReplacementRegistry::new();
        registry.register("X::Bucket", "Name", ReplacementBehavior::Always);
        registry.register("X::Consumer", "Source", ReplacementBehavior::Always);
        registry.register("X::Watcher", "Target", ReplacementBehavior::Conditionally);
        registry
    }

    fn template(document: serde_json::Value) -> Template {
        Template::from_value(&document).unwrap()
    }

    fn chain(name: &str) -> Template {
        template(json!({
            "Resources": {
                "Bucket1": { "Type": "X::Bucket", "Properties": { "Name": name } },
                "Consumer": { "Type": "X::Consumer", "Properties": { "Source": { "Ref": "Bucket1" } } },
                "Watcher": {
                    "Type": "X::Watcher",
                    "Properties": { "Target": { "Fn::GetAtt": ["Consumer", "Arn"] } }
                }
            }
        }))
    }

    #[test]
    fn test_marker_format() {
        assert_eq!(replacement_marker("Bucket"), "Bucket (replaced)");
    }

    #[test]
    fn test_propagates_transitively() {
        let registry = registry();
        let differ = TemplateDiffer::new(ResourceDiffer::new(&registry, None));
        let old = chain("foo");
        let new = chain("bar");

        let propagated = propagate(&differ, &old, &new).unwrap();
        let impact = |id: &str| propagated.resources.get(id).change_impact();

        assert_eq!(impact("Bucket1"), ResourceImpact::WillReplace);
        assert_eq!(impact("Consumer"), ResourceImpact::WillReplace);
        assert_eq!(impact("Watcher"), ResourceImpact::MayReplace);
    }

    #[test]
    fn test_iteration_limit_fails_loudly() {
        let registry = registry();
        let differ = TemplateDiffer::new(ResourceDiffer::new(&registry, None));
        let old = chain("foo");
        let new = chain("bar");

        // Bucket1 then Consumer each need a rewrite pass before convergence
        let err = propagate_with_limit(&differ, &old, &new, 1).unwrap_err();
        assert!(matches!(
            err,
            crate::error::StackDiffError::Propagation(PropagationError::IterationLimitExceeded { limit: 1 })
        ));

        assert!(propagate_with_limit(&differ, &old, &new, 2).is_err());
        assert!(propagate_with_limit(&differ, &old, &new, 3).is_ok());
    }

    #[test]
    fn test_backfill_inserts_unchanged_resources() {
        let registry = registry();
        let differ = TemplateDiffer::new(ResourceDiffer::new(&registry, None));
        let old = chain("foo");
        let new = chain("bar");

        let mut base = differ.calculate(&old, &new).unwrap();
        assert!(base.resources.find("Consumer").is_none());

        let propagated = propagate(&differ, &old, &new).unwrap();
        backfill(&mut base, &propagated, &old, &new);

        let consumer = base.resources.find("Consumer").unwrap();
        assert_eq!(consumer.change_impact(), ResourceImpact::WillReplace);
        assert_eq!(
            consumer.property_update("Source").unwrap().difference.new_value,
            Some(json!({ "Ref": "Bucket1 (replaced)" }))
        );
        assert_eq!(
            consumer.new_value().unwrap().properties["Source"],
            json!({ "Ref": "Bucket1" })
        );
    }

    #[test]
    fn test_converges_without_replacements() {
        let registry = registry();
        let differ = TemplateDiffer::new(ResourceDiffer::new(&registry, None));
        let old = chain("foo");

        let propagated = propagate(&differ, &old, &old).unwrap();
        assert!(propagated.is_empty());
    }

    #[test]
    fn test_marker_collision_is_rejected() {
        let registry = registry();
        let differ = TemplateDiffer::new(ResourceDiffer::new(&registry, None));
        let old = chain("foo");
        let mut new = chain("bar");
        new.parameters
            .insert(String::from("Bucket1 (replaced)"), json!({ "Type": "String" }));

        let err = propagate(&differ, &old, &new).unwrap_err();
        assert!(matches!(
            err,
            crate::error::StackDiffError::Propagation(PropagationError::AmbiguousReplacementMarker { .. })
        ));
    }

    #[test]
    fn test_sub_references_are_propagated() {
        let registry = registry();
        let differ = TemplateDiffer::new(ResourceDiffer::new(&registry, None));
        let build = |name: &str| {
            template(json!({
                "Resources": {
                    "Bucket1": { "Type": "X::Bucket", "Properties": { "Name": name } },
                    "Consumer": {
                        "Type": "X::Consumer",
                        "Properties": { "Source": { "Fn::Sub": "arn:${Bucket1.Arn}/*" } }
                    }
                }
            }))
        };

        let propagated = propagate(&differ, &build("a"), &build("b")).unwrap();
        assert_eq!(
            propagated.resources.get("Consumer").change_impact(),
            ResourceImpact::WillReplace
        );
    }
}
