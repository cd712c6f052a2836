//! Generic differ for string-keyed entity maps.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;

use super::value::StructuralEq;

/// Diffs two keyed maps of entities of the same kind.
///
/// Keys are visited in lexicographic order over the union of both maps.
/// Entities that are structurally equal on both sides are omitted; for every
/// other key, `diff_fn` is called with the logical id and the entity on each
/// side.
///
/// # Errors
///
/// Propagates the first error returned by `diff_fn`.
pub fn diff_keyed_entities<T, D, F>(
    old: &BTreeMap<String, T>,
    new: &BTreeMap<String, T>,
    mut diff_fn: F,
) -> Result<BTreeMap<String, D>>
where
    T: StructuralEq,
    F: FnMut(&str, Option<&T>, Option<&T>) -> Result<D>,
{
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let mut diffs = BTreeMap::new();

    for key in keys {
        let old_entity = old.get(key);
        let new_entity = new.get(key);

        if let (Some(a), Some(b)) = (old_entity, new_entity) {
            if a.structurally_eq(b) {
                continue;
            }
        }

        diffs.insert(key.clone(), diff_fn(key, old_entity, new_entity)?);
    }

    Ok(diffs)
}
