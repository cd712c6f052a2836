//! Differs for the sections without replacement semantics.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;

use super::difference::{Difference, DifferenceCollection};
use super::keyed::diff_keyed_entities;
use super::value::optional_equal;

/// Diffs a single-value section such as `Description`.
///
/// Returns `None` when both sides are equal or both absent.
#[must_use]
pub fn diff_attribute(old: Option<&Value>, new: Option<&Value>) -> Option<Difference<Value>> {
    if optional_equal(old, new) {
        return None;
    }
    Some(Difference::new(old.cloned(), new.cloned()))
}

/// Diffs a keyed section whose entities are opaque values.
///
/// # Errors
///
/// Never fails today; the signature matches the other section differs so the
/// engine can treat them uniformly.
pub fn diff_value_section(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> Result<DifferenceCollection<Difference<Value>>> {
    let diffs = diff_keyed_entities(old, new, |_, a, b| Ok(Difference::new(a.cloned(), b.cloned())))?;
    Ok(DifferenceCollection::new(diffs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_attribute() {
        assert!(diff_attribute(Some(&json!("a")), Some(&json!("a"))).is_none());
        assert!(diff_attribute(None, None).is_none());

        let added = diff_attribute(None, Some(&json!("AWS::Serverless-2016-10-31"))).unwrap();
        assert!(added.is_addition());

        let null_vs_absent = diff_attribute(Some(&Value::Null), None).unwrap();
        assert!(null_vs_absent.is_removal());
    }

    #[test]
    fn test_diff_value_section() {
        let mut old = BTreeMap::new();
        old.insert(String::from("Env"), json!({ "Type": "String", "Default": "dev" }));
        old.insert(String::from("Port"), json!({ "Type": "Number", "Default": 80 }));
        let mut new = BTreeMap::new();
        new.insert(String::from("Env"), json!({ "Type": "String", "Default": "prod" }));
        new.insert(String::from("Port"), json!({ "Default": "80", "Type": "Number" }));

        let diffs = diff_value_section(&old, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        assert!(diffs.find("Env").unwrap().is_update());
        assert!(diffs.find("Port").is_none());
    }
}
