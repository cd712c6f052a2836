//! Structural equality over template values.
//!
//! Absence is modeled as `Option::None` (a missing key); JSON `null` is a real
//! value and is not equal to absence. Mapping key order never matters and
//! sequence order always does. Numbers compare by value. A string equals a
//! number or boolean when it is that scalar's exact spelling (`"80"`, `"true"`);
//! surrounding whitespace makes it a different value.

use serde_json::{Number, Value};
use std::collections::BTreeMap;

use crate::template::Resource;

/// Types that can be compared structurally.
pub trait StructuralEq {
    /// Returns true if both values are structurally equal.
    fn structurally_eq(&self, other: &Self) -> bool;
}

impl StructuralEq for Value {
    fn structurally_eq(&self, other: &Self) -> bool {
        deep_equal(self, other)
    }
}

impl StructuralEq for Resource {
    fn structurally_eq(&self, other: &Self) -> bool {
        self.resource_type == other.resource_type
            && maps_equal(&self.properties, &other.properties)
            && maps_equal(&self.rest, &other.rest)
    }
}

/// Deep structural equality of two values.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            numeric_string_equal(s, n)
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s == if *b { "true" } else { "false" }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, value)| y.get(key).is_some_and(|other| deep_equal(value, other)))
        }
        _ => false,
    }
}

/// Equality of two possibly-absent values.
#[must_use]
pub fn optional_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => deep_equal(x, y),
        _ => false,
    }
}

/// Equality of two string-keyed value maps.
#[must_use]
pub fn maps_equal(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| deep_equal(value, other)))
}

#[allow(clippy::float_cmp)]
fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[allow(clippy::float_cmp)]
fn numeric_string_equal(s: &str, n: &Number) -> bool {
    if s.trim() != s {
        return false;
    }
    let Ok(parsed) = s.parse::<f64>() else {
        return false;
    };
    n.as_f64().is_some_and(|value| value == parsed)
}
