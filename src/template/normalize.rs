//! Normalization of intrinsic function spellings.
//!
//! The same reference can be written in more than one way. Both templates are
//! normalized before diffing so that equivalent spellings compare equal.

use serde_json::Value;

/// Intrinsic returning an attribute of another resource.
const GET_ATT: &str = "Fn::GetAtt";

/// Rewrites every `{"Fn::GetAtt": "Resource.Attribute"}` into the list form
/// `{"Fn::GetAtt": ["Resource", "Attribute"]}`.
///
/// Only the first dot separates the logical id, so nested attribute names such
/// as `Endpoint.Address` survive intact.
pub fn normalize_intrinsics(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(normalize_intrinsics),
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == GET_ATT {
                    let list_form = child.as_str().and_then(|target| {
                        target.split_once('.').map(|(logical_id, attribute)| {
                            Value::Array(vec![
                                Value::String(logical_id.to_string()),
                                Value::String(attribute.to_string()),
                            ])
                        })
                    });
                    if let Some(list_form) = list_form {
                        *child = list_form;
                    }
                }
                normalize_intrinsics(child);
            }
        }
        _ => {}
    }
}
