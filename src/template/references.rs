//! Reference expressions embedded in template values.
//!
//! A reference is either `{"Ref": "Id"}`, an intrinsic function whose first
//! argument is a logical id (`{"Fn::GetAtt": ["Id", "Arn"]}`), or a `${Id}`
//! placeholder inside an `Fn::Sub` string.

use serde_json::Value;

const REF: &str = "Ref";
const SUB: &str = "Fn::Sub";
const FUNCTION_PREFIX: &str = "Fn::";

/// Rewrites every reference to `logical_id` inside `value` so that it points at
/// `marker`. Returns the number of rewritten references.
pub fn rewrite_references(value: &mut Value, logical_id: &str, marker: &str) -> usize {
    match value {
        Value::Array(items) => items
            .iter_mut()
            .map(|item| rewrite_references(item, logical_id, marker))
            .sum(),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some((key, argument)) = map.iter_mut().next() {
                    if key == REF {
                        return rewrite_ref(argument, logical_id, marker);
                    }
                    if key == SUB {
                        return rewrite_sub(argument, logical_id, marker);
                    }
                    if key.starts_with(FUNCTION_PREFIX) {
                        return rewrite_function(argument, logical_id, marker);
                    }
                }
            }
            map.values_mut()
                .map(|child| rewrite_references(child, logical_id, marker))
                .sum()
        }
        _ => 0,
    }
}

fn rewrite_ref(argument: &mut Value, logical_id: &str, marker: &str) -> usize {
    if argument.as_str() == Some(logical_id) {
        *argument = Value::String(marker.to_string());
        1
    } else {
        0
    }
}

fn rewrite_function(argument: &mut Value, logical_id: &str, marker: &str) -> usize {
    let mut rewritten = 0;
    if let Value::Array(arguments) = argument {
        if let Some(first) = arguments.first_mut() {
            rewritten += rewrite_ref(first, logical_id, marker);
        }
    }
    // arguments may nest further references (Fn::Join, Fn::If, ...)
    rewritten + rewrite_references(argument, logical_id, marker)
}

fn rewrite_sub(argument: &mut Value, logical_id: &str, marker: &str) -> usize {
    let rewritten = match argument {
        Value::String(template) => rewrite_placeholders(template, logical_id, marker),
        Value::Array(arguments) => match arguments.first_mut() {
            Some(Value::String(template)) => rewrite_placeholders(template, logical_id, marker),
            _ => 0,
        },
        _ => 0,
    };
    rewritten + rewrite_references(argument, logical_id, marker)
}

/// Rewrites `${Id}` and `${Id.Attribute}` placeholders.
fn rewrite_placeholders(template: &mut String, logical_id: &str, marker: &str) -> usize {
    let exact = format!("${{{logical_id}}}");
    let attribute = format!("${{{logical_id}.");
    let count = template.matches(exact.as_str()).count() + template.matches(attribute.as_str()).count();
    if count > 0 {
        *template = template
            .replace(&exact, &format!("${{{marker}}}"))
            .replace(&attribute, &format!("${{{marker}."));
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MARKER: &str = "Bucket (replaced)";

    #[test]
    fn test_rewrites_ref() {
        let mut value = json!({ "Source": { "Ref": "Bucket" }, "Other": { "Ref": "Queue" } });
        assert_eq!(rewrite_references(&mut value, "Bucket", MARKER), 1);
        assert_eq!(value, json!({ "Source": { "Ref": MARKER }, "Other": { "Ref": "Queue" } }));
    }

    #[test]
    fn test_rewrites_function_first_argument() {
        let mut value = json!({ "Fn::GetAtt": ["Bucket", "Arn"] });
        assert_eq!(rewrite_references(&mut value, "Bucket", MARKER), 1);
        assert_eq!(value, json!({ "Fn::GetAtt": [MARKER, "Arn"] }));
    }

    #[test]
    fn test_rewrites_nested_references_inside_functions() {
        let mut value = json!({ "Fn::Join": ["", ["arn:", { "Ref": "Bucket" }]] });
        assert_eq!(rewrite_references(&mut value, "Bucket", MARKER), 1);
        assert_eq!(value, json!({ "Fn::Join": ["", ["arn:", { "Ref": MARKER }]] }));
    }

    #[test]
    fn test_rewrites_sub_placeholders() {
        let mut value = json!({ "Fn::Sub": "${Bucket}/${Bucket.Arn}/${BucketPolicy}" });
        assert_eq!(rewrite_references(&mut value, "Bucket", MARKER), 2);
        assert_eq!(
            value,
            json!({ "Fn::Sub": "${Bucket (replaced)}/${Bucket (replaced).Arn}/${BucketPolicy}" })
        );
    }

    #[test]
    fn test_rewriting_is_idempotent() {
        let mut value = json!([{ "Ref": "Bucket" }, { "Fn::GetAtt": ["Bucket", "Arn"] }]);
        assert_eq!(rewrite_references(&mut value, "Bucket", MARKER), 2);
        assert_eq!(rewrite_references(&mut value, "Bucket", MARKER), 0);
    }

    #[test]
    fn test_multi_key_objects_are_not_references() {
        let mut value = json!({ "Ref": "Bucket", "Extra": true });
        assert_eq!(rewrite_references(&mut value, "Bucket", MARKER), 0);
    }
}
