//! Structural merges of schemas and data.

use serde_json::{Map, Value};
use tracing::warn;

use crate::types::CombinatorKind;

/// Keywords whose first value is kept when merging.
const FIRST_WINS: &[&str] = &["title", "description", "default", "$id", "examples"];

/// Lower bounds: the larger one is stricter.
const LOWER_BOUNDS: &[&str] = &[
    "minimum",
    "exclusiveMinimum",
    "minLength",
    "minItems",
    "minProperties",
];

/// Upper bounds: the smaller one is stricter.
const UPPER_BOUNDS: &[&str] = &[
    "maximum",
    "exclusiveMaximum",
    "maxLength",
    "maxItems",
    "maxProperties",
];

/// Deep-merge two values. Objects merge key by key with `other` winning;
/// arrays are concatenated when `concat_arrays` is set, otherwise replaced.
pub fn merge_objects(base: &Value, other: &Value, concat_arrays: bool) -> Value {
    match (base, other) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.clone();
            for (key, right) in b {
                let value = match merged.get(key) {
                    Some(left) => merge_objects(left, right, concat_arrays),
                    None => right.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (Value::Array(a), Value::Array(b)) if concat_arrays => {
            Value::Array(a.iter().chain(b.iter()).cloned().collect())
        }
        _ => other.clone(),
    }
}

/// Merge `other` into `base` as conjoined schemas (`allOf`, `then`/`else`,
/// dependencies). Neither input is modified.
pub fn merge_schemas(base: &Value, other: &Value) -> Value {
    let (Value::Object(a), Value::Object(b)) = (base, other) else {
        return if other.is_object() {
            other.clone()
        } else {
            base.clone()
        };
    };
    Value::Object(merge_schema_maps(a, b))
}

/// Merge a combinator's base schema with one of its options. The base
/// loses the `kind` keyword first.
pub fn branch_schema(base: &Value, kind: CombinatorKind, option: &Value) -> Value {
    let mut base = base.clone();
    if let Value::Object(map) = &mut base {
        map.remove(kind.keyword());
    }
    merge_schemas(&base, option)
}

fn merge_schema_maps(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = a.clone();
    for (key, right) in b {
        let Some(left) = a.get(key) else {
            merged.insert(key.clone(), right.clone());
            continue;
        };
        let value = match key.as_str() {
            "required" => union_arrays(left, right),
            "properties" | "definitions" | "$defs" => merge_property_maps(left, right),
            "items" | "additionalProperties" | "additionalItems"
                if left.is_object() && right.is_object() =>
            {
                merge_schemas(left, right)
            }
            "type" => intersect_types(left, right),
            "enum" => intersect_enums(left, right),
            "allOf" => union_arrays(left, right),
            k if FIRST_WINS.contains(&k) => left.clone(),
            k if LOWER_BOUNDS.contains(&k) => pick_bound(left, right, true),
            k if UPPER_BOUNDS.contains(&k) => pick_bound(left, right, false),
            _ => right.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

fn merge_property_maps(left: &Value, right: &Value) -> Value {
    let (Value::Object(l), Value::Object(r)) = (left, right) else {
        return right.clone();
    };
    let mut merged = l.clone();
    for (name, schema) in r {
        let value = match l.get(name) {
            Some(existing) => merge_schemas(existing, schema),
            None => schema.clone(),
        };
        merged.insert(name.clone(), value);
    }
    Value::Object(merged)
}

/// Ordered union without duplicates.
fn union_arrays(left: &Value, right: &Value) -> Value {
    let mut out: Vec<Value> = left.as_array().cloned().unwrap_or_default();
    for item in right.as_array().into_iter().flatten() {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    Value::Array(out)
}

fn type_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(t) => vec![t.clone()],
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Intersect two `type` declarations. `integer` narrows `number`. An empty
/// intersection keeps the last entry.
pub fn intersect_types(left: &Value, right: &Value) -> Value {
    let l = type_list(left);
    let r = type_list(right);
    let mut common: Vec<String> = Vec::new();
    for t in &l {
        let hit = if r.contains(t) {
            Some(t.clone())
        } else if t == "number" && r.iter().any(|x| x == "integer") {
            Some("integer".to_string())
        } else if t == "integer" && r.iter().any(|x| x == "number") {
            Some("integer".to_string())
        } else {
            None
        };
        if let Some(hit) = hit {
            if !common.contains(&hit) {
                common.push(hit);
            }
        }
    }
    match common.len() {
        0 => {
            warn!(
                "incompatible types {} and {} in merged schemas; using the last entry",
                left, right
            );
            right.clone()
        }
        1 => Value::String(common.remove(0)),
        _ => Value::Array(common.into_iter().map(Value::String).collect()),
    }
}

fn intersect_enums(left: &Value, right: &Value) -> Value {
    let (Some(l), Some(r)) = (left.as_array(), right.as_array()) else {
        return right.clone();
    };
    let common: Vec<Value> = l.iter().filter(|v| r.contains(v)).cloned().collect();
    if common.is_empty() {
        warn!("enum lists share no values in merged schemas; using the last entry");
        right.clone()
    } else {
        Value::Array(common)
    }
}

fn pick_bound(left: &Value, right: &Value, larger: bool) -> Value {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => {
            let keep_left = if larger { l >= r } else { l <= r };
            if keep_left {
                left.clone()
            } else {
                right.clone()
            }
        }
        _ => right.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_objects_deep() {
        let a = json!({"a": {"x": 1, "y": [1]}, "b": 1});
        let b = json!({"a": {"y": [2], "z": 3}});
        assert_eq!(
            merge_objects(&a, &b, false),
            json!({"a": {"x": 1, "y": [2], "z": 3}, "b": 1})
        );
        assert_eq!(
            merge_objects(&a, &b, true),
            json!({"a": {"x": 1, "y": [1, 2], "z": 3}, "b": 1})
        );
    }

    #[test]
    fn merge_schemas_unions_required_and_properties() {
        let a = json!({"type": "object", "required": ["a"], "properties": {"a": {"type": "string"}}});
        let b = json!({"required": ["b", "a"], "properties": {"b": {"type": "number"}}});
        let merged = merge_schemas(&a, &b);
        assert_eq!(merged["required"], json!(["a", "b"]));
        assert_eq!(merged["properties"]["a"], json!({"type": "string"}));
        assert_eq!(merged["properties"]["b"], json!({"type": "number"}));
    }

    #[test]
    fn type_intersection_collapses_to_single() {
        assert_eq!(
            intersect_types(&json!(["string", "number", "null"]), &json!("string")),
            json!("string")
        );
        assert_eq!(
            intersect_types(&json!(["string", "null"]), &json!(["null", "string"])),
            json!(["string", "null"])
        );
        assert_eq!(intersect_types(&json!("number"), &json!("integer")), json!("integer"));
    }

    #[test]
    fn incompatible_types_pick_last_entry() {
        let a = json!({"properties": {"x": {"type": "string"}}});
        let b = json!({"properties": {"x": {"type": "boolean"}}});
        assert_eq!(merge_schemas(&a, &b)["properties"]["x"]["type"], json!("boolean"));
    }

    #[test]
    fn bounds_tighten() {
        let a = json!({"minLength": 2, "maxLength": 10, "title": "A"});
        let b = json!({"minLength": 5, "maxLength": 20, "title": "B"});
        let merged = merge_schemas(&a, &b);
        assert_eq!(merged["minLength"], json!(5));
        assert_eq!(merged["maxLength"], json!(10));
        assert_eq!(merged["title"], json!("A"));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let a = json!({"properties": {"x": {"type": "string"}}});
        let b = json!({"properties": {"x": {"minLength": 1}}});
        let (a0, b0) = (a.clone(), b.clone());
        let _ = merge_schemas(&a, &b);
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }
}
