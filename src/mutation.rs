//! Immutable updates of form data and leaf input handling.
//!
//! Updates copy the spine from the root to the touched node and leave the
//! caller's value alone. `None` stands for undefined: at an object key it
//! removes the key, in an array slot it is stored as `null`.

use serde_json::{Map, Number, Value};

use crate::identity::ArrayOp;
use crate::types::{value_at, PathSegment};

/// Set the value at `path`, creating containers on the way.
pub fn apply_change(
    form_data: Option<&Value>,
    path: &[PathSegment],
    new_value: Option<Value>,
) -> Option<Value> {
    let Some((segment, rest)) = path.split_first() else {
        return new_value;
    };

    match (segment, form_data) {
        (PathSegment::Index(i), Some(Value::Array(items))) => {
            Some(Value::Array(set_index(items.clone(), *i, rest, new_value)))
        }
        (PathSegment::Key(k), Some(Value::Array(items))) if k.parse::<usize>().is_ok() => {
            let i = k.parse::<usize>().unwrap_or_default();
            Some(Value::Array(set_index(items.clone(), i, rest, new_value)))
        }
        (segment, Some(Value::Object(map))) => {
            Some(Value::Object(set_key(map.clone(), segment.as_key(), rest, new_value)))
        }
        (PathSegment::Index(i), _) => Some(Value::Array(set_index(Vec::new(), *i, rest, new_value))),
        (segment, _) => Some(Value::Object(set_key(
            Map::new(),
            segment.as_key(),
            rest,
            new_value,
        ))),
    }
}

fn set_index(
    mut items: Vec<Value>,
    index: usize,
    rest: &[PathSegment],
    new_value: Option<Value>,
) -> Vec<Value> {
    if items.len() <= index {
        items.resize(index + 1, Value::Null);
    }
    let updated = apply_change(items.get(index), rest, new_value);
    items[index] = updated.unwrap_or(Value::Null);
    items
}

fn set_key(
    mut map: Map<String, Value>,
    key: String,
    rest: &[PathSegment],
    new_value: Option<Value>,
) -> Map<String, Value> {
    match apply_change(map.get(&key), rest, new_value) {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
    map
}

/// Apply an array edit to the array at `path`. A missing array is empty.
pub fn apply_array_op(form_data: Option<&Value>, path: &[PathSegment], op: &ArrayOp) -> Option<Value> {
    let items = match value_at(form_data, path) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };
    let next = op.apply(items);
    apply_change(form_data, path, Some(Value::Array(next)))
}

/// Rename an object key in place, keeping its position. A `new_key` that
/// is already taken gets a `-1`, `-2`, … suffix.
pub fn rename_key(object: &Map<String, Value>, old_key: &str, new_key: &str) -> (Map<String, Value>, String) {
    if old_key == new_key || !object.contains_key(old_key) {
        return (object.clone(), old_key.to_string());
    }
    let available = available_key(new_key, object);
    let renamed = object
        .iter()
        .map(|(key, value)| {
            let key = if key == old_key { available.clone() } else { key.clone() };
            (key, value.clone())
        })
        .collect();
    (renamed, available)
}

/// `preferred`, or the first `preferred-N` not present in `object`.
pub fn available_key(preferred: &str, object: &Map<String, Value>) -> String {
    let mut candidate = preferred.to_string();
    let mut n = 0;
    while object.contains_key(&candidate) {
        n += 1;
        candidate = format!("{}-{}", preferred, n);
    }
    candidate
}

/// Committed value for text typed into an input. Clearing the input yields
/// `ui:emptyValue` when configured, else undefined.
pub fn input_value(text: &str, ui_schema: &Value) -> Option<Value> {
    if text.is_empty() {
        ui_schema.get("ui:emptyValue").cloned()
    } else {
        Some(Value::String(text.to_string()))
    }
}

/// Text typed into a number input and the value it commits.
///
/// Partial literals keep their text for display while committing the
/// number: `"2."` commits `2` and `".5"` commits `0.5`. Text that is not a
/// number is committed as a string so validation can flag it.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberInput {
    pub text: String,
    pub value: Option<Value>,
}

impl NumberInput {
    pub fn parse(text: &str, ui_schema: &Value) -> Self {
        if text.is_empty() {
            return Self {
                text: String::new(),
                value: input_value(text, ui_schema),
            };
        }
        let normalized = if text.starts_with('.') {
            format!("0{}", text)
        } else {
            text.to_string()
        };
        let value = if has_trailing_decimal(&normalized) {
            as_number(&strip_trailing(&normalized))
        } else {
            as_number(&normalized)
        };
        Self {
            text: text.to_string(),
            value: Some(value),
        }
    }

    /// What the input shows for `committed`: the typed text while it still
    /// spells that number, the number itself otherwise.
    pub fn display(text: Option<&str>, committed: Option<&Value>) -> Option<String> {
        let committed = committed?;
        if let (Some(text), Some(number)) = (text, committed.as_f64()) {
            if spells_number(text, number) {
                return Some(text.to_string());
            }
        }
        Some(match committed {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// A `.` followed by nothing, or by digits ending in `0`.
fn has_trailing_decimal(text: &str) -> bool {
    match text.rfind('.') {
        Some(dot) => {
            let rest = &text[dot + 1..];
            rest.is_empty() || (rest.bytes().all(|b| b.is_ascii_digit()) && rest.ends_with('0'))
        }
        None => false,
    }
}

/// Drop trailing zeros, and the decimal point if nothing is left after it.
fn strip_trailing(text: &str) -> String {
    let trimmed = text.trim_end_matches('0');
    match trimmed.strip_suffix('.') {
        Some(integer) => integer.to_string(),
        None => trimmed.to_string(),
    }
}

fn as_number(text: &str) -> Value {
    let unfinished = text.ends_with('.')
        || text
            .rfind('.')
            .map(|dot| {
                let rest = &text[dot + 1..];
                rest.ends_with('0') && rest.bytes().all(|b| b.is_ascii_digit())
            })
            .unwrap_or(false);
    if unfinished {
        return Value::String(text.to_string());
    }
    let trimmed = text.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::Number(integer.into());
    }
    match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(number) if trimmed.bytes().any(|b| b.is_ascii_digit()) => Value::Number(number),
        _ => Value::String(text.to_string()),
    }
}

/// Whether `text` is `number` followed only by an optional `.` and zeros.
fn spells_number(text: &str, number: f64) -> bool {
    (0..=text.len()).filter(|i| text.is_char_boundary(*i)).any(|split| {
        let (head, tail) = text.split_at(split);
        let tail = tail.strip_prefix('.').unwrap_or(tail);
        let tail_ok = tail.bytes().all(|b| b == b'0');
        let head = if head.starts_with('.') {
            format!("0{}", head)
        } else {
            head.to_string()
        };
        tail_ok && (head.is_empty() || head.parse::<f64>().map(|h| h == number).unwrap_or(false))
    })
}
