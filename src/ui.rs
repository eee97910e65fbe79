//! uiSchema lookups: options, child overlays, labels and property order.

use serde_json::{Map, Value};
use tracing::warn;

use crate::types::{CombinatorKind, UI_PREFIX};

/// Flatten the `ui:*` hints of one node into an options map.
///
/// `ui:globalOptions` (taken from the root) come first, then the node's
/// `ui:options`, then every other `ui:*` key with the prefix stripped. Later
/// entries win, so `ui:title` beats `ui:options.title`.
pub fn ui_options(ui_schema: &Value, global: &Map<String, Value>) -> Map<String, Value> {
    let mut options = global.clone();
    let Value::Object(ui) = ui_schema else {
        return options;
    };
    if let Some(Value::Object(node_options)) = ui.get("ui:options") {
        for (key, value) in node_options {
            options.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in ui {
        let Some(name) = key.strip_prefix(UI_PREFIX) else {
            continue;
        };
        match name {
            "options" | "globalOptions" => {}
            "widget" if value.is_object() => {
                warn!("ui:widget objects are not supported; use ui:options");
            }
            _ => {
                options.insert(name.to_string(), value.clone());
            }
        }
    }
    options
}

/// The `ui:globalOptions` of a root overlay.
pub fn global_options(root_ui: &Value) -> Map<String, Value> {
    match root_ui.get("ui:globalOptions") {
        Some(Value::Object(options)) => options.clone(),
        _ => Map::new(),
    }
}

/// String-valued option.
pub fn option_str<'a>(options: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

/// Boolean option with a fallback.
pub fn option_bool(options: &Map<String, Value>, key: &str, fallback: bool) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(fallback)
}

/// Overlay for a named property. Names in the reserved `ui:` namespace
/// never select an overlay.
pub fn child_ui(ui_schema: &Value, name: &str) -> Value {
    if name.starts_with(UI_PREFIX) {
        warn!(name, "property name collides with reserved uiSchema prefix; ignoring its overlay");
        return Value::Object(Map::new());
    }
    ui_schema.get(name).cloned().unwrap_or(Value::Null)
}

/// Overlay for array position `index`. Tuple overlays are per position;
/// positions past the tuple use `additionalItems`.
pub fn item_ui(ui_schema: &Value, index: usize, additional: bool) -> Value {
    if additional {
        return ui_schema.get("additionalItems").cloned().unwrap_or(Value::Null);
    }
    match ui_schema.get("items") {
        Some(Value::Array(items)) => items.get(index).cloned().unwrap_or(Value::Null),
        Some(items) => items.clone(),
        None => Value::Null,
    }
}

/// Overlay for option `index` of a combinator.
pub fn option_ui(ui_schema: &Value, kind: CombinatorKind, index: usize) -> Value {
    ui_schema
        .get(kind.keyword())
        .and_then(Value::as_array)
        .and_then(|options| options.get(index))
        .cloned()
        .unwrap_or(Value::Null)
}

/// The overlay a combinator branch renders with: the node's own hints minus
/// the combinator lists, with the selected option's hints on top.
pub fn branch_ui(ui_schema: &Value, kind: CombinatorKind, index: usize) -> Value {
    let mut merged = match ui_schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    merged.remove("anyOf");
    merged.remove("oneOf");
    merged.remove("ui:field");
    if let Value::Object(option) = option_ui(ui_schema, kind, index) {
        for (key, value) in option {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

fn label(
    options: &Map<String, Value>,
    schema: &Value,
    key: &str,
    fallback: Option<&str>,
) -> Option<String> {
    let text = option_str(options, key)
        .or_else(|| schema.get(key).and_then(Value::as_str))
        .or(fallback)?;
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Title shown for a field: `ui:title`, `ui:options.title`, `schema.title`,
/// then the field name. An explicit empty string hides the title.
pub fn resolve_title(options: &Map<String, Value>, schema: &Value, name: &str) -> Option<String> {
    let fallback = if name.is_empty() { None } else { Some(name) };
    label(options, schema, "title", fallback)
}

/// Description with the same precedence as [`resolve_title`], minus the name.
pub fn resolve_description(options: &Map<String, Value>, schema: &Value) -> Option<String> {
    label(options, schema, "description", None)
}

/// Apply a `ui:order` list to property names.
///
/// `*` stands for every property not listed; names in the order that the
/// schema does not declare are ignored.
///
/// # Errors
///
/// A message when the list omits properties without a wildcard, or holds
/// more than one wildcard.
pub fn order_properties(properties: &[String], order: &[String]) -> Result<Vec<String>, String> {
    let filtered: Vec<&String> = order
        .iter()
        .filter(|name| *name == "*" || properties.contains(*name))
        .collect();
    let rest: Vec<String> = properties
        .iter()
        .filter(|name| !filtered.contains(name))
        .cloned()
        .collect();

    let wildcards: Vec<usize> = filtered
        .iter()
        .enumerate()
        .filter(|(_, name)| **name == "*")
        .map(|(i, _)| i)
        .collect();

    match wildcards.as_slice() {
        [] => {
            if !rest.is_empty() {
                return Err(format!(
                    "uiSchema order list does not contain {}",
                    property_list(&rest)
                ));
            }
            Ok(filtered.into_iter().cloned().collect())
        }
        [at] => {
            let mut complete: Vec<String> = Vec::with_capacity(properties.len());
            complete.extend(filtered[..*at].iter().map(|s| s.to_string()));
            complete.extend(rest);
            complete.extend(filtered[at + 1..].iter().map(|s| s.to_string()));
            Ok(complete)
        }
        _ => Err("uiSchema order list contains more than one wildcard item".to_string()),
    }
}

fn property_list(names: &[String]) -> String {
    if names.len() > 1 {
        format!("properties '{}'", names.join("', '"))
    } else {
        format!("property '{}'", names[0])
    }
}
