//! Core types and schema helpers shared by every stage of the form pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::RegistryOverrides;

/// Marker placed on property schemas stubbed in for additional properties.
pub const ADDITIONAL_PROPERTY_FLAG: &str = "__additional_property";

/// Marker placed on path schema nodes that hold free-form additional data.
pub const PATH_ADDITIONAL_FLAG: &str = "__additional_properties";

/// Key holding the identifier in an id schema node.
pub const ID_KEY: &str = "$id";

/// Key holding the dotted data path in a path schema node.
pub const NAME_KEY: &str = "$name";

/// Prefix of reserved uiSchema keys.
pub const UI_PREFIX: &str = "ui:";

/// Returns the JSON type name of a value.
///
/// Doubles as the type guess for untyped additional properties and `const`.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Determine the effective type of a schema node.
///
/// Falls back to the `const` value's type, `"string"` for bare enums and
/// `"object"` for nodes declaring properties. A nullable pair such as
/// `["string", "null"]` yields the non-null member; other type lists yield
/// their first entry.
pub fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            if names.len() == 2 && names.contains(&"null") {
                names.into_iter().find(|t| *t != "null")
            } else {
                names.first().copied()
            }
        }
        _ => {
            if let Some(constant) = schema.get("const") {
                Some(json_type_name(constant))
            } else if schema.get("enum").is_some() {
                Some("string")
            } else if schema.get("properties").is_some()
                || schema.get("additionalProperties").is_some()
            {
                Some("object")
            } else {
                None
            }
        }
    }
}

/// Normalize boolean schemas: `true` (and any non-object) becomes `{}`.
pub fn as_schema_object(schema: &Value) -> Map<String, Value> {
    match schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

/// Whether a schema pins exactly one value (`const` or single-entry `enum`).
pub fn is_constant(schema: &Value) -> bool {
    schema.get("const").is_some()
        || schema
            .get("enum")
            .and_then(Value::as_array)
            .map(|e| e.len() == 1)
            .unwrap_or(false)
}

/// The pinned value of a constant schema.
pub fn to_constant(schema: &Value) -> Option<Value> {
    if let Some(constant) = schema.get("const") {
        return Some(constant.clone());
    }
    match schema.get("enum").and_then(Value::as_array) {
        Some(values) if values.len() == 1 => Some(values[0].clone()),
        _ => None,
    }
}

/// Whether an already-resolved schema renders as a choice between values.
pub fn is_select(schema: &Value) -> bool {
    if schema.get("enum").map(Value::is_array).unwrap_or(false) {
        return true;
    }
    match alternatives(schema) {
        Some((_, options)) if !options.is_empty() => options.iter().all(is_constant),
        _ => false,
    }
}

/// Whether `items` is a tuple of per-position schemas.
pub fn is_fixed_items(schema: &Value) -> bool {
    match schema.get("items").and_then(Value::as_array) {
        Some(items) => !items.is_empty() && items.iter().all(Value::is_object),
        None => false,
    }
}

/// Which combinator keyword a node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CombinatorKind {
    AnyOf,
    OneOf,
}

impl CombinatorKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            CombinatorKind::AnyOf => "anyOf",
            CombinatorKind::OneOf => "oneOf",
        }
    }
}

/// The `oneOf` (preferred) or `anyOf` alternatives of a schema.
pub fn alternatives(schema: &Value) -> Option<(CombinatorKind, &Vec<Value>)> {
    if let Some(options) = schema.get("oneOf").and_then(Value::as_array) {
        return Some((CombinatorKind::OneOf, options));
    }
    schema
        .get("anyOf")
        .and_then(Value::as_array)
        .map(|options| (CombinatorKind::AnyOf, options))
}

/// One step of a data path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// Segment as it appears in ids, names and error schema keys.
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Index(i) => i.to_string(),
            PathSegment::Key(k) => k.clone(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{}", i),
            PathSegment::Key(k) => write!(f, "{}", k),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Dotted form of a data path (`"list.0.name"`), empty for the root.
pub fn path_name(path: &[PathSegment]) -> String {
    path.iter()
        .map(PathSegment::as_key)
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse a dotted data path. All-digit segments are array indices.
pub fn parse_data_path(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.parse::<usize>() {
            Ok(index) if segment.bytes().all(|b| b.is_ascii_digit()) => PathSegment::Index(index),
            _ => PathSegment::Key(segment.to_string()),
        })
        .collect()
}

/// Look up the value at a data path.
pub fn value_at<'a>(value: Option<&'a Value>, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value?;
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Key(k), Value::Object(map)) => map.get(k)?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
            (PathSegment::Key(k), Value::Array(items)) => items.get(k.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Where the aggregate error list is placed relative to the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowErrorList {
    #[default]
    Top,
    Bottom,
    Hidden,
}

/// When arrays are padded up to `minItems` while computing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrayMinItems {
    /// Always pad.
    #[default]
    Populate,
    /// Pad only arrays that are required by their parent.
    RequiredOnly,
    /// Never pad.
    Never,
}

/// Which computed object defaults are written into the parent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyObjectFields {
    /// Keep every non-empty default; empty objects only when required.
    #[default]
    PopulateAllDefaults,
    /// Keep object defaults only below required parents.
    PopulateRequiredDefaults,
    /// Write no computed property defaults into objects.
    SkipDefaults,
}

/// Tuning for the default/value merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaultsBehavior {
    pub array_min_items: ArrayMinItems,
    pub empty_object_fields: EmptyObjectFields,
}

/// Per-instance configuration threaded through every render pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormOptions {
    /// Prefix of every generated `$id`.
    pub id_prefix: String,
    /// Separator between id segments.
    pub id_separator: String,
    pub show_error_list: ShowErrorList,
    /// Re-validate after every change.
    pub live_validate: bool,
    /// Skip validation on submit.
    pub no_validate: bool,
    /// Drop data that no field binds to when submitting.
    pub omit_extra_data: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub defaults: DefaultsBehavior,
    pub registry: RegistryOverrides,
    pub form_context: Value,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            id_prefix: "root".to_string(),
            id_separator: "_".to_string(),
            show_error_list: ShowErrorList::default(),
            live_validate: false,
            no_validate: false,
            omit_extra_data: false,
            disabled: false,
            readonly: false,
            defaults: DefaultsBehavior::default(),
            registry: RegistryOverrides::default(),
            form_context: Value::Null,
        }
    }
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn id_separator(mut self, separator: impl Into<String>) -> Self {
        self.id_separator = separator.into();
        self
    }

    pub fn show_error_list(mut self, position: ShowErrorList) -> Self {
        self.show_error_list = position;
        self
    }

    pub fn live_validate(mut self, live: bool) -> Self {
        self.live_validate = live;
        self
    }

    pub fn no_validate(mut self, skip: bool) -> Self {
        self.no_validate = skip;
        self
    }

    pub fn omit_extra_data(mut self, omit: bool) -> Self {
        self.omit_extra_data = omit;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn defaults(mut self, behavior: DefaultsBehavior) -> Self {
        self.defaults = behavior;
        self
    }

    pub fn registry(mut self, overrides: RegistryOverrides) -> Self {
        self.registry = overrides;
        self
    }

    pub fn form_context(mut self, context: Value) -> Self {
        self.form_context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_type_from_explicit_type() {
        assert_eq!(schema_type(&json!({"type": "string"})), Some("string"));
        assert_eq!(schema_type(&json!({"type": ["integer", "null"]})), Some("integer"));
        assert_eq!(schema_type(&json!({"type": ["null", "boolean"]})), Some("boolean"));
        assert_eq!(
            schema_type(&json!({"type": ["string", "number", "null"]})),
            Some("string")
        );
    }

    #[test]
    fn schema_type_guessed() {
        assert_eq!(schema_type(&json!({"const": 3})), Some("number"));
        assert_eq!(schema_type(&json!({"enum": ["a"]})), Some("string"));
        assert_eq!(schema_type(&json!({"properties": {}})), Some("object"));
        assert_eq!(schema_type(&json!({"additionalProperties": true})), Some("object"));
        assert_eq!(schema_type(&json!({})), None);
    }

    #[test]
    fn select_detection() {
        assert!(is_select(&json!({"enum": ["a", "b"]})));
        assert!(is_select(&json!({"oneOf": [{"const": 1}, {"enum": [2]}]})));
        assert!(!is_select(&json!({"oneOf": [{"const": 1}, {"type": "string"}]})));
        assert!(!is_select(&json!({"type": "string"})));
    }

    #[test]
    fn value_at_walks_objects_and_arrays() {
        let data = json!({"list": [{"name": "a"}, {"name": "b"}]});
        let path = vec![PathSegment::from("list"), 1.into(), "name".into()];
        assert_eq!(value_at(Some(&data), &path), Some(&json!("b")));
        assert_eq!(value_at(Some(&data), &["missing".into()]), None);
        assert_eq!(path_name(&path), "list.1.name");
        assert_eq!(parse_data_path("list.1.name"), path);
        assert!(parse_data_path("").is_empty());
    }

    #[test]
    fn form_options_deserialize_with_defaults() {
        let options: FormOptions =
            serde_json::from_value(json!({"idPrefix": "form", "liveValidate": true})).unwrap();
        assert_eq!(options.id_prefix, "form");
        assert_eq!(options.id_separator, "_");
        assert!(options.live_validate);
        assert_eq!(options.show_error_list, ShowErrorList::Top);
    }
}
