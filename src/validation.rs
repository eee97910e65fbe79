//! Validation plumbing: the validator seam, flat errors and the error schema.
//!
//! A [`Validator`] produces flat [`ValidationError`]s whose `property` is a
//! path string. Two historical conventions are accepted (`.foo.bar[0]` with a
//! leading dot and bare `foo.bar.0`), plus bracket-quoted keys and JSON
//! pointers. The flat list is projected onto an [`ErrorSchema`] tree that
//! mirrors the data shape; custom validation adds to that tree through an
//! [`ErrorSchemaBuilder`] and both sources accumulate.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidateError;
use crate::types::PathSegment;

/// User hook run after schema validation.
pub type CustomValidate = dyn Fn(&Value, &mut ErrorSchemaBuilder);

/// Hook rewriting the flat error list before projection. Stored user hooks
/// are `TransformErrors<'static>`; per-pass filters may borrow.
pub type TransformErrors<'a> = dyn Fn(Vec<ValidationError>) -> Vec<ValidationError> + 'a;

/// One violation reported by a validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Rule kind, e.g. `required`, `minLength`, `pattern`.
    pub name: String,
    /// Path of the offending value, e.g. `.list.0.name`.
    pub property: String,
    pub message: String,
    /// Rule-specific data.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    /// Pre-joined human readable form.
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<String>,
}

impl ValidationError {
    pub fn new(
        name: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let property = property.into();
        let message = message.into();
        let stack = if property.is_empty() || property == "." {
            message.clone()
        } else {
            format!("{} {}", property, message)
        };
        Self {
            name: name.into(),
            property,
            message,
            params: Value::Null,
            stack,
            schema_path: None,
        }
    }

    /// The property path split into segments.
    pub fn path(&self) -> Vec<String> {
        parse_property_path(&self.property)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stack)
    }
}

/// Errors plus their projection, as returned by [`Validator::validate_form_data`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationData {
    pub errors: Vec<ValidationError>,
    pub error_schema: ErrorSchema,
}

impl ValidationData {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.error_schema.is_empty()
    }
}

/// The pluggable schema validator.
///
/// Implementors supply raw validation and the boolean check used when
/// evaluating `if`, `dependencies` and combinator options. The pipeline
/// combining both with the user hooks is provided.
pub trait Validator {
    /// Every violation of `schema` by `form_data`.
    fn raw_errors(
        &self,
        form_data: &Value,
        schema: &Value,
    ) -> Result<Vec<ValidationError>, ValidateError>;

    /// Whether `form_data` satisfies `schema`; `$ref`s resolve against `root_schema`.
    fn is_valid(&self, schema: &Value, form_data: &Value, root_schema: &Value) -> bool;

    /// Validate and project errors, running the transform and custom hooks.
    fn validate_form_data(
        &self,
        form_data: &Value,
        schema: &Value,
        custom_validate: Option<&CustomValidate>,
        transform_errors: Option<&TransformErrors<'_>>,
    ) -> Result<ValidationData, ValidateError> {
        let mut errors = self.raw_errors(form_data, schema)?;
        if let Some(transform) = transform_errors {
            errors = transform(errors);
        }
        let mut error_schema = to_error_schema(&errors);

        if let Some(custom) = custom_validate {
            let mut builder = ErrorSchemaBuilder::new();
            custom(form_data, &mut builder);
            let user_schema = builder.into_error_schema();
            errors.extend(user_schema.to_error_list());
            error_schema.merge(user_schema);
        }

        Ok(ValidationData {
            errors,
            error_schema,
        })
    }
}

/// Tree of messages mirroring the data shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSchema {
    #[serde(rename = "__errors", default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(flatten)]
    pub children: BTreeMap<String, ErrorSchema>,
}

impl ErrorSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither this node nor any descendant holds a message.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.children.values().all(ErrorSchema::is_empty)
    }

    pub fn add_error(&mut self, message: impl Into<String>) -> &mut Self {
        self.errors.push(message.into());
        self
    }

    /// The node at `path`, if present.
    pub fn at(&self, path: &[PathSegment]) -> Option<&ErrorSchema> {
        let mut node = self;
        for segment in path {
            node = node.children.get(&segment.as_key())?;
        }
        Some(node)
    }

    /// The node at `path`, created on demand.
    pub fn entry(&mut self, path: &[PathSegment]) -> &mut ErrorSchema {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.as_key()).or_default();
        }
        node
    }

    /// Accumulate `other` into this tree; messages are concatenated.
    pub fn merge(&mut self, other: ErrorSchema) {
        self.errors.extend(other.errors);
        for (key, child) in other.children {
            self.children.entry(key).or_default().merge(child);
        }
    }

    /// Flatten into a list, depth first.
    pub fn to_error_list(&self) -> Vec<ValidationError> {
        let mut list = Vec::new();
        self.collect_errors(&mut Vec::new(), &mut list);
        list
    }

    fn collect_errors(&self, prefix: &mut Vec<String>, list: &mut Vec<ValidationError>) {
        let property = if prefix.is_empty() {
            ".".to_string()
        } else {
            format!(".{}", prefix.join("."))
        };
        for message in &self.errors {
            list.push(ValidationError::new("", property.clone(), message.clone()));
        }
        for (key, child) in &self.children {
            prefix.push(key.clone());
            child.collect_errors(prefix, list);
            prefix.pop();
        }
    }
}

/// Builder handed to custom validation hooks.
#[derive(Debug, Clone, Default)]
pub struct ErrorSchemaBuilder {
    schema: ErrorSchema,
}

impl ErrorSchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_error_schema(schema: ErrorSchema) -> Self {
        Self { schema }
    }

    /// Add a message at `path` (empty path is the root).
    pub fn add_error(&mut self, message: impl Into<String>, path: &[PathSegment]) -> &mut Self {
        self.schema.entry(path).add_error(message);
        self
    }

    pub fn add_errors<I, S>(&mut self, messages: I, path: &[PathSegment]) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let node = self.schema.entry(path);
        for message in messages {
            node.add_error(message);
        }
        self
    }

    /// Replace the messages at `path`.
    pub fn set_errors(&mut self, messages: Vec<String>, path: &[PathSegment]) -> &mut Self {
        self.schema.entry(path).errors = messages;
        self
    }

    pub fn clear_errors(&mut self, path: &[PathSegment]) -> &mut Self {
        if let Some(node) = self.at_mut(path) {
            node.errors.clear();
        }
        self
    }

    pub fn error_schema(&self) -> &ErrorSchema {
        &self.schema
    }

    pub fn into_error_schema(self) -> ErrorSchema {
        self.schema
    }

    fn at_mut(&mut self, path: &[PathSegment]) -> Option<&mut ErrorSchema> {
        let mut node = &mut self.schema;
        for segment in path {
            node = node.children.get_mut(&segment.as_key())?;
        }
        Some(node)
    }
}

/// Project a flat error list onto a tree. Duplicate messages at a node collapse.
pub fn to_error_schema(errors: &[ValidationError]) -> ErrorSchema {
    let mut schema = ErrorSchema::new();
    for error in errors {
        let path: Vec<PathSegment> = error.path().into_iter().map(PathSegment::Key).collect();
        let node = schema.entry(&path);
        if !error.message.is_empty() && !node.errors.contains(&error.message) {
            node.errors.push(error.message.clone());
        }
    }
    schema
}

/// Split a validator property path into segments.
///
/// Accepts `.a.b`, `a.b`, `a[0]`, `['a.b']` and `/a/0` forms.
pub fn parse_property_path(property: &str) -> Vec<String> {
    if let Some(pointer) = property.strip_prefix('/') {
        return pointer
            .split('/')
            .map(|part| part.replace("~1", "/").replace("~0", "~"))
            .collect();
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = property.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let quote = match chars.peek() {
                    Some('\'') | Some('"') => chars.next(),
                    _ => None,
                };
                let mut inner = String::new();
                while let Some(c) = chars.next() {
                    if Some(c) == quote && chars.peek() == Some(&']') {
                        chars.next();
                        break;
                    }
                    if quote.is_none() && c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                segments.push(inner);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_leading_dot_and_bare_paths() {
        assert_eq!(parse_property_path(".foo.bar"), vec!["foo", "bar"]);
        assert_eq!(parse_property_path("foo.bar"), vec!["foo", "bar"]);
        assert_eq!(parse_property_path(".list[1].name"), vec!["list", "1", "name"]);
        assert_eq!(parse_property_path("['a.b'].c"), vec!["a.b", "c"]);
        assert_eq!(parse_property_path("/list/0/a~1b"), vec!["list", "0", "a/b"]);
        assert!(parse_property_path("").is_empty());
        assert!(parse_property_path(".").is_empty());
    }

    #[test]
    fn projects_errors_onto_tree() {
        let errors = vec![
            ValidationError::new("required", ".foo", "is a required property"),
            ValidationError::new("minLength", "list.0", "is too short"),
            ValidationError::new("minLength", ".list[0]", "is too short"),
            ValidationError::new("type", "", "is not an object"),
        ];
        let schema = to_error_schema(&errors);
        assert_eq!(schema.errors, vec!["is not an object"]);
        assert_eq!(
            schema.at(&["foo".into()]).unwrap().errors,
            vec!["is a required property"]
        );
        let item = schema.at(&["list".into(), 0.into()]).unwrap();
        assert_eq!(item.errors, vec!["is too short"]);
    }

    #[test]
    fn builder_adds_nested_errors_and_merges() {
        let mut builder = ErrorSchemaBuilder::new();
        builder
            .add_error("passwords differ", &["pass2".into()])
            .add_error("bad row", &["rows".into(), 2.into()])
            .add_error("form level", &[]);

        let mut base = to_error_schema(&[ValidationError::new(
            "minLength",
            ".pass2",
            "is too short",
        )]);
        base.merge(builder.into_error_schema());

        assert_eq!(
            base.at(&["pass2".into()]).unwrap().errors,
            vec!["is too short", "passwords differ"]
        );
        assert_eq!(
            base.at(&["rows".into(), 2.into()]).unwrap().errors,
            vec!["bad row"]
        );
        assert_eq!(base.errors, vec!["form level"]);
    }

    #[test]
    fn error_schema_serializes_with_errors_key() {
        let mut schema = ErrorSchema::new();
        schema.entry(&["name".into()]).add_error("required");
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"name": {"__errors": ["required"]}})
        );
    }

    #[test]
    fn error_list_flattens_with_dotted_property() {
        let mut schema = ErrorSchema::new();
        schema.add_error("top");
        schema.entry(&["a".into(), "b".into()]).add_error("deep");
        let list = schema.to_error_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].property, ".");
        assert_eq!(list[0].stack, "top");
        assert_eq!(list[1].property, ".a.b");
        assert_eq!(list[1].stack, ".a.b deep");
    }

    #[test]
    fn clear_errors_keeps_children() {
        let mut builder = ErrorSchemaBuilder::new();
        builder.add_errors(["x", "y"], &["a".into()]);
        builder.add_error("z", &["a".into(), "b".into()]);
        builder.clear_errors(&["a".into()]);
        let schema = builder.error_schema();
        assert!(schema.at(&["a".into()]).unwrap().errors.is_empty());
        assert!(!schema.is_empty());
    }

    #[test]
    fn set_errors_replaces_existing_messages() {
        let mut base = ErrorSchema::new();
        base.entry(&["a".into()]).add_error("old");
        let mut builder = ErrorSchemaBuilder::from_error_schema(base);
        builder.set_errors(vec!["new".into()], &["a".into()]);
        assert_eq!(builder.error_schema().at(&["a".into()]).unwrap().errors, vec!["new"]);
    }
}
