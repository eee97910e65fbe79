//! Default [`Validator`] backed by the `jsonschema` crate.

use jsonschema::error::ValidationErrorKind;
use jsonschema::Draft;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ValidateError;
use crate::validation::{ValidationError, Validator};

/// Validates with `jsonschema`, defaulting to draft 7 so tuple `items`,
/// `additionalItems` and `dependencies` keep their classic meaning.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self
    }

    fn compile(schema: &Value) -> Result<jsonschema::Validator, ValidateError> {
        jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(schema)
            .map_err(|e| ValidateError::InvalidSchema {
                message: e.to_string(),
            })
    }
}

impl Validator for JsonSchemaValidator {
    fn raw_errors(
        &self,
        form_data: &Value,
        schema: &Value,
    ) -> Result<Vec<ValidationError>, ValidateError> {
        let validator = Self::compile(schema)?;
        Ok(validator.iter_errors(form_data).map(|e| convert(&e)).collect())
    }

    fn is_valid(&self, schema: &Value, form_data: &Value, root_schema: &Value) -> bool {
        if let Value::Bool(accepts) = schema {
            return *accepts;
        }
        let combined = with_root_definitions(schema, root_schema);
        match Self::compile(&combined) {
            Ok(validator) => validator.is_valid(form_data),
            Err(e) => {
                warn!("cannot compile subschema for evaluation: {}", e);
                false
            }
        }
    }
}

/// Copy the root's definition tables onto a subschema so its `$ref`s resolve.
fn with_root_definitions(schema: &Value, root_schema: &Value) -> Value {
    let mut combined = schema.clone();
    if let Value::Object(map) = &mut combined {
        for key in ["definitions", "$defs"] {
            if let Some(defs) = root_schema.get(key) {
                map.entry(key.to_string()).or_insert_with(|| defs.clone());
            }
        }
    }
    combined
}

/// Turn a JSON pointer into the leading-dot property form (`/a/0` → `.a.0`).
fn pointer_to_property(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|part| property_segment(&part.replace("~1", "/").replace("~0", "~")))
        .collect()
}

fn property_segment(key: &str) -> String {
    if key.is_empty() || key.contains(['.', '[', ']', ' ', '\'']) {
        format!("['{}']", key)
    } else {
        format!(".{}", key)
    }
}

fn convert(error: &jsonschema::ValidationError<'_>) -> ValidationError {
    let mut property = pointer_to_property(&error.instance_path.to_string());
    let mut params = Value::Null;

    let name = match &error.kind {
        ValidationErrorKind::Required { property: missing } => {
            if let Some(missing) = missing.as_str() {
                property.push_str(&property_segment(missing));
            }
            params = json!({ "missingProperty": missing });
            "required"
        }
        ValidationErrorKind::AdditionalItems { .. } => "additionalItems",
        ValidationErrorKind::AdditionalProperties { .. } => "additionalProperties",
        ValidationErrorKind::AnyOf { .. } => "anyOf",
        ValidationErrorKind::Constant { .. } => "const",
        ValidationErrorKind::Contains { .. } => "contains",
        ValidationErrorKind::Enum { .. } => "enum",
        ValidationErrorKind::ExclusiveMaximum { .. } => "exclusiveMaximum",
        ValidationErrorKind::ExclusiveMinimum { .. } => "exclusiveMinimum",
        ValidationErrorKind::Format { .. } => "format",
        ValidationErrorKind::MaxItems { .. } => "maxItems",
        ValidationErrorKind::Maximum { .. } => "maximum",
        ValidationErrorKind::MaxLength { .. } => "maxLength",
        ValidationErrorKind::MaxProperties { .. } => "maxProperties",
        ValidationErrorKind::MinItems { .. } => "minItems",
        ValidationErrorKind::Minimum { .. } => "minimum",
        ValidationErrorKind::MinLength { .. } => "minLength",
        ValidationErrorKind::MinProperties { .. } => "minProperties",
        ValidationErrorKind::MultipleOf { .. } => "multipleOf",
        ValidationErrorKind::Not { .. } => "not",
        ValidationErrorKind::OneOfMultipleValid { .. } | ValidationErrorKind::OneOfNotValid { .. } => {
            "oneOf"
        }
        ValidationErrorKind::Pattern { .. } => "pattern",
        ValidationErrorKind::Type { .. } => "type",
        ValidationErrorKind::UniqueItems { .. } => "uniqueItems",
        _ => "schema",
    };

    let mut converted = ValidationError::new(name, property, error.to_string());
    converted.params = params;
    converted.schema_path = Some(error.schema_path.to_string());
    converted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{to_error_schema, TransformErrors};

    #[test]
    fn pointer_conversion() {
        assert_eq!(pointer_to_property(""), "");
        assert_eq!(pointer_to_property("/foo/0/bar"), ".foo.0.bar");
        assert_eq!(pointer_to_property("/a b"), "['a b']");
    }

    #[test]
    fn required_error_points_at_missing_property() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        });
        let errors = JsonSchemaValidator.raw_errors(&json!({}), &schema).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "required");
        assert_eq!(errors[0].property, ".name");
        assert_eq!(errors[0].params["missingProperty"], "name");
    }

    #[test]
    fn nested_errors_project_onto_index_paths() {
        let schema = json!({
            "type": "object",
            "properties": {
                "list": { "type": "array", "items": { "type": "string", "minLength": 3 } }
            }
        });
        let data = json!({ "list": ["long enough", "no"] });
        let errors = JsonSchemaValidator.raw_errors(&data, &schema).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "minLength");
        let tree = to_error_schema(&errors);
        assert_eq!(tree.at(&["list".into(), 1.into()]).unwrap().errors.len(), 1);
    }

    #[test]
    fn is_valid_resolves_root_definitions() {
        let root = json!({
            "definitions": { "name": { "type": "string" } }
        });
        let schema = json!({
            "properties": { "n": { "$ref": "#/definitions/name" } },
            "required": ["n"]
        });
        assert!(JsonSchemaValidator.is_valid(&schema, &json!({"n": "x"}), &root));
        assert!(!JsonSchemaValidator.is_valid(&schema, &json!({"n": 1}), &root));
        assert!(!JsonSchemaValidator.is_valid(&schema, &json!({}), &root));
    }

    #[test]
    fn boolean_schemas() {
        assert!(JsonSchemaValidator.is_valid(&json!(true), &json!(1), &json!({})));
        assert!(!JsonSchemaValidator.is_valid(&json!(false), &json!(1), &json!({})));
    }

    #[test]
    fn invalid_schema_reported() {
        let result = JsonSchemaValidator.raw_errors(&json!(1), &json!({"type": 12}));
        assert!(matches!(result, Err(ValidateError::InvalidSchema { .. })));
    }

    #[test]
    fn transform_hook_may_borrow_local_state() {
        let schema = json!({
            "type": "object",
            "required": ["a", "b"]
        });
        let exempt = String::from(".a");
        let transform: &TransformErrors<'_> = &|errors: Vec<ValidationError>| {
            errors.into_iter().filter(|e| e.property != exempt).collect()
        };
        let result = JsonSchemaValidator
            .validate_form_data(&json!({}), &schema, None, Some(transform))
            .unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].property, ".b");
        assert!(result.error_schema.at(&["a".into()]).is_none());
    }
}
