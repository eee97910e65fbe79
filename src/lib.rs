//! Schema Form
//!
//! Schema resolution and field dispatch for JSON Schema driven forms.
//!
//! Given a JSON Schema, an optional uiSchema overlay and partial form data,
//! this library decides which field renders at every node, computes ids,
//! data paths and default values, and produces the next data value for
//! every edit while keeping array rows' identity stable.
//!
//! # Example
//!
//! ```
//! use schema_form::{FieldVariant, FormOptions, FormState};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": {
//!         "name": { "type": "string", "title": "Name" },
//!         "kind": { "const": "person" },
//!         "tags": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
//!     }
//! });
//!
//! let mut form = FormState::new(schema, json!({}), None, FormOptions::default()).unwrap();
//!
//! // Defaults are seeded: const values and minItems rows
//! assert_eq!(form.form_data(), Some(&json!({ "kind": "person", "tags": [null] })));
//!
//! let view = form.render().unwrap();
//! let name = view.root.find(&["name".into()]).unwrap();
//! assert_eq!(name.id, "root_name");
//! assert!(matches!(name.variant, FieldVariant::Leaf { .. }));
//!
//! // Submitting is blocked until the required field is filled
//! assert!(form.submit().is_err());
//! form.change_text(&["name".into()], "Ada").unwrap();
//! form.change_text(&["tags".into(), 0.into()], "x").unwrap();
//! assert!(form.submit().is_ok());
//! ```
//!
//! # Field Variants
//!
//! | Schema | Variant |
//! |--------|---------|
//! | `ui:field` naming a host field | `Custom` |
//! | `const` | `Const` (disabled) |
//! | `enum`, constant `oneOf`/`anyOf` | `Select` |
//! | `oneOf`/`anyOf` | `Combinator` |
//! | `type: array` | `Array` |
//! | `type: object` | `Object` |
//! | primitive types | `Leaf` |
//! | anything else | `Unsupported` |

mod defaults;
mod dispatch;
mod error;
mod form;
mod identity;
mod ids;
mod loader;
mod merge;
mod mutation;
mod registry;
mod resolver;
mod types;
mod ui;
mod validation;
mod validator;

pub use defaults::{compute_defaults, default_form_state, merge_defaults_with_form_data};
pub use dispatch::{
    expand_branches, schema_at, ArrayRow, Dispatcher, EnumOption, FieldContext, FieldDescriptor,
    FieldVariant,
};
pub use error::{ResolveError, SubmitError, ValidateError};
pub use form::{ErrorList, FormState, FormView};
pub use identity::{
    reconcile_keys, ArrayKeyTracker, ArrayOp, InstanceState, KeyedRow, RowKey, SelectionKey,
    StateKey, StateSegment, Visits,
};
pub use ids::{child_id, omit_extra_data, to_id_schema, to_path_schema, IdConfig};
pub use loader::{load_document, load_document_str, load_form_document, FormDocument};
pub use merge::{merge_objects, merge_schemas};
pub use mutation::{apply_array_op, apply_change, input_value, NumberInput};
pub use registry::{
    BuiltinField, BuiltinWidget, Component, FieldRef, Registry, RegistryOverrides, TemplateKind,
    TemplateRef, WidgetRef,
};
pub use resolver::SchemaResolver;
pub use types::{
    parse_data_path, path_name, ArrayMinItems, CombinatorKind, DefaultsBehavior,
    EmptyObjectFields, FormOptions, PathSegment, ShowErrorList,
};
pub use ui::{order_properties, ui_options};
pub use validation::{
    parse_property_path, to_error_schema, CustomValidate, ErrorSchema, ErrorSchemaBuilder,
    TransformErrors, ValidationData, ValidationError, Validator,
};
pub use validator::JsonSchemaValidator;
