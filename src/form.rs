//! The form instance: data, instance state and errors across render passes.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::defaults::default_form_state;
use crate::dispatch::{expand_branches, schema_at, Dispatcher, FieldDescriptor};
use crate::error::{ResolveError, SubmitError, ValidateError};
use crate::identity::{ArrayOp, InstanceState};
use crate::ids::{omit_extra_data, to_path_schema};
use crate::merge::branch_schema;
use crate::mutation::{
    apply_array_op, apply_change, available_key, input_value, rename_key, NumberInput,
};
use crate::registry::{Registry, TemplateKind, TemplateRef};
use crate::resolver::{array_item_schema, SchemaResolver};
use crate::types::{
    alternatives, json_type_name, parse_data_path, path_name, schema_type, value_at, FormOptions,
    PathSegment, ShowErrorList,
};
use crate::validation::{
    CustomValidate, ErrorSchema, ErrorSchemaBuilder, TransformErrors, ValidationError, Validator,
};
use crate::validator::JsonSchemaValidator;

/// The aggregate error list of a rendered form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorList {
    pub position: ShowErrorList,
    pub errors: Vec<ValidationError>,
    pub template: TemplateRef,
}

/// Output of one render pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub root: FieldDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_list: Option<ErrorList>,
}

/// One live form.
///
/// Owns the documents, the current data and everything remembered between
/// render passes. Every change produces a new data value; the documents
/// passed in are never modified.
pub struct FormState {
    schema: Value,
    ui_schema: Value,
    form_data: Option<Value>,
    initial_data: Option<Value>,
    options: FormOptions,
    registry: Registry,
    validator: Box<dyn Validator>,
    state: InstanceState,
    errors: Vec<ValidationError>,
    error_schema: ErrorSchema,
    custom_validate: Option<Box<CustomValidate>>,
    transform_errors: Option<Box<TransformErrors<'static>>>,
}

impl FormState {
    /// A form validated by [`JsonSchemaValidator`].
    pub fn new(
        schema: Value,
        ui_schema: Value,
        form_data: Option<Value>,
        options: FormOptions,
    ) -> Result<Self, ResolveError> {
        Self::with_validator(schema, ui_schema, form_data, options, Box::new(JsonSchemaValidator))
    }

    /// A form with its initial data seeded from schema defaults.
    pub fn with_validator(
        schema: Value,
        ui_schema: Value,
        form_data: Option<Value>,
        options: FormOptions,
        validator: Box<dyn Validator>,
    ) -> Result<Self, ResolveError> {
        let seeded = {
            let resolver = SchemaResolver::new(&schema, &*validator);
            default_form_state(&resolver, &schema, form_data.as_ref(), options.defaults)?
        };
        let registry = Registry::new(schema.clone(), &options.registry, options.form_context.clone());
        Ok(Self {
            schema,
            ui_schema,
            form_data: seeded,
            initial_data: form_data,
            options,
            registry,
            validator,
            state: InstanceState::new(),
            errors: Vec::new(),
            error_schema: ErrorSchema::new(),
            custom_validate: None,
            transform_errors: None,
        })
    }

    /// Run `hook` after schema validation; its errors add to the schema's.
    pub fn set_custom_validate(&mut self, hook: impl Fn(&Value, &mut ErrorSchemaBuilder) + 'static) {
        self.custom_validate = Some(Box::new(hook));
    }

    /// Rewrite the flat error list before it is projected.
    pub fn set_transform_errors(
        &mut self,
        hook: impl Fn(Vec<ValidationError>) -> Vec<ValidationError> + 'static,
    ) {
        self.transform_errors = Some(Box::new(hook));
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn ui_schema(&self) -> &Value {
        &self.ui_schema
    }

    pub fn form_data(&self) -> Option<&Value> {
        self.form_data.as_ref()
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn error_schema(&self) -> &ErrorSchema {
        &self.error_schema
    }

    pub fn instance_state(&self) -> &InstanceState {
        &self.state
    }

    /// Describe the whole form for the current data.
    ///
    /// Remembers first-time combinator selections, gives keys to rows seen
    /// for the first time and forgets state of nodes that are gone.
    pub fn render(&mut self) -> Result<FormView, ResolveError> {
        let resolver = SchemaResolver::new(&self.schema, &*self.validator);
        let dispatcher = Dispatcher::new(
            &resolver,
            &self.registry,
            &self.options,
            &self.state,
            &self.error_schema,
            &self.ui_schema,
        );
        let root = dispatcher.dispatch_root(&self.ui_schema, self.form_data.as_ref())?;
        let visits = dispatcher.into_visits();
        self.state.finish_render(visits);

        let error_list = match self.options.show_error_list {
            ShowErrorList::Hidden => None,
            _ if self.errors.is_empty() => None,
            position => Some(ErrorList {
                position,
                errors: self.errors.clone(),
                template: self.registry.template(TemplateKind::ErrorListTemplate),
            }),
        };
        Ok(FormView { root, error_list })
    }

    /// Commit a value at `path`. `None` clears it.
    pub fn change(&mut self, path: &[PathSegment], value: Option<Value>) -> Result<(), ValidateError> {
        self.form_data = apply_change(self.form_data.as_ref(), path, value);
        let key = self.state.state_key(path);
        self.state.clear_number_text(&key);
        self.after_change()
    }

    /// Commit text typed into an input. Empty text commits `ui:emptyValue`
    /// when configured and clears the value otherwise.
    pub fn change_text(&mut self, path: &[PathSegment], text: &str) -> Result<(), ValidateError> {
        let value = input_value(text, &self.ui_at(path));
        self.change(path, value)
    }

    /// Commit text typed into a number input, keeping the text for display.
    pub fn change_number(&mut self, path: &[PathSegment], text: &str) -> Result<(), ValidateError> {
        let input = NumberInput::parse(text, &self.ui_at(path));
        self.form_data = apply_change(self.form_data.as_ref(), path, input.value);
        let key = self.state.state_key(path);
        if input.text.is_empty() {
            self.state.clear_number_text(&key);
        } else {
            self.state.set_number_text(key, input.text);
        }
        self.after_change()
    }

    /// Edit the array at `path`; row keys follow their rows.
    pub fn array_op(&mut self, path: &[PathSegment], op: ArrayOp) -> Result<(), ValidateError> {
        self.form_data = apply_array_op(self.form_data.as_ref(), path, &op);
        let key = self.state.state_key(path);
        self.state.apply_array_op(key, &op);
        self.after_change()
    }

    /// Append a row seeded with the item schema's defaults.
    pub fn add_row(&mut self, path: &[PathSegment]) -> Result<(), ValidateError> {
        let item = {
            let resolver = SchemaResolver::new(&self.schema, &*self.validator);
            let node = self.expanded_schema_at(&resolver, path)?;
            let item_schema = array_item_schema(&node, None);
            default_form_state(&resolver, &item_schema, None, self.options.defaults)?
        };
        self.array_op(
            path,
            ArrayOp::Append {
                item: item.unwrap_or(Value::Null),
            },
        )
    }

    /// Switch the outermost combinator at `path` to option `index`.
    ///
    /// Data only the old option declared is dropped, as is data whose type
    /// differs between the options. Base properties stay. The new option's
    /// defaults are seeded under what remains.
    pub fn select_option(&mut self, path: &[PathSegment], index: usize) -> Result<(), ValidateError> {
        let resolver = SchemaResolver::new(&self.schema, &*self.validator);
        let data = self.form_data.as_ref();
        let node = schema_at(&resolver, &self.state, data, path)?;
        let Some((kind, options)) = alternatives(&node) else {
            warn!(path = %path_name(path), "no anyOf/oneOf to select from");
            return Ok(());
        };
        if index >= options.len() {
            warn!(index, "option index out of range");
            return Ok(());
        }

        let value = value_at(data, path);
        let key = (self.state.state_key(path), 0);
        let previous = match self.state.selection(&key) {
            Some(selected) if selected < options.len() => selected,
            _ => resolver.closest_option(value, options, None)?,
        };
        if previous == index {
            self.state.select(key, index);
            return Ok(());
        }

        let old_option = resolver.resolve(&options[previous], value)?;
        let new_option = resolver.resolve(&options[index], value)?;
        let kept = switched_data(&node, &old_option, &new_option, value);
        let branch = branch_schema(&node, kind, &new_option);
        let next = default_form_state(&resolver, &branch, kept.as_ref(), self.options.defaults)?;
        debug!(from = previous, to = index, "switched {}", kind.keyword());

        self.state.select(key, index);
        self.form_data = apply_change(self.form_data.as_ref(), path, next);
        self.after_change()
    }

    /// Add an entry to the additional properties of the object at `path`.
    ///
    /// Returns the new key (`newKey`, `newKey-1`, …), or `None` when the
    /// object takes no additional properties.
    pub fn add_additional_property(
        &mut self,
        path: &[PathSegment],
    ) -> Result<Option<String>, ValidateError> {
        let (key, value) = {
            let resolver = SchemaResolver::new(&self.schema, &*self.validator);
            let node = self.expanded_schema_at(&resolver, path)?;
            let additional = match node.get("additionalProperties") {
                None | Some(Value::Bool(false)) => return Ok(None),
                Some(schema @ Value::Object(_)) => resolver.resolve(schema, None)?,
                Some(_) => json!({}),
            };
            let existing = match value_at(self.form_data.as_ref(), path) {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            };
            let key = available_key("newKey", &existing);
            let value = additional
                .get("const")
                .or_else(|| additional.get("default"))
                .cloned()
                .unwrap_or_else(|| placeholder_value(schema_type(&additional)));
            (key, value)
        };

        let mut entry_path = path.to_vec();
        entry_path.push(PathSegment::Key(key.clone()));
        self.form_data = apply_change(self.form_data.as_ref(), &entry_path, Some(value));
        self.after_change()?;
        Ok(Some(key))
    }

    /// Rename an additional property in place. Returns the key actually
    /// used, which gets a `-N` suffix when `new_key` is taken.
    pub fn rename_additional_property(
        &mut self,
        path: &[PathSegment],
        old_key: &str,
        new_key: &str,
    ) -> Result<String, ValidateError> {
        let Some(Value::Object(map)) = value_at(self.form_data.as_ref(), path) else {
            return Ok(old_key.to_string());
        };
        if old_key == new_key {
            return Ok(old_key.to_string());
        }
        let (renamed, key) = rename_key(map, old_key, new_key);
        self.form_data = apply_change(self.form_data.as_ref(), path, Some(Value::Object(renamed)));
        self.after_change()?;
        Ok(key)
    }

    /// Validate the current data and keep the result for the next render.
    /// Returns whether the data is valid.
    pub fn validate(&mut self) -> Result<bool, ValidateError> {
        let data = self.form_data.clone().unwrap_or(Value::Null);
        let result = {
            let resolver = SchemaResolver::new(&self.schema, &*self.validator);
            let state = &self.state;
            let user_transform = self.transform_errors.as_deref();
            let transform: &TransformErrors<'_> = &|errors: Vec<ValidationError>| {
                let errors: Vec<ValidationError> = errors
                    .into_iter()
                    .filter(|error| !is_const_required(&resolver, state, &data, error))
                    .collect();
                match user_transform {
                    Some(hook) => hook(errors),
                    None => errors,
                }
            };
            self.validator.validate_form_data(
                &data,
                &self.schema,
                self.custom_validate.as_deref(),
                Some(transform),
            )?
        };
        debug!(errors = result.errors.len(), "validated form data");
        self.errors = result.errors;
        self.error_schema = result.error_schema;
        Ok(self.errors.is_empty())
    }

    /// The data to hand to the host's submit handler.
    ///
    /// # Errors
    ///
    /// `SubmitError::Invalid` when validation leaves errors behind.
    pub fn submit(&mut self) -> Result<Value, SubmitError> {
        if self.options.omit_extra_data {
            let data = self.form_data.clone().unwrap_or(Value::Null);
            let omitted = {
                let resolver = SchemaResolver::new(&self.schema, &*self.validator);
                let paths = to_path_schema(&resolver, &self.schema, Some(&data))?;
                omit_extra_data(&paths, &data)
            };
            self.form_data = Some(omitted);
        }
        if !self.options.no_validate && !self.validate()? {
            return Err(SubmitError::Invalid {
                errors: self.errors.clone(),
            });
        }
        Ok(self.form_data.clone().unwrap_or(Value::Null))
    }

    /// Back to the initial data with defaults, no errors and no state.
    pub fn reset(&mut self) -> Result<(), ResolveError> {
        let seeded = {
            let resolver = SchemaResolver::new(&self.schema, &*self.validator);
            default_form_state(
                &resolver,
                &self.schema,
                self.initial_data.as_ref(),
                self.options.defaults,
            )?
        };
        self.form_data = seeded;
        self.state.clear();
        self.errors.clear();
        self.error_schema = ErrorSchema::new();
        Ok(())
    }

    fn after_change(&mut self) -> Result<(), ValidateError> {
        if self.options.live_validate || !self.errors.is_empty() {
            self.validate()?;
        }
        Ok(())
    }

    fn expanded_schema_at(
        &self,
        resolver: &SchemaResolver<'_>,
        path: &[PathSegment],
    ) -> Result<Value, ResolveError> {
        let data = self.form_data.as_ref();
        let node = schema_at(resolver, &self.state, data, path)?;
        let key = self.state.state_key(path);
        expand_branches(resolver, &self.state, &node, value_at(data, path), &key)
    }

    /// The uiSchema overlay of the node at `path`.
    fn ui_at(&self, path: &[PathSegment]) -> Value {
        let mut ui = &self.ui_schema;
        for segment in path {
            let next = match segment {
                PathSegment::Key(key) => ui.get(key),
                PathSegment::Index(index) => match ui.get("items") {
                    Some(Value::Array(items)) => items.get(*index),
                    other => other,
                },
            };
            match next {
                Some(next) => ui = next,
                None => return Value::Null,
            }
        }
        ui.clone()
    }
}

/// Data carried over when switching from `old` to `new`.
fn switched_data(base: &Value, old: &Value, new: &Value, value: Option<&Value>) -> Option<Value> {
    let properties = |schema: &Value| schema.get("properties").and_then(Value::as_object).cloned();
    let Some(Value::Object(data)) = value else {
        let target = schema_type(new).or_else(|| schema_type(base));
        return value
            .filter(|v| target.map(|t| type_accepts(t, v)).unwrap_or(true))
            .cloned();
    };
    let base_props = properties(base).unwrap_or_default();
    let old_props = properties(old).unwrap_or_default();
    let new_props = properties(new).unwrap_or_default();

    let kept: Map<String, Value> = data
        .iter()
        .filter(|(key, value)| {
            if base_props.contains_key(*key) {
                return true;
            }
            match (old_props.get(*key), new_props.get(*key)) {
                (Some(_), None) => false,
                (Some(before), Some(after)) => {
                    schema_type(before) == schema_type(after)
                        && before.get("const") != Some(*value)
                }
                _ => true,
            }
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Some(Value::Object(kept))
}

fn type_accepts(ty: &str, value: &Value) -> bool {
    let actual = json_type_name(value);
    actual == ty || (ty == "integer" && (value.is_i64() || value.is_u64()))
}

/// The value a fresh additional property starts with.
fn placeholder_value(ty: Option<&str>) -> Value {
    match ty {
        Some("array") => json!([]),
        Some("boolean") => json!(false),
        Some("null") => Value::Null,
        Some("number") | Some("integer") => json!(0),
        Some("object") => json!({}),
        _ => json!("New Value"),
    }
}

fn is_const_required(
    resolver: &SchemaResolver<'_>,
    state: &InstanceState,
    data: &Value,
    error: &ValidationError,
) -> bool {
    if error.name != "required" {
        return false;
    }
    let path = parse_data_path(&error.path().join("."));
    schema_at(resolver, state, Some(data), &path)
        .map(|schema| schema.get("const").is_some())
        .unwrap_or(false)
}
