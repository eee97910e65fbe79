//! Field dispatch: one schema node in, one [`FieldDescriptor`] out.
//!
//! The dispatcher walks schema, uiSchema and data together. Each node is
//! resolved on its own when it is reached, so recursive schemas only
//! unfold as far as the data goes. Structural problems other than `$ref`
//! turn into [`FieldVariant::Unsupported`] nodes; the rest of the form
//! still renders.

use std::cell::RefCell;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::identity::{InstanceState, RowKey, StateKey, Visits};
use crate::ids::child_id;
use crate::merge::branch_schema;
use crate::mutation::NumberInput;
use crate::registry::{
    BuiltinField, Component, FieldRef, Registry, TemplateKind, TemplateRef, WidgetRef,
};
use crate::resolver::{array_item_schema, resolved_alternatives, SchemaResolver};
use crate::types::{
    alternatives, is_fixed_items, is_select, schema_type, to_constant, value_at, CombinatorKind,
    FormOptions, PathSegment, ADDITIONAL_PROPERTY_FLAG,
};
use crate::ui::{
    branch_ui, child_ui, global_options, item_ui, option_bool, option_str, option_ui,
    order_properties, resolve_description, resolve_title, ui_options,
};
use crate::validation::ErrorSchema;

/// One choice of a select.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumOption {
    pub label: String,
    pub value: Value,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// A rendered array row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayRow {
    /// Stable identity; `None` until the row has been rendered once.
    pub key: Option<RowKey>,
    pub index: usize,
    pub field: FieldDescriptor,
    pub can_remove: bool,
    pub can_move_up: bool,
    pub can_move_down: bool,
    pub can_copy: bool,
}

/// What kind of control renders a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldVariant {
    /// A host field registered through `ui:field` or the schema `$id`.
    Custom { field: String },
    /// A pinned value, rendered disabled.
    Const { value: Value },
    Select {
        widget: WidgetRef,
        options: Vec<EnumOption>,
        multiple: bool,
    },
    /// An option selector plus the selected branch.
    #[serde(rename_all = "camelCase")]
    Combinator {
        combinator: CombinatorKind,
        options: Vec<String>,
        selected: usize,
        selector_id: String,
        branch: Box<FieldDescriptor>,
    },
    #[serde(rename_all = "camelCase")]
    Array {
        fixed: bool,
        rows: Vec<ArrayRow>,
        can_add: bool,
        template: TemplateRef,
    },
    #[serde(rename_all = "camelCase")]
    Object {
        properties: Vec<FieldDescriptor>,
        can_expand: bool,
        template: TemplateRef,
    },
    Leaf {
        widget: Option<WidgetRef>,
        /// Text shown instead of the committed value (number inputs).
        #[serde(skip_serializing_if = "Option::is_none")]
        display: Option<String>,
        multiple: bool,
    },
    Unsupported { reason: String },
}

/// Render instruction for one node of the form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
    pub path: Vec<PathSegment>,
    /// The resolved schema of this node.
    pub schema: Value,
    pub ui_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub required: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub hidden: bool,
    pub autofocus: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub help: Option<String>,
    pub show_label: bool,
    /// Messages addressed to this node itself.
    pub raw_errors: Vec<String>,
    pub options: Map<String, Value>,
    pub field: FieldRef,
    pub field_template: TemplateRef,
    /// Whether the node is an additional property of its parent.
    pub additional: bool,
    pub variant: FieldVariant,
}

impl FieldDescriptor {
    /// This node and every node below it, depth first.
    pub fn descendants(&self) -> Vec<&FieldDescriptor> {
        let mut out = vec![self];
        match &self.variant {
            FieldVariant::Combinator { branch, .. } => out.extend(branch.descendants()),
            FieldVariant::Array { rows, .. } => {
                for row in rows {
                    out.extend(row.field.descendants());
                }
            }
            FieldVariant::Object { properties, .. } => {
                for property in properties {
                    out.extend(property.descendants());
                }
            }
            _ => {}
        }
        out
    }

    /// The node bound to `path`, looking through combinator selectors to
    /// the branch they render.
    pub fn find(&self, path: &[PathSegment]) -> Option<&FieldDescriptor> {
        self.descendants().into_iter().find(|node| {
            node.path == path && !matches!(node.variant, FieldVariant::Combinator { .. })
        })
    }

    /// The node with the given id.
    pub fn find_id(&self, id: &str) -> Option<&FieldDescriptor> {
        self.descendants().into_iter().find(|node| node.id == id)
    }
}

/// Where a node sits and what it inherits from its parents.
#[derive(Debug, Clone, Default)]
pub struct FieldContext {
    pub id: String,
    pub name: String,
    pub path: Vec<PathSegment>,
    pub required: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub additional: bool,
    /// Combinators already unwrapped at this node.
    pub depth: usize,
}

impl FieldContext {
    pub fn root(id_prefix: &str) -> Self {
        Self {
            id: id_prefix.to_string(),
            ..Self::default()
        }
    }

    fn child(&self, id: String, name: String, segment: PathSegment, required: bool) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self {
            id,
            name,
            path,
            required,
            disabled: self.disabled,
            readonly: self.readonly,
            additional: false,
            depth: 0,
        }
    }
}

/// Builds the descriptor tree for one render pass.
pub struct Dispatcher<'d, 'a> {
    resolver: &'d SchemaResolver<'a>,
    registry: &'d Registry,
    options: &'d FormOptions,
    state: &'d InstanceState,
    errors: &'d ErrorSchema,
    global_options: Map<String, Value>,
    visits: RefCell<Visits>,
}

impl<'d, 'a> Dispatcher<'d, 'a> {
    pub fn new(
        resolver: &'d SchemaResolver<'a>,
        registry: &'d Registry,
        options: &'d FormOptions,
        state: &'d InstanceState,
        errors: &'d ErrorSchema,
        root_ui: &Value,
    ) -> Self {
        Self {
            resolver,
            registry,
            options,
            state,
            errors,
            global_options: global_options(root_ui),
            visits: RefCell::new(Visits::default()),
        }
    }

    /// Dispatch the root schema.
    pub fn dispatch_root(
        &self,
        ui_schema: &Value,
        form_data: Option<&Value>,
    ) -> Result<FieldDescriptor, ResolveError> {
        let context = FieldContext::root(&self.options.id_prefix);
        self.dispatch(self.resolver.root(), ui_schema, form_data, context)
    }

    /// What this pass touched; hand it to [`InstanceState::finish_render`].
    pub fn into_visits(self) -> Visits {
        self.visits.into_inner()
    }

    /// Describe one node.
    ///
    /// # Errors
    ///
    /// Only reference errors from the resolver. Everything else becomes an
    /// unsupported node.
    pub fn dispatch(
        &self,
        schema: &Value,
        ui_schema: &Value,
        value: Option<&Value>,
        context: FieldContext,
    ) -> Result<FieldDescriptor, ResolveError> {
        let state_key = self.state.state_key(&context.path);
        self.visits.borrow_mut().nodes.insert(state_key.clone());

        let schema = self.resolver.retrieve(schema, value)?;
        let options = ui_options(ui_schema, &self.global_options);

        let disabled =
            context.disabled || self.options.disabled || option_bool(&options, "disabled", false);
        let readonly = context.readonly
            || self.options.readonly
            || option_bool(&options, "readonly", false)
            || schema.get("readOnly") == Some(&Value::Bool(true));
        let inherited = FieldContext {
            disabled,
            readonly,
            ..context
        };

        let (field, variant) =
            self.variant(&schema, ui_schema, &options, value, &inherited, &state_key)?;

        let (disabled, value) = match &variant {
            FieldVariant::Const { value } => (true, Some(value.clone())),
            _ => (disabled, value.cloned()),
        };
        let raw_errors = self
            .errors
            .at(&inherited.path)
            .map(|node| node.errors.clone())
            .unwrap_or_default();
        let field_template = self
            .registry
            .template_override(TemplateKind::FieldTemplate, option_str(&options, "FieldTemplate"));

        Ok(FieldDescriptor {
            title: resolve_title(&options, &schema, &inherited.name),
            description: resolve_description(&options, &schema),
            help: option_str(&options, "help").map(str::to_string),
            hidden: option_str(&options, "widget") == Some("hidden"),
            autofocus: option_bool(&options, "autofocus", false),
            show_label: option_bool(&options, "label", true),
            id: inherited.id,
            name: inherited.name,
            path: inherited.path,
            schema,
            ui_schema: ui_schema.clone(),
            value,
            required: inherited.required,
            disabled,
            readonly,
            raw_errors,
            options,
            field,
            field_template,
            additional: inherited.additional,
            variant,
        })
    }

    fn variant(
        &self,
        schema: &Value,
        ui_schema: &Value,
        options: &Map<String, Value>,
        value: Option<&Value>,
        context: &FieldContext,
        state_key: &StateKey,
    ) -> Result<(FieldRef, FieldVariant), ResolveError> {
        let mut forced: Option<&str> = None;
        if let Some(name) = option_str(options, "field") {
            match self.registry.field(name) {
                Some(Component::Custom(field)) => return Ok(custom(field)),
                Some(Component::Builtin(builtin)) => match forced_type(*builtin) {
                    Ok(ty) => forced = ty,
                    Err(()) => return Ok(self.unsupported("Unsupported field schema".to_string())),
                },
                None => {
                    return Ok(self.unsupported(format!("No field '{}' is registered", name)));
                }
            }
        }
        if let Some(Component::Custom(field)) = schema
            .get("$id")
            .and_then(Value::as_str)
            .and_then(|id| self.registry.field(id))
        {
            return Ok(custom(field));
        }

        let ty = forced.or_else(|| schema_type(schema));

        if let Some(constant) = schema.get("const") {
            return Ok((self.type_field(ty), FieldVariant::Const { value: constant.clone() }));
        }

        let widget = option_str(options, "widget");
        let boolean_choice = matches!(widget, Some("radio") | Some("select"));
        if (ty == Some("boolean") && boolean_choice) || (ty != Some("boolean") && is_select(schema)) {
            let widget_name = widget.unwrap_or("select");
            return Ok(match self.registry.widget(schema, widget_name) {
                Ok(widget) => (
                    self.type_field(ty),
                    FieldVariant::Select {
                        widget,
                        options: self.enum_options(schema, ui_schema, options)?,
                        multiple: false,
                    },
                ),
                Err(reason) => self.unsupported(reason),
            });
        }

        if forced.is_none() && !is_select(schema) {
            if let Some((kind, raw_options)) = alternatives(schema) {
                if !raw_options.is_empty() {
                    return self.combinator(schema, ui_schema, kind, raw_options, value, context, state_key);
                }
            }
        }

        match ty {
            Some("array") => self.array(schema, ui_schema, options, value, context),
            Some("object") => self.object(schema, ui_schema, options, value, context),
            Some(leaf @ ("string" | "number" | "integer" | "boolean" | "null")) => {
                Ok(self.leaf(leaf, schema, options, value, state_key))
            }
            other => Ok(self.unsupported(format!(
                "Unknown field type {}",
                other.unwrap_or("undefined")
            ))),
        }
    }

    fn unsupported(&self, reason: String) -> (FieldRef, FieldVariant) {
        warn!(%reason, "rendering unsupported field");
        (
            self.registry.builtin_field(BuiltinField::UnsupportedField),
            FieldVariant::Unsupported { reason },
        )
    }

    fn type_field(&self, ty: Option<&str>) -> FieldRef {
        let builtin = match ty {
            Some("string") => BuiltinField::StringField,
            Some("number") | Some("integer") => BuiltinField::NumberField,
            Some("boolean") => BuiltinField::BooleanField,
            Some("null") => BuiltinField::NullField,
            Some("object") => BuiltinField::ObjectField,
            Some("array") => BuiltinField::ArrayField,
            _ => BuiltinField::SchemaField,
        };
        self.registry.builtin_field(builtin)
    }

    fn enum_options(
        &self,
        schema: &Value,
        ui_schema: &Value,
        options: &Map<String, Value>,
    ) -> Result<Vec<EnumOption>, ResolveError> {
        let ui_names = options.get("enumNames").and_then(Value::as_array);
        let schema_names = schema.get("enumNames").and_then(Value::as_array);
        let label_at = |i: usize| {
            ui_names
                .and_then(|names| names.get(i))
                .or_else(|| schema_names.and_then(|names| names.get(i)))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let disabled: Vec<Value> = options
            .get("enumDisabled")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if let Some(values) = schema.get("enum").and_then(Value::as_array) {
            return Ok(values
                .iter()
                .enumerate()
                .map(|(i, value)| EnumOption {
                    label: label_at(i).unwrap_or_else(|| value_label(value)),
                    value: value.clone(),
                    disabled: disabled.contains(value),
                })
                .collect());
        }

        if let Some((kind, _)) = alternatives(schema) {
            let resolved = resolved_alternatives(self.resolver, schema, None)?;
            return Ok(resolved
                .iter()
                .enumerate()
                .filter_map(|(i, option)| {
                    let value = to_constant(option)?;
                    let label = option_ui(ui_schema, kind, i)
                        .get("ui:title")
                        .or_else(|| option.get("title"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| value_label(&value));
                    Some(EnumOption {
                        label,
                        disabled: disabled.contains(&value),
                        value,
                    })
                })
                .collect());
        }

        if schema_type(schema) == Some("boolean") {
            return Ok([(true, "Yes"), (false, "No")]
                .iter()
                .enumerate()
                .map(|(i, (value, fallback))| EnumOption {
                    label: label_at(i).unwrap_or_else(|| fallback.to_string()),
                    value: Value::Bool(*value),
                    disabled: false,
                })
                .collect());
        }
        Ok(Vec::new())
    }

    #[allow(clippy::too_many_arguments)]
    fn combinator(
        &self,
        schema: &Value,
        ui_schema: &Value,
        kind: CombinatorKind,
        raw_options: &[Value],
        value: Option<&Value>,
        context: &FieldContext,
        state_key: &StateKey,
    ) -> Result<(FieldRef, FieldVariant), ResolveError> {
        let resolved = resolved_alternatives(self.resolver, schema, value)?;
        let key = (state_key.clone(), context.depth);
        let selected = match self.state.selection(&key) {
            Some(index) if index < resolved.len() => index,
            _ => {
                let index = self.resolver.closest_option(value, raw_options, None)?;
                debug!(id = %context.id, index, "first selection of {}", kind.keyword());
                index
            }
        };
        self.visits.borrow_mut().selections.push((key, selected));

        let labels = resolved
            .iter()
            .enumerate()
            .map(|(i, option)| {
                option_ui(ui_schema, kind, i)
                    .get("ui:title")
                    .or_else(|| option.get("title"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Option {}", i + 1))
            })
            .collect();

        let branch_schema = branch_schema(schema, kind, &resolved[selected]);
        let branch_ui = branch_ui(ui_schema, kind, selected);
        let branch_context = FieldContext {
            depth: context.depth + 1,
            ..context.clone()
        };
        let branch = self.dispatch(&branch_schema, &branch_ui, value, branch_context)?;

        let field = match kind {
            CombinatorKind::AnyOf => BuiltinField::AnyOfField,
            CombinatorKind::OneOf => BuiltinField::OneOfField,
        };
        Ok((
            self.registry.builtin_field(field),
            FieldVariant::Combinator {
                combinator: kind,
                options: labels,
                selected,
                selector_id: format!("{}__{}_select", context.id, kind.keyword().to_lowercase()),
                branch: Box::new(branch),
            },
        ))
    }

    fn array(
        &self,
        schema: &Value,
        ui_schema: &Value,
        options: &Map<String, Value>,
        value: Option<&Value>,
        context: &FieldContext,
    ) -> Result<(FieldRef, FieldVariant), ResolveError> {
        let field = self.registry.builtin_field(BuiltinField::ArrayField);
        let Some(items_schema) = schema.get("items") else {
            return Ok(self.unsupported("Missing items definition".to_string()));
        };
        let widget = option_str(options, "widget");

        if self.resolver.is_multi_select(schema)? {
            let item = self.resolver.resolve(items_schema, None)?;
            return Ok(match self.registry.widget(schema, widget.unwrap_or("select")) {
                Ok(widget) => (
                    field,
                    FieldVariant::Select {
                        widget,
                        options: self.enum_options(&item, &item_ui(ui_schema, 0, false), options)?,
                        multiple: true,
                    },
                ),
                Err(reason) => self.unsupported(reason),
            });
        }

        let data_url_items = items_schema.is_object()
            && self.resolver.resolve(items_schema, None)?.get("format") == Some(&json!("data-url"));
        if widget == Some("files") || data_url_items {
            return Ok(match self.registry.widget(schema, "files") {
                Ok(widget) => (
                    field,
                    FieldVariant::Leaf {
                        widget: Some(widget),
                        display: None,
                        multiple: true,
                    },
                ),
                Err(reason) => self.unsupported(reason),
            });
        }

        let items: &[Value] = match value {
            Some(Value::Array(items)) => items,
            _ => &[],
        };
        let fixed = is_fixed_items(schema);
        let tuple_len = if fixed {
            items_schema.as_array().map(Vec::len).unwrap_or(0)
        } else {
            0
        };
        let row_count = items.len().max(tuple_len);

        let array_key = self.state.state_key(&context.path);
        self.visits
            .borrow_mut()
            .arrays
            .push((array_key.clone(), items.len()));

        let editable = !context.disabled && !context.readonly;
        let orderable = option_bool(options, "orderable", true);
        let removable = option_bool(options, "removable", true);
        let copyable = option_bool(options, "copyable", false);
        let under_max = schema
            .get("maxItems")
            .and_then(Value::as_u64)
            .map(|max| (items.len() as u64) < max)
            .unwrap_or(true);
        let can_add = editable
            && option_bool(options, "addable", true)
            && under_max
            && (!fixed || schema.get("additionalItems").map(Value::is_object).unwrap_or(false));

        let mut rows = Vec::with_capacity(row_count);
        for index in 0..row_count {
            let additional = fixed && index >= tuple_len;
            let item_schema = array_item_schema(schema, Some(index));
            let name = if context.name.is_empty() {
                String::new()
            } else {
                format!("{}-{}", context.name, index)
            };
            let row_context = context.child(
                child_id(&context.id, &self.options.id_separator, &index.to_string()),
                name,
                PathSegment::Index(index),
                item_required(&item_schema),
            );
            let row_ui = item_ui(ui_schema, index, additional);
            let row_field = self.dispatch(&item_schema, &row_ui, items.get(index), row_context)?;

            let (can_remove, can_move_up, can_move_down) = if fixed {
                (
                    additional,
                    additional && index > tuple_len,
                    additional && index + 1 < row_count,
                )
            } else {
                (true, index > 0, index + 1 < row_count)
            };
            rows.push(ArrayRow {
                key: self.state.row_key(&array_key, index),
                index,
                field: row_field,
                can_remove: editable && removable && can_remove,
                can_move_up: editable && orderable && can_move_up,
                can_move_down: editable && orderable && can_move_down,
                can_copy: copyable && can_add,
            });
        }

        let template = self.registry.template_override(
            TemplateKind::ArrayFieldTemplate,
            option_str(options, "ArrayFieldTemplate"),
        );
        Ok((
            field,
            FieldVariant::Array {
                fixed,
                rows,
                can_add,
                template,
            },
        ))
    }

    fn object(
        &self,
        schema: &Value,
        ui_schema: &Value,
        options: &Map<String, Value>,
        value: Option<&Value>,
        context: &FieldContext,
    ) -> Result<(FieldRef, FieldVariant), ResolveError> {
        let empty = Map::new();
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let names: Vec<String> = properties.keys().cloned().collect();

        let ordered = match options.get("order").and_then(Value::as_array) {
            Some(order) => {
                let order: Vec<String> = order
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                match order_properties(&names, &order) {
                    Ok(ordered) => ordered,
                    Err(message) => {
                        let name = if context.name.is_empty() {
                            "root"
                        } else {
                            context.name.as_str()
                        };
                        return Ok(self.unsupported(format!(
                            "Invalid {} object field configuration: {}",
                            name, message
                        )));
                    }
                }
            }
            None => names,
        };

        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut fields = Vec::with_capacity(ordered.len());
        for name in ordered {
            let Some(property) = properties.get(&name) else {
                continue;
            };
            let additional = property.get(ADDITIONAL_PROPERTY_FLAG) == Some(&Value::Bool(true));
            let property_ui = if additional {
                ui_schema
                    .get("additionalProperties")
                    .cloned()
                    .unwrap_or(Value::Null)
            } else {
                child_ui(ui_schema, &name)
            };
            let mut child_context = context.child(
                child_id(&context.id, &self.options.id_separator, &name),
                name.clone(),
                PathSegment::Key(name.clone()),
                required.contains(&name.as_str()),
            );
            child_context.additional = additional;
            let child_value = value.and_then(|v| v.get(&name));
            fields.push(self.dispatch(property, &property_ui, child_value, child_context)?);
        }

        let allows_additional = !matches!(
            schema.get("additionalProperties"),
            None | Some(Value::Bool(false))
        );
        let under_max = schema
            .get("maxProperties")
            .and_then(Value::as_u64)
            .map(|max| {
                let present = value.and_then(Value::as_object).map(Map::len).unwrap_or(0);
                (present as u64) < max
            })
            .unwrap_or(true);
        let can_expand = allows_additional
            && option_bool(options, "expandable", true)
            && under_max
            && !context.disabled
            && !context.readonly;

        let template = self.registry.template_override(
            TemplateKind::ObjectFieldTemplate,
            option_str(options, "ObjectFieldTemplate"),
        );
        Ok((
            self.registry.builtin_field(BuiltinField::ObjectField),
            FieldVariant::Object {
                properties: fields,
                can_expand,
                template,
            },
        ))
    }

    fn leaf(
        &self,
        ty: &str,
        schema: &Value,
        options: &Map<String, Value>,
        value: Option<&Value>,
        state_key: &StateKey,
    ) -> (FieldRef, FieldVariant) {
        let field = self.type_field(Some(ty));
        if ty == "null" {
            return (
                field,
                FieldVariant::Leaf {
                    widget: None,
                    display: None,
                    multiple: false,
                },
            );
        }

        let widget_name = match option_str(options, "widget") {
            Some(widget) => widget,
            None => match ty {
                "string" => schema
                    .get("format")
                    .and_then(Value::as_str)
                    .filter(|format| self.registry.has_widget(schema, format))
                    .unwrap_or("text"),
                "boolean" => "checkbox",
                _ => "text",
            },
        };
        match self.registry.widget(schema, widget_name) {
            Ok(widget) => {
                let display = if matches!(ty, "number" | "integer") {
                    NumberInput::display(self.state.number_text(state_key), value)
                } else {
                    None
                };
                (
                    field,
                    FieldVariant::Leaf {
                        widget: Some(widget),
                        display,
                        multiple: false,
                    },
                )
            }
            Err(reason) => self.unsupported(reason),
        }
    }
}

fn custom(field: &str) -> (FieldRef, FieldVariant) {
    (
        Component::Custom(field.to_string()),
        FieldVariant::Custom {
            field: field.to_string(),
        },
    )
}

/// The type a built-in field forces onto a node. `Ok(None)` keeps normal
/// dispatch; `Err` marks the unsupported placeholder.
fn forced_type(field: BuiltinField) -> Result<Option<&'static str>, ()> {
    Ok(match field {
        BuiltinField::StringField => Some("string"),
        BuiltinField::NumberField => Some("number"),
        BuiltinField::BooleanField => Some("boolean"),
        BuiltinField::NullField => Some("null"),
        BuiltinField::ObjectField => Some("object"),
        BuiltinField::ArrayField => Some("array"),
        BuiltinField::UnsupportedField => return Err(()),
        BuiltinField::SchemaField | BuiltinField::AnyOfField | BuiltinField::OneOfField => None,
    })
}

/// Rows are required unless their schema admits `null`.
fn item_required(item_schema: &Value) -> bool {
    match item_schema.get("type") {
        Some(Value::Array(types)) => !types.iter().any(|t| t == "null"),
        Some(t) => t != "null",
        None => true,
    }
}

fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Unwrap every combinator at a node, following remembered selections
/// (closest option otherwise).
pub fn expand_branches(
    resolver: &SchemaResolver<'_>,
    state: &InstanceState,
    schema: &Value,
    value: Option<&Value>,
    state_key: &StateKey,
) -> Result<Value, ResolveError> {
    let mut schema = resolver.retrieve(schema, value)?;
    let mut depth = 0;
    while let Some((kind, options)) = alternatives(&schema) {
        if options.is_empty() || is_select(&schema) {
            break;
        }
        let selected = match state.selection(&(state_key.clone(), depth)) {
            Some(index) if index < options.len() => index,
            _ => resolver.closest_option(value, options, None)?,
        };
        let option = resolver.resolve(&options[selected], value)?;
        schema = resolver.retrieve(&branch_schema(&schema, kind, &option), value)?;
        depth += 1;
    }
    Ok(schema)
}

/// The resolved schema of the node bound to `path`, before its own
/// combinators are unwrapped. Combinators of its ancestors are followed.
pub fn schema_at(
    resolver: &SchemaResolver<'_>,
    state: &InstanceState,
    form_data: Option<&Value>,
    path: &[PathSegment],
) -> Result<Value, ResolveError> {
    let mut schema = resolver.retrieve(resolver.root(), form_data)?;
    for (depth, segment) in path.iter().enumerate() {
        let parent_path = &path[..depth];
        let parent = expand_branches(
            resolver,
            state,
            &schema,
            value_at(form_data, parent_path),
            &state.state_key(parent_path),
        )?;
        let child = match segment {
            PathSegment::Index(index) => array_item_schema(&parent, Some(*index)),
            PathSegment::Key(key) => match parent.get("properties").and_then(|p| p.get(key)) {
                Some(property) => property.clone(),
                None => match parent.get("additionalProperties") {
                    Some(additional @ Value::Object(_)) => additional.clone(),
                    _ => json!({}),
                },
            },
        };
        schema = resolver.retrieve(&child, value_at(form_data, &path[..=depth]))?;
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BuiltinWidget, RegistryOverrides};
    use crate::validator::JsonSchemaValidator;

    struct Fixture {
        schema: Value,
        ui: Value,
        options: FormOptions,
        state: InstanceState,
        errors: ErrorSchema,
    }

    impl Fixture {
        fn new(schema: Value) -> Self {
            Self {
                schema,
                ui: Value::Null,
                options: FormOptions::default(),
                state: InstanceState::new(),
                errors: ErrorSchema::new(),
            }
        }

        fn ui(mut self, ui: Value) -> Self {
            self.ui = ui;
            self
        }

        fn render(&self, data: Option<&Value>) -> FieldDescriptor {
            let validator = JsonSchemaValidator;
            let resolver = SchemaResolver::new(&self.schema, &validator);
            let registry = Registry::new(
                self.schema.clone(),
                &self.options.registry,
                Value::Null,
            );
            let dispatcher = Dispatcher::new(
                &resolver,
                &registry,
                &self.options,
                &self.state,
                &self.errors,
                &self.ui,
            );
            dispatcher.dispatch_root(&self.ui, data).unwrap()
        }
    }

    fn reason(node: &FieldDescriptor) -> &str {
        match &node.variant {
            FieldVariant::Unsupported { reason } => reason,
            other => panic!("expected unsupported, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_and_missing_items_are_unsupported() {
        let root = Fixture::new(json!({
            "type": "object",
            "properties": {
                "weird": { "type": "date" },
                "untyped": {},
                "list": { "type": "array" }
            }
        }))
        .render(None);
        assert_eq!(reason(root.find(&["weird".into()]).unwrap()), "Unknown field type date");
        assert_eq!(
            reason(root.find(&["untyped".into()]).unwrap()),
            "Unknown field type undefined"
        );
        assert_eq!(
            reason(root.find(&["list".into()]).unwrap()),
            "Missing items definition"
        );
    }

    #[test]
    fn const_is_disabled_and_prefilled() {
        let root = Fixture::new(json!({
            "type": "object",
            "properties": { "version": { "const": 2 } }
        }))
        .render(Some(&json!({})));
        let version = root.find(&["version".into()]).unwrap();
        assert!(version.disabled);
        assert_eq!(version.value, Some(json!(2)));
        assert!(matches!(version.variant, FieldVariant::Const { .. }));
    }

    #[test]
    fn enum_select_labels() {
        let root = Fixture::new(json!({
            "type": "string",
            "enum": ["a", "b", "c"],
            "enumNames": ["Schema A", "Schema B"]
        }))
        .ui(json!({ "ui:enumNames": ["Ui A"], "ui:enumDisabled": ["c"], "ui:widget": "radio" }))
        .render(None);
        let FieldVariant::Select { widget, options, multiple } = &root.variant else {
            panic!("expected select");
        };
        assert_eq!(widget, &Component::Builtin(BuiltinWidget::RadioWidget));
        assert!(!multiple);
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Ui A", "Schema B", "c"]);
        assert!(options[2].disabled);
    }

    #[test]
    fn constant_alternatives_render_as_select() {
        let root = Fixture::new(json!({
            "type": "number",
            "oneOf": [{ "const": 1, "title": "One" }, { "const": 2 }]
        }))
        .render(None);
        let FieldVariant::Select { options, .. } = &root.variant else {
            panic!("expected select");
        };
        assert_eq!(options[0].label, "One");
        assert_eq!(options[1].label, "2");
        assert_eq!(options[1].value, json!(2));
    }

    #[test]
    fn boolean_widgets() {
        let checkbox = Fixture::new(json!({ "type": "boolean" })).render(None);
        assert!(matches!(
            checkbox.variant,
            FieldVariant::Leaf { widget: Some(Component::Builtin(BuiltinWidget::CheckboxWidget)), .. }
        ));

        let radio = Fixture::new(json!({ "type": "boolean" }))
            .ui(json!({ "ui:widget": "radio" }))
            .render(None);
        let FieldVariant::Select { options, .. } = &radio.variant else {
            panic!("expected select");
        };
        assert_eq!(options[0].label, "Yes");
        assert_eq!(options[1].value, json!(false));
    }

    #[test]
    fn string_format_and_unknown_widget() {
        let root = Fixture::new(json!({
            "type": "object",
            "properties": {
                "mail": { "type": "string", "format": "email" },
                "odd": { "type": "string", "format": "ipv9" },
                "flag": { "type": "boolean" }
            }
        }))
        .ui(json!({ "flag": { "ui:widget": "textarea" } }))
        .render(None);
        assert!(matches!(
            root.find(&["mail".into()]).unwrap().variant,
            FieldVariant::Leaf { widget: Some(Component::Builtin(BuiltinWidget::EmailWidget)), .. }
        ));
        assert!(matches!(
            root.find(&["odd".into()]).unwrap().variant,
            FieldVariant::Leaf { widget: Some(Component::Builtin(BuiltinWidget::TextWidget)), .. }
        ));
        assert_eq!(
            reason(root.find(&["flag".into()]).unwrap()),
            "No widget 'textarea' for type 'boolean'"
        );
    }

    #[test]
    fn object_order_and_configuration_errors() {
        let schema = json!({
            "type": "object",
            "properties": { "a": {"type": "string"}, "b": {"type": "string"}, "c": {"type": "string"} }
        });
        let root = Fixture::new(schema.clone())
            .ui(json!({ "ui:order": ["c", "*"] }))
            .render(None);
        let FieldVariant::Object { properties, .. } = &root.variant else {
            panic!("expected object");
        };
        let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!(properties[0].id, "root_c");

        let root = Fixture::new(schema).ui(json!({ "ui:order": ["a"] })).render(None);
        assert_eq!(
            reason(&root),
            "Invalid root object field configuration: uiSchema order list does not contain properties 'b', 'c'"
        );
    }

    #[test]
    fn titles_errors_and_inherited_flags() {
        let mut fixture = Fixture::new(json!({
            "type": "object",
            "title": "Root",
            "properties": {
                "name": { "type": "string", "title": "Schema title" },
                "locked": { "type": "object", "readOnly": true, "properties": { "inner": { "type": "string" } } }
            },
            "required": ["name"]
        }))
        .ui(json!({ "name": { "ui:title": "Ui title", "ui:help": "Help" } }));
        fixture.errors.entry(&["name".into()]).add_error("is a required property");
        let root = fixture.render(None);

        let name = root.find(&["name".into()]).unwrap();
        assert_eq!(name.title.as_deref(), Some("Ui title"));
        assert_eq!(name.help.as_deref(), Some("Help"));
        assert!(name.required);
        assert_eq!(name.raw_errors, vec!["is a required property"]);

        let inner = root.find(&["locked".into(), "inner".into()]).unwrap();
        assert!(inner.readonly);
        assert_eq!(inner.id, "root_locked_inner");
        assert!(!inner.required);
    }

    #[test]
    fn array_rows_and_capabilities() {
        let root = Fixture::new(json!({
            "type": "array",
            "maxItems": 3,
            "items": { "type": "string" }
        }))
        .render(Some(&json!(["a", "b", "c"])));
        let FieldVariant::Array { rows, can_add, fixed, .. } = &root.variant else {
            panic!("expected array");
        };
        assert!(!fixed);
        assert!(!can_add);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].field.id, "root_1");
        assert!(!rows[0].can_move_up && rows[0].can_move_down);
        assert!(rows[2].can_move_up && !rows[2].can_move_down);
        assert!(rows.iter().all(|r| r.can_remove && !r.can_copy));
        assert!(rows.iter().all(|r| r.key.is_none()));
    }

    #[test]
    fn fixed_tuple_rows() {
        let root = Fixture::new(json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "number" }],
            "additionalItems": { "type": "boolean" }
        }))
        .render(Some(&json!(["x"])));
        let FieldVariant::Array { rows, can_add, fixed, .. } = &root.variant else {
            panic!("expected array");
        };
        assert!(fixed);
        assert!(can_add);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].can_remove && !rows[1].can_move_up);
        assert_eq!(rows[1].field.value, None);
        assert_eq!(rows[1].field.schema["type"], "number");
    }

    #[test]
    fn multiselect_and_files() {
        let root = Fixture::new(json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "uniqueItems": true, "items": { "enum": ["x", "y"] } },
                "uploads": { "type": "array", "items": { "type": "string", "format": "data-url" } }
            }
        }))
        .ui(json!({ "tags": { "ui:widget": "checkboxes" } }))
        .render(None);
        assert!(matches!(
            root.find(&["tags".into()]).unwrap().variant,
            FieldVariant::Select { multiple: true, widget: Component::Builtin(BuiltinWidget::CheckboxesWidget), .. }
        ));
        assert!(matches!(
            root.find(&["uploads".into()]).unwrap().variant,
            FieldVariant::Leaf { multiple: true, widget: Some(Component::Builtin(BuiltinWidget::FileWidget)), .. }
        ));
    }

    #[test]
    fn combinator_picks_closest_option() {
        let root = Fixture::new(json!({
            "type": "object",
            "oneOf": [
                { "title": "Cat", "properties": { "meows": { "type": "boolean" } }, "required": ["meows"] },
                { "properties": { "barks": { "type": "boolean" } }, "required": ["barks"] }
            ]
        }))
        .render(Some(&json!({ "barks": true })));
        let FieldVariant::Combinator { options, selected, selector_id, branch, .. } = &root.variant else {
            panic!("expected combinator");
        };
        assert_eq!(options, &vec!["Cat".to_string(), "Option 2".to_string()]);
        assert_eq!(*selected, 1);
        assert_eq!(selector_id, "root__oneof_select");
        assert!(branch.find(&["barks".into()]).is_some());
        assert!(root.find(&["meows".into()]).is_none());
    }

    #[test]
    fn custom_fields_and_unknown_field_names() {
        let mut fixture = Fixture::new(json!({
            "type": "object",
            "properties": {
                "geo": { "type": "object" },
                "tagged": { "$id": "tagged-field", "type": "string" },
                "missing": { "type": "string" }
            }
        }))
        .ui(json!({ "geo": { "ui:field": "geo" }, "missing": { "ui:field": "nope" } }));
        fixture.options.registry = RegistryOverrides::default();
        fixture.options.registry.fields.insert("geo".into(), "GeoField".into());
        fixture.options.registry.fields.insert("tagged-field".into(), "Tagged".into());
        let root = fixture.render(None);

        assert_eq!(
            root.find(&["geo".into()]).unwrap().variant,
            FieldVariant::Custom { field: "GeoField".into() }
        );
        assert_eq!(
            root.find(&["tagged".into()]).unwrap().field,
            Component::Custom("Tagged".into())
        );
        assert_eq!(
            reason(root.find(&["missing".into()]).unwrap()),
            "No field 'nope' is registered"
        );
    }

    #[test]
    fn additional_properties_are_flagged_and_expandable() {
        let root = Fixture::new(json!({
            "type": "object",
            "properties": { "fixed": { "type": "string" } },
            "additionalProperties": { "type": "number" },
            "maxProperties": 3
        }))
        .ui(json!({ "additionalProperties": { "ui:widget": "updown" } }))
        .render(Some(&json!({ "fixed": "x", "extra": 1 })));
        let FieldVariant::Object { can_expand, .. } = &root.variant else {
            panic!("expected object");
        };
        assert!(can_expand);
        let extra = root.find(&["extra".into()]).unwrap();
        assert!(extra.additional);
        assert!(matches!(
            extra.variant,
            FieldVariant::Leaf { widget: Some(Component::Builtin(BuiltinWidget::UpDownWidget)), .. }
        ));
    }

    #[test]
    fn schema_at_follows_rows_and_branches() {
        let schema = json!({
            "type": "object",
            "properties": {
                "pets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "oneOf": [
                            { "properties": { "meows": { "type": "boolean" } }, "required": ["meows"] },
                            { "properties": { "barks": { "type": "boolean", "title": "Barks" } }, "required": ["barks"] }
                        ]
                    }
                }
            }
        });
        let validator = JsonSchemaValidator;
        let resolver = SchemaResolver::new(&schema, &validator);
        let state = InstanceState::new();
        let data = json!({ "pets": [{ "barks": true }] });
        let node = schema_at(
            &resolver,
            &state,
            Some(&data),
            &["pets".into(), 0.into(), "barks".into()],
        )
        .unwrap();
        assert_eq!(node["title"], "Barks");
    }
}
