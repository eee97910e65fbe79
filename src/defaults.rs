//! Default values: computing them from a schema and merging caller data
//! over them.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ResolveError;
use crate::merge::{branch_schema, merge_objects};
use crate::resolver::{array_item_schema, SchemaResolver};
use crate::types::{
    alternatives, is_fixed_items, schema_type, to_constant, ArrayMinItems, DefaultsBehavior,
    EmptyObjectFields,
};

/// Computes defaults for one schema document.
pub struct DefaultsComputer<'r, 'a> {
    resolver: &'r SchemaResolver<'a>,
    behavior: DefaultsBehavior,
}

/// Per-node inputs of the computation.
#[derive(Clone, Copy, Default)]
struct Node<'v> {
    parent_default: Option<&'v Value>,
    raw: Option<&'v Value>,
    /// `None` at the root, where nothing requires the node.
    required: Option<bool>,
}

impl<'r, 'a> DefaultsComputer<'r, 'a> {
    pub fn new(resolver: &'r SchemaResolver<'a>, behavior: DefaultsBehavior) -> Self {
        Self { resolver, behavior }
    }

    /// The default value of `schema`, given the data already present.
    /// `None` means the schema has no default.
    pub fn compute(&self, schema: &Value, form_data: Option<&Value>) -> Result<Option<Value>, ResolveError> {
        let node = Node {
            raw: form_data,
            ..Node::default()
        };
        self.compute_node(schema, node, &mut Vec::new())
    }

    fn compute_node(
        &self,
        schema: &Value,
        node: Node<'_>,
        recursion: &mut Vec<String>,
    ) -> Result<Option<Value>, ResolveError> {
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            if recursion.iter().any(|r| r == reference) {
                debug!(reference, "stopping default computation at recursive reference");
                return Ok(node.parent_default.cloned());
            }
            let mut target = self.resolver.find_definition(reference)?;
            if let (Value::Object(target_map), Value::Object(siblings)) = (&mut target, schema) {
                for (key, value) in siblings {
                    if key != "$ref" {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
            recursion.push(reference.to_string());
            let computed = self.compute_node(&target, node, recursion);
            recursion.pop();
            return computed;
        }

        if ["allOf", "if", "dependencies"]
            .iter()
            .any(|key| schema.get(*key).is_some())
        {
            let resolved = self.resolver.resolve(schema, node.raw)?;
            return self.compute_node(&resolved, node, recursion);
        }

        if let Some(constant) = to_constant(schema) {
            return Ok(Some(constant));
        }

        let mut defaults = match (node.parent_default, schema.get("default")) {
            (Some(parent @ Value::Object(_)), Some(own @ Value::Object(_))) => {
                Some(merge_objects(parent, own, false))
            }
            (_, Some(own)) => Some(own.clone()),
            (parent, None) => parent.cloned(),
        };

        if schema.get("default").is_none() {
            if is_fixed_items(schema) {
                defaults = Some(self.tuple_defaults(schema, node, defaults.as_ref(), recursion)?);
            } else if let Some((kind, options)) = alternatives(schema) {
                let index = self.resolver.closest_option(node.raw, options, None)?;
                if let Some(option) = options.get(index) {
                    let branch = branch_schema(schema, kind, &self.resolver.resolve(option, node.raw)?);
                    let branch_node = Node {
                        parent_default: defaults.as_ref(),
                        ..node
                    };
                    return self.compute_node(&branch, branch_node, recursion);
                }
            }
        }

        match schema_type(schema) {
            Some("object") => self
                .object_defaults(schema, node, defaults.as_ref(), recursion)
                .map(Some),
            Some("array") => self.array_defaults(schema, node, defaults, recursion),
            _ => Ok(defaults),
        }
    }

    fn tuple_defaults(
        &self,
        schema: &Value,
        node: Node<'_>,
        defaults: Option<&Value>,
        recursion: &mut Vec<String>,
    ) -> Result<Value, ResolveError> {
        let items = schema.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let item_node = Node {
                parent_default: defaults.and_then(|d| d.get(i)),
                raw: node.raw.and_then(|r| r.get(i)),
                required: node.required,
            };
            out.push(self.compute_node(item, item_node, recursion)?.unwrap_or(Value::Null));
        }
        Ok(Value::Array(out))
    }

    fn object_defaults(
        &self,
        schema: &Value,
        node: Node<'_>,
        defaults: Option<&Value>,
        recursion: &mut Vec<String>,
    ) -> Result<Value, ResolveError> {
        let retrieved = self.resolver.resolve(schema, node.raw)?;
        let required: Vec<&str> = retrieved
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut out = Map::new();
        let properties = retrieved.get("properties").and_then(Value::as_object);
        for (key, property) in properties.into_iter().flatten() {
            let child = Node {
                parent_default: defaults.and_then(|d| d.get(key)),
                raw: node.raw.and_then(|r| r.get(key)),
                required: Some(required.contains(&key.as_str())),
            };
            let computed = self.compute_node(property, child, recursion)?;
            let is_const = property.get("const").is_some();
            self.maybe_add(&mut out, key, computed, node.required, &required, is_const);
        }

        let additional = match retrieved.get("additionalProperties") {
            None | Some(Value::Bool(false)) => return Ok(Value::Object(out)),
            Some(schema @ Value::Object(_)) => schema.clone(),
            Some(_) => Value::Object(Map::new()),
        };
        let declared = |key: &String| properties.map(|p| p.contains_key(key)).unwrap_or(false);
        let mut keys: Vec<String> = Vec::new();
        for key in defaults.and_then(Value::as_object).into_iter().flat_map(Map::keys) {
            if !declared(key) && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        let mut data_keys: Vec<&str> = Vec::new();
        for key in node.raw.and_then(Value::as_object).into_iter().flat_map(Map::keys) {
            if !declared(key) {
                data_keys.push(key);
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        for key in &keys {
            let child = Node {
                parent_default: defaults.and_then(|d| d.get(key)),
                raw: node.raw.and_then(|r| r.get(key)),
                required: Some(required.contains(&key.as_str())),
            };
            let computed = self.compute_node(&additional, child, recursion)?;
            self.maybe_add(&mut out, key, computed, node.required, &data_keys, false);
        }
        Ok(Value::Object(out))
    }

    /// Decide whether a computed property default is written into its object.
    fn maybe_add(
        &self,
        out: &mut Map<String, Value>,
        key: &str,
        computed: Option<Value>,
        parent_required: Option<bool>,
        required: &[&str],
        is_const: bool,
    ) {
        let Some(computed) = computed else {
            return;
        };
        if is_const {
            out.insert(key.to_string(), computed);
            return;
        }
        let mode = self.behavior.empty_object_fields;
        if mode == EmptyObjectFields::SkipDefaults {
            return;
        }
        let self_required = required.contains(&key);
        let self_or_parent = parent_required.unwrap_or(self_required);
        let keep = match &computed {
            Value::Object(map) => {
                (!map.is_empty() || self_required)
                    && (self_or_parent || mode != EmptyObjectFields::PopulateRequiredDefaults)
            }
            _ => mode == EmptyObjectFields::PopulateAllDefaults || (self_or_parent && self_required),
        };
        if keep {
            out.insert(key.to_string(), computed);
        }
    }

    fn array_defaults(
        &self,
        schema: &Value,
        node: Node<'_>,
        mut defaults: Option<Value>,
        recursion: &mut Vec<String>,
    ) -> Result<Option<Value>, ResolveError> {
        let populate = self.behavior.array_min_items;

        if let Some(Value::Array(items)) = &defaults {
            let mut computed = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_node = Node {
                    parent_default: Some(item),
                    raw: None,
                    required: node.required,
                };
                let item_schema = array_item_schema(schema, Some(i));
                computed.push(self.compute_node(&item_schema, item_node, recursion)?.unwrap_or(Value::Null));
            }
            defaults = Some(Value::Array(computed));
        }

        if let Some(Value::Array(raw)) = node.raw {
            if populate == ArrayMinItems::Never {
                defaults = Some(Value::Array(raw.clone()));
            } else {
                let mut computed = Vec::with_capacity(raw.len());
                for (i, item) in raw.iter().enumerate() {
                    let item_node = Node {
                        parent_default: defaults.as_ref().and_then(|d| d.get(i)),
                        raw: Some(item),
                        required: node.required,
                    };
                    let item_schema = array_item_schema(schema, Some(i));
                    let item = self.compute_node(&item_schema, item_node, recursion)?;
                    computed.push(item.unwrap_or(Value::Null));
                }
                defaults = Some(Value::Array(computed));
            }
        }

        let empty = Value::Array(Vec::new());
        match populate {
            ArrayMinItems::Never => return Ok(Some(defaults.unwrap_or(empty))),
            ArrayMinItems::RequiredOnly if node.required != Some(true) => return Ok(defaults),
            _ => {}
        }

        let current_len = defaults.as_ref().and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        let min_items = schema.get("minItems").and_then(Value::as_u64).unwrap_or(0) as usize;
        if min_items == 0 || current_len >= min_items || self.resolver.is_multi_select(schema)? {
            return Ok(Some(defaults.unwrap_or(empty)));
        }

        let filler_schema = array_item_schema(schema, None);
        let filler_node = Node {
            parent_default: filler_schema.get("default"),
            raw: None,
            required: node.required,
        };
        let filler = self
            .compute_node(&filler_schema, filler_node, recursion)?
            .unwrap_or(Value::Null);
        let mut entries = match defaults {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        entries.resize(min_items, filler);
        Ok(Some(Value::Array(entries)))
    }
}

/// Defaults of `schema` without caller data merged in.
pub fn compute_defaults(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    form_data: Option<&Value>,
    behavior: DefaultsBehavior,
) -> Result<Option<Value>, ResolveError> {
    DefaultsComputer::new(resolver, behavior).compute(schema, form_data)
}

/// The initial value of a form: defaults with the caller's data on top.
pub fn default_form_state(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    form_data: Option<&Value>,
    behavior: DefaultsBehavior,
) -> Result<Option<Value>, ResolveError> {
    let resolved = resolver.resolve(schema, form_data)?;
    let defaults = compute_defaults(resolver, &resolved, form_data, behavior)?;
    match form_data {
        None | Some(Value::Null) => Ok(defaults),
        Some(data @ (Value::Object(_) | Value::Array(_))) => {
            Ok(Some(merge_defaults_with_form_data(defaults.as_ref(), data)))
        }
        Some(data) => Ok(Some(data.clone())),
    }
}

/// Lay `form_data` over `defaults`. Object keys from the data recurse into
/// the defaults, arrays merge by position and keep the data's length, and
/// scalars in the data win.
pub fn merge_defaults_with_form_data(defaults: Option<&Value>, form_data: &Value) -> Value {
    match form_data {
        Value::Array(items) => {
            let default_items = defaults.and_then(Value::as_array);
            Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        match default_items.and_then(|d| d.get(i)).filter(|d| !d.is_null()) {
                            Some(default) => merge_defaults_with_form_data(Some(default), item),
                            None => item.clone(),
                        }
                    })
                    .collect(),
            )
        }
        Value::Object(map) => {
            let mut merged = match defaults {
                Some(Value::Object(d)) => d.clone(),
                _ => Map::new(),
            };
            for (key, value) in map {
                let default = defaults.and_then(|d| d.get(key));
                merged.insert(key.clone(), merge_defaults_with_form_data(default, value));
            }
            Value::Object(merged)
        }
        other => other.clone(),
    }
}
