//! Id and path schemas, and trimming data to what the form binds.

use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::resolver::{array_item_schema, SchemaResolver};
use crate::types::{alternatives, schema_type, ID_KEY, NAME_KEY, PATH_ADDITIONAL_FLAG};

/// How ids are spelled.
#[derive(Debug, Clone, Copy)]
pub struct IdConfig<'c> {
    pub prefix: &'c str,
    pub separator: &'c str,
}

impl Default for IdConfig<'_> {
    fn default() -> Self {
        Self {
            prefix: "root",
            separator: "_",
        }
    }
}

/// Join an id with one more segment.
pub fn child_id(parent: &str, separator: &str, segment: &str) -> String {
    format!("{}{}{}", parent, separator, segment)
}

/// Build the `$id` tree of a schema for the given data.
///
/// Object properties get `<parent><sep><name>`, array rows present in the
/// data get `<parent><sep><index>`.
pub fn to_id_schema(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    id: Option<&str>,
    form_data: Option<&Value>,
    config: IdConfig<'_>,
) -> Result<Value, ResolveError> {
    id_schema_node(resolver, schema, id.unwrap_or(config.prefix), form_data, config, &mut Vec::new())
}

fn needs_retrieval(schema: &Value) -> bool {
    ["$ref", "allOf", "dependencies", "if"]
        .iter()
        .any(|key| schema.get(*key).is_some())
}

fn id_schema_node(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    id: &str,
    form_data: Option<&Value>,
    config: IdConfig<'_>,
    seen: &mut Vec<Value>,
) -> Result<Value, ResolveError> {
    if needs_retrieval(schema) {
        let resolved = resolver.retrieve(schema, form_data)?;
        if !seen.contains(&resolved) {
            seen.push(resolved.clone());
            let node = id_schema_node(resolver, &resolved, id, form_data, config, seen);
            seen.pop();
            return node;
        }
    }

    let mut node = Map::new();
    node.insert(ID_KEY.to_string(), Value::String(id.to_string()));

    match schema_type(schema) {
        Some("object") => {
            if let Some(Value::Object(properties)) = schema.get("properties") {
                for (name, property) in properties {
                    let field_id = child_id(id, config.separator, name);
                    let child = id_schema_node(
                        resolver,
                        property,
                        &field_id,
                        form_data.and_then(|d| d.get(name)),
                        config,
                        seen,
                    )?;
                    node.insert(name.clone(), child);
                }
            }
        }
        Some("array") => {
            if let Some(Value::Array(items)) = form_data {
                for (i, item) in items.iter().enumerate() {
                    let item_schema = array_item_schema(schema, Some(i));
                    let row_id = child_id(id, config.separator, &i.to_string());
                    let child = id_schema_node(resolver, &item_schema, &row_id, Some(item), config, seen)?;
                    node.insert(i.to_string(), child);
                }
            }
        }
        _ => {}
    }
    Ok(Value::Object(node))
}

/// Build the `$name` tree of a schema for the given data.
///
/// Names are dotted data paths (`list.0.name`). Nodes whose schema admits
/// additional properties carry the `__additional_properties` flag.
/// Combinators contribute the paths of their closest option.
pub fn to_path_schema(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    form_data: Option<&Value>,
) -> Result<Value, ResolveError> {
    path_schema_node(resolver, schema, "", form_data, &mut Vec::new())
}

fn path_schema_node(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    name: &str,
    form_data: Option<&Value>,
    seen: &mut Vec<Value>,
) -> Result<Value, ResolveError> {
    let retrieved = if needs_retrieval(schema) || schema.get("additionalProperties").is_some() {
        let resolved = resolver.retrieve(schema, form_data)?;
        if seen.contains(&resolved) {
            schema.clone()
        } else {
            seen.push(resolved.clone());
            let node = path_schema_node_resolved(resolver, &resolved, name, form_data, seen);
            seen.pop();
            return node;
        }
    } else {
        schema.clone()
    };
    path_schema_node_resolved(resolver, &retrieved, name, form_data, seen)
}

fn path_schema_node_resolved(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    name: &str,
    form_data: Option<&Value>,
    seen: &mut Vec<Value>,
) -> Result<Value, ResolveError> {
    let mut node = Map::new();
    node.insert(NAME_KEY.to_string(), Value::String(name.to_string()));

    if let Some((_, options)) = alternatives(schema) {
        let index = resolver.closest_option(form_data, options, None)?;
        if let Some(option) = options.get(index) {
            let option = resolver.resolve(option, form_data)?;
            let option_node = path_schema_node(resolver, &option, name, form_data, seen)?;
            if let Value::Object(entries) = option_node {
                node.extend(entries);
            }
        }
    }

    match schema.get("additionalProperties") {
        None | Some(Value::Bool(false)) => {}
        Some(_) => {
            node.insert(PATH_ADDITIONAL_FLAG.to_string(), Value::Bool(true));
        }
    }

    let join = |segment: &str| {
        if name.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", name, segment)
        }
    };

    if let (Some(_), Some(Value::Array(items))) = (schema.get("items"), form_data) {
        for (i, item) in items.iter().enumerate() {
            let item_schema = array_item_schema(schema, Some(i));
            let child = path_schema_node(resolver, &item_schema, &join(&i.to_string()), Some(item), seen)?;
            node.insert(i.to_string(), child);
        }
    } else if let Some(Value::Object(properties)) = schema.get("properties") {
        for (key, property) in properties {
            let child = path_schema_node(resolver, property, &join(key), form_data.and_then(|d| d.get(key)), seen)?;
            node.insert(key.clone(), child);
        }
    }
    Ok(Value::Object(node))
}

/// Keep only the parts of `form_data` that some field binds to.
///
/// Leaves are kept whole, as are empty containers, arrays of scalars and
/// subtrees under a node that accepts additional properties.
pub fn omit_extra_data(path_schema: &Value, form_data: &Value) -> Value {
    pick_used(path_schema, form_data, true).unwrap_or_else(|| empty_like(form_data))
}

fn pick_used(node: &Value, data: &Value, is_root: bool) -> Option<Value> {
    let flagged = node.get(PATH_ADDITIONAL_FLAG) == Some(&Value::Bool(true));
    if flagged && !is_root {
        return Some(data.clone());
    }
    match data {
        Value::Object(map) if !map.is_empty() => {
            let mut out = Map::new();
            for (key, value) in map {
                if key == NAME_KEY || key == PATH_ADDITIONAL_FLAG {
                    continue;
                }
                if let Some(child) = node.get(key) {
                    if let Some(picked) = pick_used(child, value, false) {
                        out.insert(key.clone(), picked);
                    }
                }
            }
            if out.is_empty() {
                None
            } else {
                Some(Value::Object(out))
            }
        }
        Value::Array(items) if items.iter().any(|i| i.is_object() || i.is_array()) => {
            let rows = items
                .iter()
                .enumerate()
                .map(|(i, item)| match node.get(i.to_string()) {
                    Some(child) => pick_used(child, item, false).unwrap_or_else(|| empty_like(item)),
                    None => empty_like(item),
                })
                .collect();
            Some(Value::Array(rows))
        }
        other => Some(other.clone()),
    }
}

fn empty_like(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::Object(Map::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}
