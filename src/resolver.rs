//! Schema resolution: `$ref`, `allOf`, `if/then/else`, `dependencies` and
//! additional-property stubbing.
//!
//! Resolution is lazy. [`SchemaResolver::retrieve`] resolves the node it is
//! given and nothing below its `properties`/`items`; nested references are
//! followed when those nodes are dispatched in turn. Recursive schemas are
//! therefore safe, and a `$ref` chain that loops back on itself within one
//! node is reported as [`ResolveError::CircularReference`].

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::loader::navigate_pointer;
use crate::merge::merge_schemas;
use crate::types::{
    alternatives, as_schema_object, is_select, json_type_name, schema_type,
    ADDITIONAL_PROPERTY_FLAG,
};
use crate::validation::Validator;

/// Resolves schema nodes against one root schema.
///
/// Holds a memo of definition lookups keyed by pointer. Create one per
/// render pass or form instance; never share it between roots.
pub struct SchemaResolver<'a> {
    root: &'a Value,
    validator: &'a dyn Validator,
    definitions: RefCell<HashMap<String, Value>>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(root: &'a Value, validator: &'a dyn Validator) -> Self {
        Self {
            root,
            validator,
            definitions: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    pub fn validator(&self) -> &'a dyn Validator {
        self.validator
    }

    /// Look up the target of a `$ref`.
    ///
    /// # Errors
    ///
    /// `MissingDefinition` when the pointer leads nowhere,
    /// `UnsupportedReference` for anything but a local `#` pointer.
    pub fn find_definition(&self, reference: &str) -> Result<Value, ResolveError> {
        if !reference.starts_with('#') {
            return Err(ResolveError::UnsupportedReference {
                reference: reference.to_string(),
            });
        }
        if let Some(hit) = self.definitions.borrow().get(reference) {
            return Ok(hit.clone());
        }
        let target = navigate_pointer(self.root, reference)
            .cloned()
            .ok_or_else(|| ResolveError::MissingDefinition {
                reference: reference.to_string(),
            })?;
        self.definitions
            .borrow_mut()
            .insert(reference.to_string(), target.clone());
        Ok(target)
    }

    /// Resolve a schema node for the given data.
    ///
    /// The result has no own `$ref`, no `allOf`, no `if/then/else` and no
    /// `dependencies`; `anyOf`/`oneOf` are kept. Data keys not covered by
    /// `properties` get stub schemas flagged with `__additional_property`
    /// when `additionalProperties` allows them.
    pub fn retrieve(&self, schema: &Value, form_data: Option<&Value>) -> Result<Value, ResolveError> {
        let resolved = self.resolve_node(schema, form_data, &[])?;
        let resolved = self.stub_additional_properties(resolved, form_data)?;
        Ok(Value::Object(resolved))
    }

    /// Like [`retrieve`](Self::retrieve) but without additional-property
    /// stubs. Used for combinator options and merge members.
    pub fn resolve(&self, schema: &Value, form_data: Option<&Value>) -> Result<Value, ResolveError> {
        self.resolve_node(schema, form_data, &[]).map(Value::Object)
    }

    fn resolve_node(
        &self,
        schema: &Value,
        form_data: Option<&Value>,
        chain: &[String],
    ) -> Result<Map<String, Value>, ResolveError> {
        let mut chain = chain.to_vec();
        let mut resolved = self.resolve_reference(as_schema_object(schema), &mut chain)?;

        if resolved.contains_key("if") {
            resolved = self.resolve_condition(resolved, form_data, &chain)?;
        }
        if resolved.contains_key("allOf") {
            resolved = self.merge_all_of(resolved, form_data, &chain)?;
        }
        if resolved.contains_key("dependencies") {
            resolved = self.resolve_dependencies(resolved, form_data, &chain)?;
        }
        if let Some(Value::Array(types)) = resolved.get("type") {
            if types.len() == 1 {
                let single = types[0].clone();
                resolved.insert("type".to_string(), single);
            }
        }
        Ok(resolved)
    }

    /// Follow `$ref` (and references to references). Sibling keywords of a
    /// `$ref` override the referenced ones.
    fn resolve_reference(
        &self,
        mut current: Map<String, Value>,
        chain: &mut Vec<String>,
    ) -> Result<Map<String, Value>, ResolveError> {
        while let Some(reference) = current.remove("$ref") {
            let Some(reference) = reference.as_str().map(str::to_string) else {
                break;
            };
            if chain.contains(&reference) {
                return Err(ResolveError::CircularReference { reference });
            }
            let mut target = as_schema_object(&self.find_definition(&reference)?);
            chain.push(reference);
            for (key, value) in current {
                target.insert(key, value);
            }
            current = target;
        }
        Ok(current)
    }

    fn resolve_condition(
        &self,
        mut resolved: Map<String, Value>,
        form_data: Option<&Value>,
        chain: &[String],
    ) -> Result<Map<String, Value>, ResolveError> {
        let condition = resolved.remove("if").unwrap_or(Value::Bool(true));
        let then_branch = resolved.remove("then");
        let else_branch = resolved.remove("else");

        let holds = self.is_valid(&condition, form_data);
        debug!(holds, "evaluated if condition");

        let branch = if holds { then_branch } else { else_branch };
        match branch {
            Some(branch @ Value::Object(_)) => {
                let branch = self.resolve_node(&branch, form_data, chain)?;
                let merged = merge_schemas(&Value::Object(resolved), &Value::Object(branch));
                Ok(as_schema_object(&merged))
            }
            _ => Ok(resolved),
        }
    }

    fn merge_all_of(
        &self,
        mut resolved: Map<String, Value>,
        form_data: Option<&Value>,
        chain: &[String],
    ) -> Result<Map<String, Value>, ResolveError> {
        let members = match resolved.remove("allOf") {
            Some(Value::Array(members)) => members,
            _ => return Ok(resolved),
        };
        let mut merged = Value::Object(resolved);
        for member in &members {
            if member == &Value::Bool(true) {
                continue;
            }
            let member = self.resolve_node(member, form_data, chain)?;
            merged = merge_schemas(&merged, &Value::Object(member));
        }
        Ok(as_schema_object(&merged))
    }

    fn resolve_dependencies(
        &self,
        mut resolved: Map<String, Value>,
        form_data: Option<&Value>,
        chain: &[String],
    ) -> Result<Map<String, Value>, ResolveError> {
        let Some(Value::Object(dependencies)) = resolved.remove("dependencies") else {
            return Ok(resolved);
        };
        let Some(Value::Object(data)) = form_data else {
            return Ok(resolved);
        };

        for (key, dependency) in &dependencies {
            if data.get(key).is_none() {
                continue;
            }
            if let Some(Value::Object(props)) = resolved.get("properties") {
                if !props.contains_key(key) {
                    continue;
                }
            }
            let merged = match dependency {
                Value::Array(names) => merge_schemas(
                    &Value::Object(resolved.clone()),
                    &json!({ "required": names }),
                ),
                Value::Object(_) => {
                    self.with_dependent_schema(resolved.clone(), key, dependency, form_data, chain)?
                }
                _ => continue,
            };
            resolved = as_schema_object(&merged);
        }
        Ok(resolved)
    }

    fn with_dependent_schema(
        &self,
        resolved: Map<String, Value>,
        key: &str,
        dependency: &Value,
        form_data: Option<&Value>,
        chain: &[String],
    ) -> Result<Value, ResolveError> {
        let mut dependent = self.resolve_node(dependency, form_data, chain)?;
        let one_of = dependent.remove("oneOf");
        let schema = merge_schemas(&Value::Object(resolved), &Value::Object(dependent));
        let Some(Value::Array(options)) = one_of else {
            return Ok(schema);
        };

        let mut valid = Vec::new();
        for option in &options {
            let option = self.resolve_node(option, form_data, chain)?;
            let Some(condition) = option.get("properties").and_then(|p| p.get(key)) else {
                continue;
            };
            let condition = json!({ "type": "object", "properties": { key: condition } });
            if self.is_valid(&condition, form_data) {
                valid.push(option);
            }
        }
        if valid.len() != 1 {
            warn!(
                key,
                matches = valid.len(),
                "ignoring oneOf in dependencies: exactly one subschema must match"
            );
            return Ok(schema);
        }

        let mut chosen = valid.remove(0);
        if let Some(Value::Object(props)) = chosen.get_mut("properties") {
            props.remove(key);
        }
        let chosen = self.resolve_node(&Value::Object(chosen), form_data, chain)?;
        Ok(merge_schemas(&schema, &Value::Object(chosen)))
    }

    fn stub_additional_properties(
        &self,
        mut resolved: Map<String, Value>,
        form_data: Option<&Value>,
    ) -> Result<Map<String, Value>, ResolveError> {
        let additional = match resolved.get("additionalProperties") {
            None | Some(Value::Bool(false)) => return Ok(resolved),
            Some(additional) => additional.clone(),
        };
        let Some(Value::Object(data)) = form_data else {
            return Ok(resolved);
        };

        let mut properties = resolved
            .get("properties")
            .map(as_schema_object)
            .unwrap_or_default();
        for (key, value) in data {
            if properties.contains_key(key) {
                continue;
            }
            let mut stub = match &additional {
                Value::Object(map) if map.contains_key("$ref") => {
                    self.resolve_node(&additional, Some(value), &[])?
                }
                Value::Object(map)
                    if map.contains_key("type")
                        || map.contains_key("anyOf")
                        || map.contains_key("oneOf") =>
                {
                    map.clone()
                }
                _ => as_schema_object(&json!({ "type": json_type_name(value) })),
            };
            stub.insert(ADDITIONAL_PROPERTY_FLAG.to_string(), Value::Bool(true));
            properties.insert(key.clone(), Value::Object(stub));
        }
        resolved.insert("properties".to_string(), Value::Object(properties));
        Ok(resolved)
    }

    /// Evaluate `schema` against data. Undefined data is checked as `null`,
    /// so object-shaped conditions (`properties`, `required`) hold for it.
    pub fn is_valid(&self, schema: &Value, form_data: Option<&Value>) -> bool {
        self.validator
            .is_valid(schema, form_data.unwrap_or(&Value::Null), self.root)
    }

    /// Whether an array schema renders as a multiple choice of its item enum.
    pub fn is_multi_select(&self, schema: &Value) -> Result<bool, ResolveError> {
        if schema.get("uniqueItems") != Some(&Value::Bool(true)) {
            return Ok(false);
        }
        match schema.get("items") {
            Some(items @ Value::Object(_)) => Ok(is_select(&self.resolve(items, None)?)),
            _ => Ok(false),
        }
    }

    /// Pick the option of a combinator that best fits the data.
    ///
    /// Options the validator accepts come first; among several (or none),
    /// the one whose properties match the data best wins, keeping
    /// `selected` on ties. Undefined data keeps `selected` (default 0).
    pub fn closest_option(
        &self,
        form_data: Option<&Value>,
        options: &[Value],
        selected: Option<usize>,
    ) -> Result<usize, ResolveError> {
        let fallback = selected.filter(|s| *s < options.len()).unwrap_or(0);
        let Some(data) = form_data else {
            return Ok(fallback);
        };
        if options.is_empty() {
            return Ok(0);
        }

        let resolved: Vec<Value> = options
            .iter()
            .map(|option| self.resolve(option, Some(data)))
            .collect::<Result<_, _>>()?;

        let valid: Vec<usize> = (0..resolved.len())
            .filter(|i| self.option_accepts(&resolved[*i], data))
            .collect();
        if valid.len() == 1 {
            return Ok(valid[0]);
        }
        let candidates: Vec<usize> = if valid.is_empty() {
            (0..resolved.len()).collect()
        } else {
            valid
        };

        let mut best = candidates[0];
        let mut best_score = None;
        for i in candidates {
            let score = self.option_score(&resolved[i], data)?;
            let better = match best_score {
                None => true,
                Some(current) => score > current || (score == current && i == fallback),
            };
            if better {
                best = i;
                best_score = Some(score);
            }
        }
        Ok(best)
    }

    /// Validity check for an option. Options with `properties` must also
    /// share at least one key with object data, and their own `required`
    /// list is not enforced.
    fn option_accepts(&self, option: &Value, data: &Value) -> bool {
        let Some(Value::Object(props)) = option.get("properties") else {
            return self.is_valid(option, Some(data));
        };
        let requires_any = json!({
            "anyOf": props.keys().map(|k| json!({ "required": [k] })).collect::<Vec<_>>()
        });
        let mut augmented = as_schema_object(option);
        augmented.remove("required");
        if augmented.contains_key("anyOf") {
            let mut all_of = augmented
                .get("allOf")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            all_of.push(requires_any);
            augmented.insert("allOf".to_string(), Value::Array(all_of));
        } else if let Value::Object(extra) = requires_any {
            augmented.extend(extra);
        }
        self.is_valid(&Value::Object(augmented), Some(data))
    }

    fn option_score(&self, option: &Value, data: &Value) -> Result<usize, ResolveError> {
        let (Some(Value::Object(props)), Value::Object(values)) = (option.get("properties"), data)
        else {
            return Ok(usize::from(type_matches(option, data)));
        };
        let mut score = 0;
        for (key, prop) in props {
            let Some(value) = values.get(key) else {
                continue;
            };
            let prop = self.resolve(prop, Some(value))?;
            score += if let Some(constant) = prop.get("const") {
                if constant == value {
                    2
                } else {
                    0
                }
            } else if value.is_object() && schema_type(&prop) == Some("object") {
                1 + self.option_score(&prop, value)?
            } else {
                usize::from(type_matches(&prop, value))
            };
        }
        Ok(score)
    }
}

fn type_matches(schema: &Value, value: &Value) -> bool {
    let actual = json_type_name(value);
    let accepts = |t: &str| {
        t == actual || (t == "integer" && (value.is_i64() || value.is_u64()))
    };
    match schema.get("type") {
        Some(Value::String(t)) => accepts(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(accepts),
        _ => schema_type(schema).map(accepts).unwrap_or(false),
    }
}

/// The schema of array position `index` (`None`: a new item).
///
/// Tuple positions use their own schema; positions past the tuple and new
/// items use `additionalItems` when it is a schema. Otherwise `{}`.
pub fn array_item_schema(schema: &Value, index: Option<usize>) -> Value {
    match schema.get("items") {
        Some(Value::Array(items)) => {
            if let Some(item) = index.and_then(|i| items.get(i)) {
                if item.is_object() {
                    return item.clone();
                }
            }
            match schema.get("additionalItems") {
                Some(additional @ Value::Object(_)) => additional.clone(),
                _ => json!({}),
            }
        }
        Some(items @ Value::Object(_)) => items.clone(),
        _ => json!({}),
    }
}

/// The alternatives of a resolved node, each resolved for the data.
pub fn resolved_alternatives(
    resolver: &SchemaResolver<'_>,
    schema: &Value,
    form_data: Option<&Value>,
) -> Result<Vec<Value>, ResolveError> {
    match alternatives(schema) {
        Some((_, options)) => options
            .iter()
            .map(|option| resolver.resolve(option, form_data))
            .collect(),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::JsonSchemaValidator;

    fn retrieve(root: &Value, data: Option<&Value>) -> Result<Value, ResolveError> {
        SchemaResolver::new(root, &JsonSchemaValidator).retrieve(root, data)
    }

    #[test]
    fn follows_reference_chains() {
        let root = json!({
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "type": "string", "title": "B" }
            },
            "$ref": "#/definitions/a",
            "title": "Local"
        });
        let resolved = retrieve(&root, None).unwrap();
        assert_eq!(resolved["type"], "string");
        assert_eq!(resolved["title"], "Local");
        assert!(resolved.get("$ref").is_none());
    }

    #[test]
    fn missing_definition_is_fatal() {
        let root = json!({ "$ref": "#/definitions/missing" });
        let err = retrieve(&root, None).unwrap_err();
        assert!(matches!(err, ResolveError::MissingDefinition { reference } if reference == "#/definitions/missing"));
    }

    #[test]
    fn circular_chain_is_reported() {
        let root = json!({
            "definitions": {
                "a": { "$ref": "#/definitions/b" },
                "b": { "$ref": "#/definitions/a" }
            },
            "$ref": "#/definitions/a"
        });
        assert!(matches!(
            retrieve(&root, None),
            Err(ResolveError::CircularReference { .. })
        ));
    }

    #[test]
    fn recursive_structures_resolve_one_level() {
        let root = json!({
            "definitions": {
                "node": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "children": { "type": "array", "items": { "$ref": "#/definitions/node" } }
                    }
                }
            },
            "$ref": "#/definitions/node"
        });
        let resolved = retrieve(&root, None).unwrap();
        assert_eq!(
            resolved["properties"]["children"]["items"]["$ref"],
            "#/definitions/node"
        );
    }

    #[test]
    fn remote_references_are_rejected() {
        let root = json!({ "$ref": "https://example.com/schema.json" });
        assert!(matches!(
            retrieve(&root, None),
            Err(ResolveError::UnsupportedReference { .. })
        ));
    }

    #[test]
    fn all_of_merges_properties_and_required() {
        let root = json!({
            "definitions": { "named": { "properties": { "name": { "type": "string" } }, "required": ["name"] } },
            "type": "object",
            "allOf": [
                { "$ref": "#/definitions/named" },
                { "properties": { "age": { "type": "integer" } }, "required": ["age"] }
            ]
        });
        let resolved = retrieve(&root, None).unwrap();
        assert!(resolved.get("allOf").is_none());
        assert_eq!(resolved["required"], json!(["name", "age"]));
        assert_eq!(resolved["properties"]["age"]["type"], "integer");
        assert_eq!(resolved["properties"]["name"]["type"], "string");
    }

    #[test]
    fn all_of_types_collapse() {
        let root = json!({ "allOf": [{ "type": ["string", "number", "null"] }, { "type": "string" }] });
        assert_eq!(retrieve(&root, None).unwrap()["type"], "string");
    }

    #[test]
    fn if_then_else_follows_data() {
        let root = json!({
            "type": "object",
            "properties": { "country": { "type": "string" } },
            "if": { "properties": { "country": { "const": "US" } } },
            "then": { "properties": { "zip": { "type": "string" } } },
            "else": { "properties": { "postcode": { "type": "string" } } }
        });
        let us = retrieve(&root, Some(&json!({"country": "US"}))).unwrap();
        assert!(us["properties"].get("zip").is_some());
        assert!(us["properties"].get("postcode").is_none());
        assert!(us.get("if").is_none());

        let other = retrieve(&root, Some(&json!({"country": "NL"}))).unwrap();
        assert!(other["properties"].get("postcode").is_some());
    }

    #[test]
    fn if_on_undefined_data_takes_then() {
        let root = json!({
            "if": { "properties": { "flag": { "const": true } }, "required": ["flag"] },
            "then": { "properties": { "extra": { "type": "string" } } },
            "else": { "properties": { "other": { "type": "string" } } }
        });
        let resolved = retrieve(&root, None).unwrap();
        assert!(resolved["properties"].get("extra").is_some());
    }

    #[test]
    fn then_branch_as_reference_and_nested_conditions() {
        let root = json!({
            "definitions": {
                "inner": {
                    "if": { "properties": { "b": { "const": 1 } } },
                    "then": { "properties": { "c": { "type": "string" } } }
                }
            },
            "type": "object",
            "properties": { "a": { "type": "boolean" }, "b": { "type": "number" } },
            "if": { "properties": { "a": { "const": true } } },
            "then": { "$ref": "#/definitions/inner" }
        });
        let resolved = retrieve(&root, Some(&json!({"a": true, "b": 1}))).unwrap();
        assert!(resolved["properties"].get("c").is_some());
        let resolved = retrieve(&root, Some(&json!({"a": true, "b": 2}))).unwrap();
        assert!(resolved["properties"].get("c").is_none());
    }

    #[test]
    fn conditions_inside_all_of_apply_independently() {
        let root = json!({
            "type": "object",
            "properties": { "a": { "type": "string" }, "b": { "type": "string" } },
            "allOf": [
                { "if": { "properties": { "a": { "const": "x" } } }, "then": { "properties": { "ax": { "type": "string" } } } },
                { "if": { "properties": { "b": { "const": "y" } } }, "then": { "properties": { "by": { "type": "string" } } } }
            ]
        });
        let resolved = retrieve(&root, Some(&json!({"a": "x", "b": "n"}))).unwrap();
        assert!(resolved["properties"].get("ax").is_some());
        assert!(resolved["properties"].get("by").is_none());
    }

    #[test]
    fn then_properties_are_not_additional() {
        let root = json!({
            "type": "object",
            "additionalProperties": true,
            "properties": { "kind": { "type": "string" } },
            "if": { "properties": { "kind": { "const": "x" } } },
            "then": { "properties": { "detail": { "type": "string" } } }
        });
        let resolved = retrieve(&root, Some(&json!({"kind": "x", "detail": "d", "free": 1}))).unwrap();
        assert!(resolved["properties"]["detail"].get(ADDITIONAL_PROPERTY_FLAG).is_none());
        assert_eq!(resolved["properties"]["free"][ADDITIONAL_PROPERTY_FLAG], true);
        assert_eq!(resolved["properties"]["free"]["type"], "number");
    }

    #[test]
    fn additional_properties_reference_is_resolved() {
        let root = json!({
            "definitions": { "tag": { "type": "string", "title": "Tag" } },
            "type": "object",
            "additionalProperties": { "$ref": "#/definitions/tag" }
        });
        let resolved = retrieve(&root, Some(&json!({"x": "1"}))).unwrap();
        assert_eq!(resolved["properties"]["x"]["title"], "Tag");
    }

    #[test]
    fn array_dependencies_add_required() {
        let root = json!({
            "type": "object",
            "properties": { "card": { "type": "string" }, "billing": { "type": "string" } },
            "dependencies": { "card": ["billing"] }
        });
        let resolved = retrieve(&root, Some(&json!({"card": "1234"}))).unwrap();
        assert_eq!(resolved["required"], json!(["billing"]));
        let resolved = retrieve(&root, Some(&json!({}))).unwrap();
        assert!(resolved.get("required").is_none());
    }

    #[test]
    fn one_of_dependencies_pick_matching_branch() {
        let root = json!({
            "type": "object",
            "properties": { "pet": { "enum": ["cat", "dog"] } },
            "dependencies": {
                "pet": {
                    "oneOf": [
                        { "properties": { "pet": { "const": "cat" }, "lives": { "type": "integer" } } },
                        { "properties": { "pet": { "const": "dog" }, "bark": { "type": "string" } } }
                    ]
                }
            }
        });
        let resolved = retrieve(&root, Some(&json!({"pet": "dog"}))).unwrap();
        assert!(resolved["properties"].get("bark").is_some());
        assert!(resolved["properties"].get("lives").is_none());
        assert_eq!(resolved["properties"]["pet"], json!({"enum": ["cat", "dog"]}));
    }

    #[test]
    fn resolution_does_not_mutate_input() {
        let root = json!({
            "definitions": { "s": { "type": "string" } },
            "type": "object",
            "anyOf": [{ "properties": { "a": { "$ref": "#/definitions/s" } } }],
            "allOf": [{ "properties": { "b": { "type": "number" } } }, { "anyOf": [{ "required": ["b"] }] }]
        });
        let before = root.clone();
        let first = retrieve(&root, Some(&json!({"b": 1}))).unwrap();
        let second = retrieve(&root, Some(&json!({"b": 1}))).unwrap();
        assert_eq!(root, before);
        assert_eq!(first, second);
        assert!(first.get("anyOf").is_some());
    }

    #[test]
    fn closest_option_prefers_matching_properties() {
        let root = json!({});
        let resolver = SchemaResolver::new(&root, &JsonSchemaValidator);
        let options = vec![
            json!({ "properties": { "a": { "type": "string" } }, "required": ["a"] }),
            json!({ "properties": { "b": { "type": "number" } }, "required": ["b"] }),
        ];
        assert_eq!(resolver.closest_option(None, &options, None).unwrap(), 0);
        assert_eq!(resolver.closest_option(None, &options, Some(1)).unwrap(), 1);
        assert_eq!(
            resolver.closest_option(Some(&json!({"b": 2})), &options, None).unwrap(),
            1
        );
        assert_eq!(
            resolver.closest_option(Some(&json!({"a": "x"})), &options, Some(1)).unwrap(),
            0
        );
    }

    #[test]
    fn closest_option_narrows_primitive_types() {
        let root = json!({});
        let resolver = SchemaResolver::new(&root, &JsonSchemaValidator);
        let options = vec![json!({ "type": "string" }), json!({ "type": "number" })];
        assert_eq!(
            resolver.closest_option(Some(&json!(3)), &options, None).unwrap(),
            1
        );
    }

    #[test]
    fn multi_select_detection() {
        let root = json!({ "definitions": { "choice": { "enum": ["a", "b"] } } });
        let resolver = SchemaResolver::new(&root, &JsonSchemaValidator);
        let schema = json!({ "type": "array", "uniqueItems": true, "items": { "$ref": "#/definitions/choice" } });
        assert!(resolver.is_multi_select(&schema).unwrap());
        let schema = json!({ "type": "array", "items": { "enum": ["a"] } });
        assert!(!resolver.is_multi_select(&schema).unwrap());
    }

    #[test]
    fn array_item_schema_positions() {
        let tuple = json!({ "items": [{ "type": "string" }, { "type": "number" }], "additionalItems": { "type": "boolean" } });
        assert_eq!(array_item_schema(&tuple, Some(1)), json!({ "type": "number" }));
        assert_eq!(array_item_schema(&tuple, Some(5)), json!({ "type": "boolean" }));
        assert_eq!(array_item_schema(&tuple, None), json!({ "type": "boolean" }));
        let list = json!({ "items": { "type": "string" } });
        assert_eq!(array_item_schema(&list, Some(3)), json!({ "type": "string" }));
        assert_eq!(array_item_schema(&json!({}), None), json!({}));
    }
}
