//! Loading schema, uiSchema and data documents, and JSON pointer lookup.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ResolveError;

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `ResolveError::FileNotFound` if the file doesn't exist,
/// or `ResolveError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ResolveError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
pub fn load_document_str(content: &str) -> Result<Value, ResolveError> {
    serde_json::from_str(content).map_err(|source| ResolveError::InvalidJson { source })
}

/// A bundled form definition: `{ "schema": .., "uiSchema": .., "formData": .. }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDocument {
    pub schema: Value,
    #[serde(default)]
    pub ui_schema: Value,
    #[serde(default)]
    pub form_data: Option<Value>,
}

/// Load a [`FormDocument`]. A file without a top-level `schema` key is taken
/// to be the schema itself.
pub fn load_form_document(path: &Path) -> Result<FormDocument, ResolveError> {
    let value = load_document(path)?;
    if value.get("schema").map(Value::is_object).unwrap_or(false) {
        serde_json::from_value(value).map_err(|source| ResolveError::InvalidJson { source })
    } else {
        Ok(FormDocument {
            schema: value,
            ui_schema: Value::Null,
            form_data: None,
        })
    }
}

/// Follow a `#`-prefixed JSON pointer (e.g. `#/definitions/foo`) into `root`.
///
/// Segments are unescaped (`~1` = `/`, `~0` = `~`) and percent-decoded.
/// Array segments are indices.
pub fn navigate_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let path = pointer.trim_start_matches('#');
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Some(root);
    }

    let mut current = root;
    for part in path.split('/') {
        let key = percent_decode(&part.replace("~1", "/").replace("~0", "~"));
        current = match current {
            Value::Object(map) => map.get(&key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn percent_decode(input: &str) -> String {
    if !input.contains('%') {
        return input.to_string();
    }
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
