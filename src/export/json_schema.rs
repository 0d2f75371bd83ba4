//! JSON Schema (draft-07) export

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};

use crate::error::{Result, SchemaError};
use crate::schema::{NodeKind, SchemaNode};

pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Translate a resolved node into a draft-07 JSON Schema document
pub fn to_json_schema(node: &SchemaNode) -> Value {
    let mut document = Map::new();
    document.insert("$schema".to_string(), json!(DRAFT_07));
    if let Value::Object(body) = translate(node, None) {
        document.extend(body);
    }
    Value::Object(document)
}

/// Compile an exported document for use with the `jsonschema` crate
pub fn compile_json_schema(document: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(document)
        .map_err(|e| SchemaError::Export(e.to_string()))
}

fn translate(node: &SchemaNode, implicit_required: Option<&str>) -> Value {
    let mut out = Map::new();
    if let Some(title) = &node.meta.display_name {
        out.insert("title".into(), json!(title));
    }
    if let Some(description) = &node.meta.description {
        out.insert("description".into(), json!(description));
    }
    if let Some(default) = &node.meta.default {
        out.insert("default".into(), default.clone());
    }

    match &node.kind {
        NodeKind::Str(s) => {
            out.insert("type".into(), json!("string"));
            insert_opt(&mut out, "minLength", s.min_length);
            insert_opt(&mut out, "maxLength", s.max_length);
            insert_opt(&mut out, "pattern", s.pattern.as_ref());
            insert_opt(&mut out, "enum", s.valid_values.as_ref());
            // Only formats draft-07 defines itself
            if let Some(format @ ("ipv4" | "ipv6")) = s.format.as_deref() {
                out.insert("format".into(), json!(format));
            }
        }
        NodeKind::Int(i) => {
            out.insert("type".into(), json!("integer"));
            insert_opt(&mut out, "minimum", i.min);
            insert_opt(&mut out, "maximum", i.max);
            insert_opt(&mut out, "enum", i.valid_values.as_ref());
        }
        NodeKind::Bool(b) => {
            out.insert("type".into(), json!("boolean"));
            insert_opt(&mut out, "enum", b.valid_values.as_ref());
        }
        NodeKind::Dict(dict) => {
            out.insert("type".into(), json!("object"));
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (key, child) in dict.keys.iter().flatten() {
                properties.insert(key.clone(), translate(child, None));
                if child.is_required() || implicit_required == Some(key.as_str()) {
                    required.push(json!(key));
                }
            }
            if !properties.is_empty() {
                out.insert("properties".into(), Value::Object(properties));
            }
            if !required.is_empty() {
                out.insert("required".into(), Value::Array(required));
            }
            let additional = match dict.dynamic_keys.as_deref() {
                Some(dynamic) => translate(dynamic, None),
                None => json!(dict.allows_other_keys()),
            };
            out.insert("additionalProperties".into(), additional);
        }
        NodeKind::List(list) => {
            out.insert("type".into(), json!("array"));
            if let Some(items) = list.items.as_deref() {
                out.insert("items".into(), translate(items, list.primary_key.as_deref()));
            }
            insert_opt(&mut out, "minItems", list.min_length);
            insert_opt(&mut out, "maxItems", list.max_length);
        }
    }
    Value::Object(out)
}

fn insert_opt<T: serde::Serialize>(out: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        out.insert(key.to_string(), json!(value));
    }
}
