//! Meta-schema
//!
//! The schema dialect is described in its own terms: `schemas/meta_schema.json`
//! holds one `dict` node per kind, listing the fields a node of that kind may
//! carry. Checking a candidate schema document runs the ordinary instance
//! validator with the meta-schema as schema, one node at a time, then recurses
//! into `keys`, `dynamic_keys` and `items`.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{Result, SchemaError};
use crate::loader::{Schema, DEFAULT_MAX_DEPTH};
use crate::path::DataPath;
use crate::schema::{Kind, SchemaNode, ValueKind};
use crate::validator::Validation;

const META_SCHEMA_SOURCE: &str = include_str!("../schemas/meta_schema.json");

/// Per-kind meta-schema, bootstrapped once from the embedded document
#[derive(Debug)]
pub struct MetaSchema {
    document: Value,
    kinds: HashMap<Kind, Schema>,
}

impl MetaSchema {
    /// The embedded meta-schema
    pub fn get() -> &'static MetaSchema {
        static META_SCHEMA: OnceLock<MetaSchema> = OnceLock::new();
        META_SCHEMA.get_or_init(|| {
            MetaSchema::bootstrap(META_SCHEMA_SOURCE).expect("embedded meta-schema is well-formed")
        })
    }

    fn bootstrap(source: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(source)?;
        let mut kinds = HashMap::new();
        for kind in Kind::ALL {
            let node_doc = document.get(kind.as_str()).ok_or_else(|| SchemaError::Violation {
                path: DataPath::root().join(kind.as_str()),
                message: format!("Meta-schema has no entry for kind '{}'", kind),
            })?;
            // The meta-schema cannot be checked against itself before it exists.
            let node = SchemaNode::from_value(node_doc)?;
            kinds.insert(kind, Schema::bootstrap(node)?);
        }
        Ok(Self { document, kinds })
    }

    /// The raw meta-schema document, keyed by kind name
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Meta-schema for nodes of `kind`
    pub fn for_kind(&self, kind: Kind) -> &Schema {
        &self.kinds[&kind]
    }
}

/// Check that `document` is a well-formed schema
///
/// Returns every finding; an empty list means the document is a legal schema.
/// References are not followed here, that is the resolver's job.
pub fn validate_schema(document: &Value) -> Vec<SchemaError> {
    validate_schema_with_depth(document, DEFAULT_MAX_DEPTH)
}

/// [`validate_schema`] with nesting bounded by `max_depth` instead of the default
pub fn validate_schema_with_depth(document: &Value, max_depth: usize) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    check_node(MetaSchema::get(), document, &DataPath::root(), 0, max_depth, &mut errors);
    errors
}

/// Fail with the first finding of [`validate_schema`], if any
pub fn ensure_valid_schema(document: &Value) -> Result<()> {
    ensure_valid_schema_with_depth(document, DEFAULT_MAX_DEPTH)
}

pub fn ensure_valid_schema_with_depth(document: &Value, max_depth: usize) -> Result<()> {
    match validate_schema_with_depth(document, max_depth).into_iter().next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn check_node(
    meta: &MetaSchema,
    document: &Value,
    path: &DataPath,
    depth: usize,
    max_depth: usize,
    errors: &mut Vec<SchemaError>,
) {
    if depth > max_depth {
        errors.push(SchemaError::DepthExceeded {
            path: path.clone(),
            limit: max_depth,
        });
        return;
    }

    let Some(map) = document.as_object() else {
        errors.push(SchemaError::Violation {
            path: path.clone(),
            message: format!("A schema node must be a dict, got '{}'", ValueKind::of(document)),
        });
        return;
    };

    let kind = match map.get("type") {
        None => {
            errors.push(SchemaError::Violation {
                path: path.join("type"),
                message: "Required key 'type' is not set".to_string(),
            });
            return;
        }
        Some(Value::String(name)) => match Kind::from_name(name) {
            Some(kind) => kind,
            None => {
                errors.push(SchemaError::Violation {
                    path: path.join("type"),
                    message: format!(
                        "Unknown type '{}'. Expected one of {:?}",
                        name,
                        Kind::ALL.map(|k| k.as_str())
                    ),
                });
                return;
            }
        },
        Some(other) => {
            errors.push(SchemaError::Violation {
                path: path.join("type"),
                message: format!("Invalid type '{}'. Expected a 'str'", ValueKind::of(other)),
            });
            return;
        }
    };

    let node_meta = meta.for_kind(kind);
    for error in &Validation::new(node_meta, document) {
        errors.push(SchemaError::Violation {
            path: path.extend(&error.path),
            message: error.message,
        });
    }

    match kind {
        Kind::Dict => {
            if let Some(Value::Object(keys)) = map.get("keys") {
                let keys_path = path.join("keys");
                for (name, child) in keys.iter().filter(|(_, child)| child.is_object()) {
                    check_node(meta, child, &keys_path.join(name.as_str()), depth + 1, max_depth, errors);
                }
            }
            if let Some(child @ Value::Object(_)) = map.get("dynamic_keys") {
                check_node(meta, child, &path.join("dynamic_keys"), depth + 1, max_depth, errors);
            }
        }
        Kind::List => {
            if let Some(child @ Value::Object(_)) = map.get("items") {
                check_node(meta, child, &path.join("items"), depth + 1, max_depth, errors);
            }
        }
        _ => {}
    }
}
