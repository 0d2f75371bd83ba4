//! Type conversion
//!
//! Best-effort coercion of loosely typed input toward the kinds the schema
//! declares. The pass never fails: a value that cannot be coerced is left as
//! it is and reported in a [`ConversionNote`], and validation afterwards is
//! the authority on whether the instance is acceptable.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::trace;

use crate::loader::Schema;
use crate::path::DataPath;
use crate::schema::{Kind, NodeKind, SchemaNode, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted,
    Failed,
}

/// Record of one attempted coercion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionNote {
    pub path: DataPath,
    pub from: ValueKind,
    pub to: Kind,
    pub outcome: ConversionOutcome,
    pub message: String,
}

impl ConversionNote {
    pub fn is_failure(&self) -> bool {
        self.outcome == ConversionOutcome::Failed
    }
}

impl fmt::Display for ConversionNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.path, self.message)
    }
}

/// Convert `instance` in place against the root of `schema`
pub fn convert(instance: &mut Value, schema: &Schema) -> Vec<ConversionNote> {
    convert_node(schema.root(), instance, schema.max_depth())
}

/// Convert `instance` in place against a resolved node
///
/// Subtrees nested deeper than `max_depth` are left alone.
pub fn convert_node(node: &SchemaNode, instance: &mut Value, max_depth: usize) -> Vec<ConversionNote> {
    let mut converter = Converter {
        max_depth,
        notes: Vec::new(),
    };
    converter.walk(node, instance, &DataPath::root(), 0);
    converter.notes
}

struct Converter {
    max_depth: usize,
    notes: Vec<ConversionNote>,
}

impl Converter {
    fn walk(&mut self, node: &SchemaNode, value: &mut Value, path: &DataPath, depth: usize) {
        if value.is_null() || depth > self.max_depth {
            return;
        }

        match (&node.kind, value) {
            (NodeKind::Dict(dict), Value::Object(map)) => {
                for (key, child_value) in map.iter_mut() {
                    if let Some(child) = dict.child(key) {
                        self.walk(child, child_value, &path.join(key.as_str()), depth + 1);
                    }
                }
            }
            (NodeKind::List(list), Value::Array(items)) => {
                if let Some(item_schema) = list.items.as_deref() {
                    for (index, item) in items.iter_mut().enumerate() {
                        self.walk(item_schema, item, &path.join(index), depth + 1);
                    }
                }
            }
            (NodeKind::Dict(_) | NodeKind::List(_), _) => {}
            (_, value) => self.convert_scalar(node, value, path),
        }
    }

    fn convert_scalar(&mut self, node: &SchemaNode, value: &mut Value, path: &DataPath) {
        let target = node.kind();

        if !target.matches(value) {
            let Some(source) = scalar_kind(value) else { return };
            let allowed = match &node.meta.convert_types {
                Some(kinds) => kinds.contains(&source),
                None => default_sources(target).contains(&source),
            };
            if !allowed {
                return;
            }

            let from = ValueKind::of(value);
            match coerce(value, target) {
                Some(converted) => {
                    trace!(%path, %from, to = %target, "converted value");
                    self.notes.push(ConversionNote {
                        path: path.clone(),
                        from,
                        to: target,
                        outcome: ConversionOutcome::Converted,
                        message: format!("Converted {} from '{}' to '{}'", value, from, target),
                    });
                    *value = converted;
                }
                None => self.notes.push(ConversionNote {
                    path: path.clone(),
                    from,
                    to: target,
                    outcome: ConversionOutcome::Failed,
                    message: format!("Unable to convert {} from '{}' to '{}'", value, from, target),
                }),
            }
        }

        if let (NodeKind::Str(string), Value::String(s)) = (&node.kind, value) {
            if !string.ignores_case() {
                return;
            }
            let lowered = s.to_lowercase();
            if lowered != *s {
                trace!(%path, "lowercased value");
                self.notes.push(ConversionNote {
                    path: path.clone(),
                    from: ValueKind::Str,
                    to: Kind::Str,
                    outcome: ConversionOutcome::Converted,
                    message: format!("Converted '{}' to lower case", s),
                });
                *s = lowered;
            }
        }
    }
}

/// Source kinds accepted when a node does not list `convert_types`
fn default_sources(target: Kind) -> &'static [Kind] {
    match target {
        Kind::Int | Kind::Bool => &[Kind::Str],
        _ => &[],
    }
}

fn scalar_kind(value: &Value) -> Option<Kind> {
    match ValueKind::of(value) {
        ValueKind::Str => Some(Kind::Str),
        ValueKind::Int => Some(Kind::Int),
        ValueKind::Bool => Some(Kind::Bool),
        _ => None,
    }
}

fn coerce(value: &Value, target: Kind) -> Option<Value> {
    match (target, value) {
        (Kind::Int, Value::String(s)) => parse_int(s).map(Value::from),
        (Kind::Bool, Value::String(s)) => match s.as_str() {
            "true" | "yes" => Some(Value::Bool(true)),
            "false" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        (Kind::Str, Value::Number(n)) => Some(Value::String(n.to_string())),
        (Kind::Str, Value::Bool(b)) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

/// Decimal digits with an optional leading minus, nothing else
fn parse_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
