//! Primary-key aware deep merge
//!
//! Dicts merge key by key with the overlay winning on scalar conflict. Lists
//! whose schema declares a `primary_key` behave as ordered maps keyed by that
//! field; every other list follows the [`ListMergeStrategy`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MergeError;
use crate::loader::DEFAULT_MAX_DEPTH;
use crate::path::DataPath;
use crate::schema::{SchemaNode, ValueKind};

type MergeResult<T> = std::result::Result<T, MergeError>;

/// How two lists without a primary key combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMergeStrategy {
    /// Overlay elements after base elements
    #[default]
    Append,
    /// Overlay elements before base elements
    Prepend,
    /// Overlay list only
    Replace,
    /// Base list only
    Keep,
}

impl ListMergeStrategy {
    pub const ALL: [ListMergeStrategy; 4] = [Self::Append, Self::Prepend, Self::Replace, Self::Keep];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Prepend => "prepend",
            Self::Replace => "replace",
            Self::Keep => "keep",
        }
    }
}

impl fmt::Display for ListMergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ListMergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| format!("unknown list merge strategy '{}', expected one of append, prepend, replace, keep", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    pub list_strategy: ListMergeStrategy,
    pub max_depth: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            list_strategy: ListMergeStrategy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Merge `overlay` onto `base`
///
/// `node` is the resolved schema governing both documents; without it every
/// list is unkeyed. A `null` in the overlay never replaces a base value.
pub fn merge_documents(
    base: Value,
    overlay: Value,
    node: Option<&SchemaNode>,
    options: &MergeOptions,
) -> MergeResult<Value> {
    merge_value(base, overlay, node, &DataPath::root(), 0, options)
}

/// Merge `documents` left to right; an empty input yields `null`
pub fn merge_all<I>(documents: I, node: Option<&SchemaNode>, options: &MergeOptions) -> MergeResult<Value>
where
    I: IntoIterator<Item = Value>,
{
    documents
        .into_iter()
        .try_fold(Value::Null, |merged, document| merge_documents(merged, document, node, options))
}

fn merge_value(
    base: Value,
    overlay: Value,
    node: Option<&SchemaNode>,
    path: &DataPath,
    depth: usize,
    options: &MergeOptions,
) -> MergeResult<Value> {
    if depth > options.max_depth {
        return Err(MergeError::DepthExceeded {
            path: path.clone(),
            limit: options.max_depth,
        });
    }

    match (base, overlay) {
        (base, Value::Null) => Ok(base),
        (Value::Null, overlay) => Ok(overlay),
        (Value::Object(base), Value::Object(overlay)) => {
            merge_dict(base, overlay, node, path, depth, options).map(Value::Object)
        }
        (Value::Array(base), Value::Array(overlay)) => {
            let items = node.and_then(SchemaNode::items);
            let merged = match node.and_then(SchemaNode::primary_key) {
                Some(key) => merge_keyed(base, overlay, key, items, path, depth, options)?,
                None => merge_unkeyed(base, overlay, options.list_strategy),
            };
            Ok(Value::Array(merged))
        }
        (base, overlay) => {
            let (base_kind, overlay_kind) = (ValueKind::of(&base), ValueKind::of(&overlay));
            if base_kind.is_container() || overlay_kind.is_container() {
                Err(MergeError::StructureMismatch {
                    path: path.clone(),
                    base: base_kind,
                    overlay: overlay_kind,
                })
            } else {
                Ok(overlay)
            }
        }
    }
}

fn merge_dict(
    mut base: Map<String, Value>,
    overlay: Map<String, Value>,
    node: Option<&SchemaNode>,
    path: &DataPath,
    depth: usize,
    options: &MergeOptions,
) -> MergeResult<Map<String, Value>> {
    let dict = node.and_then(SchemaNode::as_dict);
    for (key, value) in overlay {
        let child = dict.and_then(|d| d.child(&key));
        match base.get_mut(&key) {
            Some(slot) => {
                let current = std::mem::take(slot);
                *slot = merge_value(current, value, child, &path.join(key.as_str()), depth + 1, options)?;
            }
            None => {
                base.insert(key, value);
            }
        }
    }
    Ok(base)
}

fn merge_keyed(
    mut base: Vec<Value>,
    overlay: Vec<Value>,
    key: &str,
    items: Option<&SchemaNode>,
    path: &DataPath,
    depth: usize,
    options: &MergeOptions,
) -> MergeResult<Vec<Value>> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (index, item) in base.iter().enumerate() {
        if let Some(id) = key_of(item, key) {
            positions.entry(id).or_insert(index);
        }
    }

    for item in overlay {
        match key_of(&item, key) {
            Some(id) => match positions.get(&id) {
                Some(&index) => {
                    let current = std::mem::take(&mut base[index]);
                    base[index] = merge_value(current, item, items, &path.join(index), depth + 1, options)?;
                }
                None => {
                    positions.insert(id, base.len());
                    base.push(item);
                }
            },
            // Elements without a primary key cannot be matched.
            None => base.push(item),
        }
    }
    Ok(base)
}

fn merge_unkeyed(mut base: Vec<Value>, mut overlay: Vec<Value>, strategy: ListMergeStrategy) -> Vec<Value> {
    match strategy {
        ListMergeStrategy::Append => {
            base.extend(overlay);
            base
        }
        ListMergeStrategy::Prepend => {
            overlay.extend(base);
            overlay
        }
        ListMergeStrategy::Replace => overlay,
        ListMergeStrategy::Keep => base,
    }
}

/// Canonical text of an element's primary key value
fn key_of(item: &Value, key: &str) -> Option<String> {
    item.get(key).filter(|v| !v.is_null()).map(Value::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_schema, Schema};
    use serde_json::json;

    fn vlan_schema() -> Schema {
        load_schema(&json!({
            "type": "dict",
            "keys": {
                "vlans": {
                    "type": "list",
                    "primary_key": "id",
                    "items": {
                        "type": "dict",
                        "keys": {
                            "id": {"type": "integer", "required": true},
                            "name": {"type": "string"},
                            "trunk_groups": {"type": "list", "items": {"type": "str"}}
                        }
                    }
                },
                "name_servers": {"type": "list", "items": {"type": "str"}},
                "tags": {"type": "dict", "allow_other_keys": true}
            }
        }))
        .unwrap()
    }

    fn merge(schema: &Schema, base: Value, overlay: Value, strategy: ListMergeStrategy) -> Value {
        schema.merge(base, overlay, strategy).unwrap()
    }

    #[test]
    fn test_keyed_list_merge() {
        let schema = vlan_schema();
        let merged = merge(
            &schema,
            json!({"vlans": [{"id": 10, "name": "A"}]}),
            json!({"vlans": [{"id": 10, "name": "B"}, {"id": 20, "name": "C"}]}),
            ListMergeStrategy::Append,
        );
        assert_eq!(merged, json!({"vlans": [{"id": 10, "name": "B"}, {"id": 20, "name": "C"}]}));
    }

    #[test]
    fn test_keyed_list_keeps_base_order() {
        let schema = vlan_schema();
        let merged = merge(
            &schema,
            json!({"vlans": [{"id": 30}, {"id": 10}]}),
            json!({"vlans": [{"id": 20}, {"id": 10, "name": "ten"}, {"id": 5}]}),
            ListMergeStrategy::Replace,
        );
        assert_eq!(
            merged,
            json!({"vlans": [{"id": 30}, {"id": 10, "name": "ten"}, {"id": 20}, {"id": 5}]})
        );
    }

    #[test]
    fn test_keyed_merge_is_idempotent() {
        let schema = vlan_schema();
        let doc = json!({
            "vlans": [{"id": 1, "name": "a", "trunk_groups": ["x"]}, {"id": 2}],
            "tags": {"site": "lab"}
        });
        for strategy in [ListMergeStrategy::Keep, ListMergeStrategy::Replace] {
            assert_eq!(merge(&schema, doc.clone(), doc.clone(), strategy), doc);
        }
    }

    #[test]
    fn test_append_is_idempotent_when_every_list_is_keyed() {
        let schema = vlan_schema();
        let doc = json!({
            "vlans": [{"id": 1, "name": "a"}, {"id": 2}],
            "tags": {"site": "lab"}
        });
        assert_eq!(merge(&schema, doc.clone(), doc.clone(), ListMergeStrategy::Append), doc);
    }

    #[test]
    fn test_unkeyed_strategies() {
        let schema = vlan_schema();
        let base = json!({"name_servers": ["a", "b"]});
        let overlay = json!({"name_servers": ["c"]});
        let cases = [
            (ListMergeStrategy::Append, json!(["a", "b", "c"])),
            (ListMergeStrategy::Prepend, json!(["c", "a", "b"])),
            (ListMergeStrategy::Replace, json!(["c"])),
            (ListMergeStrategy::Keep, json!(["a", "b"])),
        ];
        for (strategy, expected) in cases {
            let merged = merge(&schema, base.clone(), overlay.clone(), strategy);
            assert_eq!(merged["name_servers"], expected, "strategy {}", strategy);
        }
    }

    #[test]
    fn test_nested_unkeyed_list_in_keyed_element() {
        let schema = vlan_schema();
        let merged = merge(
            &schema,
            json!({"vlans": [{"id": 1, "trunk_groups": ["a"]}]}),
            json!({"vlans": [{"id": 1, "trunk_groups": ["b"]}]}),
            ListMergeStrategy::Append,
        );
        assert_eq!(merged, json!({"vlans": [{"id": 1, "trunk_groups": ["a", "b"]}]}));
    }

    #[test]
    fn test_null_overlay_keeps_base() {
        let schema = vlan_schema();
        let merged = merge(
            &schema,
            json!({"tags": {"site": "lab"}, "vlans": [{"id": 1, "name": "a"}]}),
            json!({"tags": null, "vlans": [{"id": 1, "name": null}]}),
            ListMergeStrategy::Append,
        );
        assert_eq!(merged, json!({"tags": {"site": "lab"}, "vlans": [{"id": 1, "name": "a"}]}));
    }

    #[test]
    fn test_structure_mismatch() {
        let schema = vlan_schema();
        let err = schema
            .merge(json!({"tags": {"a": 1}}), json!({"tags": [1]}), ListMergeStrategy::Append)
            .unwrap_err();
        match err {
            MergeError::StructureMismatch { path, base, overlay } => {
                assert_eq!(path.to_string(), "tags");
                assert_eq!(base, ValueKind::Dict);
                assert_eq!(overlay, ValueKind::List);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_scalar_overlay_wins_without_schema() {
        let merged = merge_documents(
            json!({"a": 1, "b": {"c": true}, "l": [1]}),
            json!({"a": "one", "b": {"d": false}, "l": [2]}),
            None,
            &MergeOptions::default(),
        )
        .unwrap();
        assert_eq!(merged, json!({"a": "one", "b": {"c": true, "d": false}, "l": [1, 2]}));
    }

    #[test]
    fn test_merge_all() {
        let schema = vlan_schema();
        let options = MergeOptions::default();
        let merged = merge_all(
            vec![
                json!({"vlans": [{"id": 1}]}),
                json!({"vlans": [{"id": 2}]}),
                json!({"vlans": [{"id": 1, "name": "one"}]}),
            ],
            Some(schema.root()),
            &options,
        )
        .unwrap();
        assert_eq!(merged, json!({"vlans": [{"id": 1, "name": "one"}, {"id": 2}]}));
        assert_eq!(merge_all(Vec::new(), None, &options).unwrap(), Value::Null);
    }

    #[test]
    fn test_depth_limit() {
        let options = MergeOptions {
            max_depth: 1,
            ..MergeOptions::default()
        };
        let err = merge_documents(json!({"a": {"b": {}}}), json!({"a": {"b": {}}}), None, &options).unwrap_err();
        assert!(matches!(err, MergeError::DepthExceeded { limit: 1, .. }));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("prepend".parse::<ListMergeStrategy>().unwrap(), ListMergeStrategy::Prepend);
        assert!("merge".parse::<ListMergeStrategy>().is_err());
        assert_eq!(ListMergeStrategy::Keep.to_string(), "keep");
    }
}
