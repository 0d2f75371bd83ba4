//! Schema types and structures
//!
//! A schema is a tree of [`SchemaNode`]s. Each node carries shared metadata
//! ([`NodeMeta`]) and a payload tagged by its kind ([`NodeKind`]), so the
//! constraints that only make sense for one kind live on that kind's struct.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use crate::error::{Result, SchemaError};
use crate::path::DataPath;

/// The closed set of schema kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "str", alias = "string")]
    Str,
    #[serde(rename = "int", alias = "integer")]
    Int,
    #[serde(rename = "bool", alias = "boolean")]
    Bool,
    #[serde(rename = "dict")]
    Dict,
    #[serde(rename = "list")]
    List,
}

impl Kind {
    pub const ALL: [Kind; 5] = [Kind::Str, Kind::Int, Kind::Bool, Kind::Dict, Kind::List];

    /// Parse a kind name, accepting the long aliases
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "str" | "string" => Some(Self::Str),
            "int" | "integer" => Some(Self::Int),
            "bool" | "boolean" => Some(Self::Bool),
            "dict" => Some(Self::Dict),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Dict => "dict",
            Self::List => "list",
        }
    }

    /// Does the runtime shape of `value` match this kind?
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::Dict => value.is_object(),
            Self::List => value.is_array(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime shape of an instance value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Dict,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Int,
            Value::Number(_) => Self::Float,
            Value::String(_) => Self::Str,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Dict,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::List | Self::Dict)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Dict => "dict",
        };
        write!(f, "{}", name)
    }
}

/// Metadata shared by every kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMeta {
    /// Pointer to another fragment (`<store-entry>#<path>`); removed by resolution
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Source kinds the converter may coerce from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert_types: Option<Vec<Kind>>,
}

impl NodeMeta {
    fn apply(&mut self, overlay: NodeMeta, order: ListOrder) {
        set_if_some(&mut self.reference, overlay.reference);
        set_if_some(&mut self.required, overlay.required);
        set_if_some(&mut self.default, overlay.default);
        set_if_some(&mut self.description, overlay.description);
        set_if_some(&mut self.display_name, overlay.display_name);
        union_list(&mut self.convert_types, overlay.convert_types, order);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Semantic tag checked by the format registry (e.g. "ipv4", "mac")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert_to_lower_case: Option<bool>,
}

impl StrSchema {
    /// Values are lowercased by the converter, so matching ignores case
    pub fn ignores_case(&self) -> bool {
        self.convert_to_lower_case.unwrap_or(false)
    }

    /// Regex source compiled for `pattern`
    pub fn pattern_source(&self) -> Option<Cow<'_, str>> {
        let pattern = self.pattern.as_deref()?;
        Some(if self.ignores_case() {
            Cow::Owned(format!("(?i){}", pattern))
        } else {
            Cow::Borrowed(pattern)
        })
    }

    pub fn is_valid_value(&self, value: &str) -> bool {
        match &self.valid_values {
            Some(values) if self.ignores_case() => values.iter().any(|v| v.to_lowercase() == value.to_lowercase()),
            Some(values) => values.iter().any(|v| v == value),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoolSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<bool>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictSchema {
    /// Static keys, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<IndexMap<String, SchemaNode>>,
    /// Schema for any key not listed in `keys`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_keys: Option<Box<SchemaNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_other_keys: Option<bool>,
}

impl DictSchema {
    /// Schema for `key`: static keys first, then `dynamic_keys`
    pub fn child(&self, key: &str) -> Option<&SchemaNode> {
        self.keys
            .as_ref()
            .and_then(|keys| keys.get(key))
            .or(self.dynamic_keys.as_deref())
    }

    pub fn static_key(&self, key: &str) -> Option<&SchemaNode> {
        self.keys.as_ref().and_then(|keys| keys.get(key))
    }

    pub fn allows_other_keys(&self) -> bool {
        self.allow_other_keys.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    /// Field of the dict items identifying each element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

/// Kind-specific payload, tagged by the `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    #[serde(rename = "str", alias = "string")]
    Str(StrSchema),
    #[serde(rename = "int", alias = "integer")]
    Int(IntSchema),
    #[serde(rename = "bool", alias = "boolean")]
    Bool(BoolSchema),
    #[serde(rename = "dict")]
    Dict(DictSchema),
    #[serde(rename = "list")]
    List(ListSchema),
}

impl NodeKind {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Str(_) => Kind::Str,
            Self::Int(_) => Kind::Int,
            Self::Bool(_) => Kind::Bool,
            Self::Dict(_) => Kind::Dict,
            Self::List(_) => Kind::List,
        }
    }
}

/// One node of the schema tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl SchemaNode {
    /// Create a node with empty metadata
    pub fn new(kind: NodeKind) -> Self {
        Self {
            meta: NodeMeta::default(),
            kind,
        }
    }

    /// Parse a node from a schema document
    ///
    /// The document should already have passed
    /// [`validate_schema`](crate::metaschema::validate_schema).
    pub fn from_value(document: &Value) -> Result<Self> {
        Ok(Self::deserialize(document)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn kind(&self) -> Kind {
        self.kind.kind()
    }

    pub fn is_required(&self) -> bool {
        self.meta.required.unwrap_or(false)
    }

    pub fn as_dict(&self) -> Option<&DictSchema> {
        match &self.kind {
            NodeKind::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListSchema> {
        match &self.kind {
            NodeKind::List(list) => Some(list),
            _ => None,
        }
    }

    /// Schema of list elements, if this is a list with `items`
    pub fn items(&self) -> Option<&SchemaNode> {
        self.as_list().and_then(|list| list.items.as_deref())
    }

    /// Primary key of a keyed list
    pub fn primary_key(&self) -> Option<&str> {
        self.as_list().and_then(|list| list.primary_key.as_deref())
    }

    /// Does this node or any descendant still carry a `$ref`?
    pub fn has_references(&self) -> bool {
        if self.meta.reference.is_some() {
            return true;
        }
        self.children().any(|child| child.has_references())
    }

    /// Direct child nodes: static keys, dynamic keys, then items
    pub fn children(&self) -> Box<dyn Iterator<Item = &SchemaNode> + '_> {
        match &self.kind {
            NodeKind::Dict(dict) => Box::new(
                dict.keys
                    .iter()
                    .flat_map(|keys| keys.values())
                    .chain(dict.dynamic_keys.as_deref()),
            ),
            NodeKind::List(list) => Box::new(list.items.as_deref().into_iter()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Deep-merge `overlay` onto this node
    ///
    /// Scalars set on the overlay win, `keys` are unioned and merged
    /// recursively, `items`/`dynamic_keys` merge recursively. List fields
    /// (`valid_values`, `convert_types`) keep this node's entries and append
    /// the overlay's missing ones. Kinds must match.
    pub fn merge_from(&mut self, overlay: SchemaNode, path: &DataPath) -> Result<()> {
        self.merge_with(overlay, path, ListOrder::BaseFirst)
    }

    /// Merge the local fields of a `$ref` node onto its expanded target
    ///
    /// Same as [`merge_from`](Self::merge_from) except that list fields list
    /// the local entries before the target's.
    pub fn merge_overrides(&mut self, local: SchemaNode, path: &DataPath) -> Result<()> {
        self.merge_with(local, path, ListOrder::OverlayFirst)
    }

    fn merge_with(&mut self, overlay: SchemaNode, path: &DataPath, order: ListOrder) -> Result<()> {
        let SchemaNode {
            meta: overlay_meta,
            kind: overlay_kind,
        } = overlay;

        match (&mut self.kind, overlay_kind) {
            (NodeKind::Str(base), NodeKind::Str(over)) => {
                union_list(&mut base.valid_values, over.valid_values, order);
                set_if_some(&mut base.min_length, over.min_length);
                set_if_some(&mut base.max_length, over.max_length);
                set_if_some(&mut base.pattern, over.pattern);
                set_if_some(&mut base.format, over.format);
                set_if_some(&mut base.convert_to_lower_case, over.convert_to_lower_case);
            }
            (NodeKind::Int(base), NodeKind::Int(over)) => {
                union_list(&mut base.valid_values, over.valid_values, order);
                set_if_some(&mut base.min, over.min);
                set_if_some(&mut base.max, over.max);
            }
            (NodeKind::Bool(base), NodeKind::Bool(over)) => {
                union_list(&mut base.valid_values, over.valid_values, order);
            }
            (NodeKind::Dict(base), NodeKind::Dict(over)) => {
                set_if_some(&mut base.allow_other_keys, over.allow_other_keys);
                merge_boxed(
                    &mut base.dynamic_keys,
                    over.dynamic_keys,
                    &path.join("dynamic_keys"),
                    order,
                )?;
                if let Some(over_keys) = over.keys {
                    let keys = base.keys.get_or_insert_with(IndexMap::new);
                    for (name, child) in over_keys {
                        match keys.get_mut(&name) {
                            Some(existing) => existing.merge_with(
                                child,
                                &path.join("keys").join(name),
                                order,
                            )?,
                            None => {
                                keys.insert(name, child);
                            }
                        }
                    }
                }
            }
            (NodeKind::List(base), NodeKind::List(over)) => {
                set_if_some(&mut base.primary_key, over.primary_key);
                set_if_some(&mut base.min_length, over.min_length);
                set_if_some(&mut base.max_length, over.max_length);
                merge_boxed(&mut base.items, over.items, &path.join("items"), order)?;
            }
            (base, over) => {
                return Err(SchemaError::TypeConflict {
                    context: path.to_string(),
                    base: base.kind(),
                    overlay: over.kind(),
                });
            }
        }

        self.meta.apply(overlay_meta, order);
        Ok(())
    }
}

/// Which side's entries come first when two list fields are unioned
#[derive(Debug, Clone, Copy)]
enum ListOrder {
    BaseFirst,
    OverlayFirst,
}

fn union_list<T: PartialEq>(slot: &mut Option<Vec<T>>, overlay: Option<Vec<T>>, order: ListOrder) {
    let Some(overlay) = overlay else { return };
    let merged = match slot.take() {
        None => overlay,
        Some(base) => {
            let (mut first, rest) = match order {
                ListOrder::BaseFirst => (base, overlay),
                ListOrder::OverlayFirst => (overlay, base),
            };
            for value in rest {
                if !first.contains(&value) {
                    first.push(value);
                }
            }
            first
        }
    };
    *slot = Some(merged);
}

fn set_if_some<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn merge_boxed(
    slot: &mut Option<Box<SchemaNode>>,
    overlay: Option<Box<SchemaNode>>,
    path: &DataPath,
    order: ListOrder,
) -> Result<()> {
    match (slot.as_mut(), overlay) {
        (Some(base), Some(over)) => base.merge_with(*over, path, order),
        (None, Some(over)) => {
            *slot = Some(over);
            Ok(())
        }
        (_, None) => Ok(()),
    }
}
