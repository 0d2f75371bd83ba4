//! UI form-field descriptors
//!
//! Flattens a schema subtree into input fields for a form builder: dicts become
//! groups, lists become collections with one base field (named `item`), scalars
//! become typed inputs. Field ids chain the names of their ancestors.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{NodeKind, SchemaNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldKind {
    Group,
    Collection,
    String,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    pub id: String,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FormFieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Ids of a group's direct members
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    /// Id of a collection's element field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_field: Option<String>,
    /// Id of the member field identifying collection elements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_options: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl FormField {
    fn new(node: &SchemaNode, name: &str, parent: Option<&str>, kind: FormFieldKind) -> Self {
        let id = match parent {
            Some(parent) => format!("{}-{}", parent, name),
            None => name.to_string(),
        };
        Self {
            id,
            name: name.to_string(),
            label: node
                .meta
                .display_name
                .clone()
                .unwrap_or_else(|| key_to_display_name(name)),
            kind,
            parent: parent.map(str::to_string),
            description: node.meta.description.clone(),
            required: node.meta.required,
            default: node.meta.default.clone(),
            members: Vec::new(),
            base_field: None,
            key: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            static_options: None,
            string_format: None,
            pattern: None,
        }
    }
}

/// Fields for `node`, named `name`, parent first
///
/// Dicts without `keys` and lists without `items` produce no fields.
pub fn form_fields(node: &SchemaNode, name: &str) -> Vec<FormField> {
    convert(node, name, None)
}

fn convert(node: &SchemaNode, name: &str, parent: Option<&str>) -> Vec<FormField> {
    match &node.kind {
        NodeKind::Str(s) => {
            let mut field = FormField::new(node, name, parent, FormFieldKind::String);
            field.min_length = s.min_length;
            field.max_length = s.max_length;
            field.static_options = s.valid_values.as_ref().map(|v| Value::from(v.clone()));
            field.string_format = s.format.as_deref().and_then(form_format);
            field.pattern = s.pattern.clone();
            vec![field]
        }
        NodeKind::Int(i) => {
            let mut field = FormField::new(node, name, parent, FormFieldKind::Integer);
            field.min = i.min;
            field.max = i.max;
            field.static_options = i.valid_values.as_ref().map(|v| Value::from(v.clone()));
            vec![field]
        }
        NodeKind::Bool(_) => vec![FormField::new(node, name, parent, FormFieldKind::Boolean)],
        NodeKind::Dict(dict) => {
            let Some(keys) = dict.keys.as_ref().filter(|k| !k.is_empty()) else {
                return Vec::new();
            };
            let mut group = FormField::new(node, name, parent, FormFieldKind::Group);
            let mut descendants = Vec::new();
            for (key, child) in keys {
                let fields = convert(child, key, Some(group.id.as_str()));
                if let Some(member) = fields.first() {
                    group.members.push(member.id.clone());
                }
                descendants.extend(fields);
            }
            let mut fields = vec![group];
            fields.extend(descendants);
            fields
        }
        NodeKind::List(list) => {
            let Some(items) = list.items.as_deref() else {
                return Vec::new();
            };
            let mut collection = FormField::new(node, name, parent, FormFieldKind::Collection);
            let descendants = convert(items, "item", Some(collection.id.as_str()));
            if let Some(base) = descendants.first() {
                collection.base_field = Some(base.id.clone());
                if let Some(pk) = &list.primary_key {
                    let key_id = format!("{}-{}", base.id, pk);
                    if base.kind == FormFieldKind::Group && base.members.contains(&key_id) {
                        collection.key = Some(key_id);
                    }
                }
            }
            let mut fields = vec![collection];
            fields.extend(descendants);
            fields
        }
    }
}

/// Form string format for a schema `format`
fn form_format(format: &str) -> Option<&'static str> {
    match format {
        "ipv4" | "ip" => Some("ip"),
        "ipv6" => Some("ipv6"),
        "ipv4_cidr" | "ipv6_cidr" | "cidr" => Some("cidr"),
        "mac" => Some("mac"),
        _ => None,
    }
}

/// Human label for a key, e.g. `vlan_id` -> `Vlan ID`
pub fn key_to_display_name(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| match word {
            "id" | "ip" | "mtu" | "mac" | "bgp" | "vrf" | "asn" | "evpn" | "mlag" => word.to_uppercase(),
            "ipv4" => "IPv4".to_string(),
            "ipv6" => "IPv6".to_string(),
            _ => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
