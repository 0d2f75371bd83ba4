//! Documentation tables
//!
//! One row per variable, nesting shown by indentation. Elements of a list of
//! dicts start with `- ` on their first key (the primary key when there is one).

use serde::Serialize;
use serde_json::Value;

use crate::schema::{NodeKind, SchemaNode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentationRow {
    /// Indented variable name, e.g. `  - id`
    pub variable: String,
    /// Dotted path with `[]` for list elements, e.g. `vlans.[].id`
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub required: String,
    pub default: String,
    pub restrictions: Vec<String>,
    pub description: String,
}

const INDENT: &str = "  ";

/// Rows documenting every key below `node`
///
/// A dict root contributes its keys; any other root is documented as `name`.
pub fn documentation_rows(node: &SchemaNode, name: &str) -> Vec<DocumentationRow> {
    let mut rows = Vec::new();
    match &node.kind {
        NodeKind::Dict(dict) => {
            for (key, child) in dict.keys.iter().flatten() {
                add_rows(child, key, key, 0, None, &mut rows);
            }
            if let Some(dynamic) = dict.dynamic_keys.as_deref() {
                add_rows(dynamic, "<key>", "<key>", 0, None, &mut rows);
            }
        }
        _ => add_rows(node, name, name, 0, None, &mut rows),
    }
    rows
}

/// Markdown table for `rows`
pub fn render_markdown_table(rows: &[DocumentationRow]) -> String {
    let mut out = String::from(
        "| Variable | Type | Required | Default | Value Restrictions | Description |\n\
         | -------- | ---- | -------- | ------- | ------------------ | ----------- |\n",
    );
    for row in rows {
        let indent = row.variable.len() - row.variable.trim_start().len();
        let variable = format!("{}{}", "&nbsp;".repeat(indent), row.variable.trim_start());
        out.push_str(&format!(
            "| [<samp>{}</samp>](## \"{}\") | {} | {} | {} | {} | {} |\n",
            escape(&variable),
            row.path,
            row.kind,
            row.required,
            escape(&row.default),
            escape(&row.restrictions.join("<br>")),
            escape(&row.description),
        ));
    }
    out
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

/// `unique` is set on the first key of a list element, `Some(true)` when that
/// key is the primary key
fn add_rows(
    node: &SchemaNode,
    name: &str,
    path: &str,
    depth: usize,
    unique: Option<bool>,
    rows: &mut Vec<DocumentationRow>,
) {
    let marker = if unique.is_some() { "- " } else { "" };
    rows.push(row(node, &format!("{}{}{}", INDENT.repeat(depth), marker, name), path, unique));

    match &node.kind {
        NodeKind::Dict(dict) => {
            for (key, child) in dict.keys.iter().flatten() {
                add_rows(child, key, &format!("{}.{}", path, key), depth + 1, None, rows);
            }
            if let Some(dynamic) = dict.dynamic_keys.as_deref() {
                add_rows(dynamic, "<key>", &format!("{}.<key>", path), depth + 1, None, rows);
            }
        }
        NodeKind::List(list) => {
            let Some(items) = list.items.as_deref() else { return };
            let item_path = format!("{}.[]", path);
            match items.as_dict().and_then(|d| d.keys.as_ref()) {
                Some(keys) => {
                    let primary_key = list.primary_key.as_deref();
                    let mut ordered: Vec<_> = keys.iter().collect();
                    if let Some(pk) = primary_key {
                        ordered.sort_by_key(|(key, _)| key.as_str() != pk);
                    }
                    for (index, (key, child)) in ordered.into_iter().enumerate() {
                        let child_path = format!("{}.{}", item_path, key);
                        if index == 0 {
                            let unique = primary_key == Some(key.as_str());
                            add_rows(child, key, &child_path, depth + 1, Some(unique), rows);
                        } else {
                            add_rows(child, key, &child_path, depth + 2, None, rows);
                        }
                    }
                }
                None => add_rows(items, "<item>", &item_path, depth + 1, Some(false), rows),
            }
        }
        _ => {}
    }
}

fn row(node: &SchemaNode, variable: &str, path: &str, unique: Option<bool>) -> DocumentationRow {
    let required = match (node.is_required() || unique == Some(true), unique == Some(true)) {
        (true, true) => "Required, Unique",
        (true, false) => "Required",
        _ => "",
    };
    DocumentationRow {
        variable: variable.to_string(),
        path: path.to_string(),
        kind: type_name(node),
        required: required.to_string(),
        default: node.meta.default.as_ref().map(render_value).unwrap_or_default(),
        restrictions: restrictions(node),
        description: node.meta.description.clone().unwrap_or_default(),
    }
}

fn type_name(node: &SchemaNode) -> String {
    match &node.kind {
        NodeKind::Str(_) => "String".to_string(),
        NodeKind::Int(_) => "Integer".to_string(),
        NodeKind::Bool(_) => "Boolean".to_string(),
        NodeKind::Dict(_) => "Dictionary".to_string(),
        NodeKind::List(list) => match list.items.as_deref() {
            Some(items) => format!("List, items: {}", type_name(items)),
            None => "List".to_string(),
        },
    }
}

fn restrictions(node: &SchemaNode) -> Vec<String> {
    let mut out = Vec::new();
    match &node.kind {
        NodeKind::Str(s) => {
            push_opt(&mut out, "Min Length", s.min_length);
            push_opt(&mut out, "Max Length", s.max_length);
            push_opt(&mut out, "Format", s.format.as_ref());
            push_opt(&mut out, "Pattern", s.pattern.as_ref());
            if let Some(values) = &s.valid_values {
                out.push(format!("Valid Values: {}", values.join(", ")));
            }
        }
        NodeKind::Int(i) => {
            push_opt(&mut out, "Min", i.min);
            push_opt(&mut out, "Max", i.max);
            if let Some(values) = &i.valid_values {
                let values: Vec<_> = values.iter().map(i64::to_string).collect();
                out.push(format!("Valid Values: {}", values.join(", ")));
            }
        }
        NodeKind::Bool(b) => {
            if let Some(values) = &b.valid_values {
                let values: Vec<_> = values.iter().map(bool::to_string).collect();
                out.push(format!("Valid Values: {}", values.join(", ")));
            }
        }
        NodeKind::List(l) => {
            push_opt(&mut out, "Min Length", l.min_length);
            push_opt(&mut out, "Max Length", l.max_length);
        }
        NodeKind::Dict(_) => {}
    }
    out
}

fn push_opt<T: std::fmt::Display>(out: &mut Vec<String>, label: &str, value: Option<T>) {
    if let Some(value) = value {
        out.push(format!("{}: {}", label, value));
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_schema;
    use serde_json::json;

    fn rows() -> Vec<DocumentationRow> {
        let schema = load_schema(&json!({
            "type": "dict",
            "keys": {
                "vlans": {
                    "type": "list",
                    "primary_key": "id",
                    "description": "VLANs on the device",
                    "items": {
                        "type": "dict",
                        "keys": {
                            "name": {"type": "str", "max_length": 32},
                            "id": {"type": "int", "min": 1, "max": 4094},
                            "state": {"type": "str", "valid_values": ["active", "suspend"], "default": "active"}
                        }
                    }
                },
                "name_servers": {"type": "list", "items": {"type": "str", "format": "ipv4"}}
            }
        }))
        .unwrap();
        documentation_rows(schema.root(), "root")
    }

    #[test]
    fn test_rows_layout() {
        let rows = rows();
        let variables: Vec<_> = rows.iter().map(|r| r.variable.as_str()).collect();
        assert_eq!(
            variables,
            vec!["vlans", "  - id", "    name", "    state", "name_servers", "  - <item>"]
        );
        assert_eq!(rows[1].path, "vlans.[].id");
        assert_eq!(rows[1].required, "Required, Unique");
        assert_eq!(rows[1].restrictions, vec!["Min: 1", "Max: 4094"]);
        assert_eq!(rows[0].kind, "List, items: Dictionary");
        assert_eq!(rows[3].default, "active");
        assert_eq!(rows[5].restrictions, vec!["Format: ipv4"]);
    }

    #[test]
    fn test_markdown_table() {
        let table = render_markdown_table(&rows());
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("| Variable | Type | Required |"));
        assert!(lines[3].contains("<samp>&nbsp;&nbsp;- id</samp>"));
        assert!(lines[2].contains("VLANs on the device"));
    }
}
