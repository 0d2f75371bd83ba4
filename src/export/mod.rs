//! Export adapters
//!
//! Pure functions from a resolved schema node to another representation:
//! end-user documentation, draft-07 JSON Schema, or UI form fields.

pub mod documentation;
pub mod form;
pub mod json_schema;

pub use documentation::{documentation_rows, render_markdown_table, DocumentationRow};
pub use form::{form_fields, key_to_display_name, FormField, FormFieldKind};
pub use json_schema::{compile_json_schema, to_json_schema};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::schema::SchemaNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Markdown variable table
    Documentation,
    JsonSchema,
    /// Form fields as JSON
    Form,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Documentation => "documentation",
            Self::JsonSchema => "json-schema",
            Self::Form => "form",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "documentation" => Ok(Self::Documentation),
            "json-schema" | "jsonschema" => Ok(Self::JsonSchema),
            "form" => Ok(Self::Form),
            other => Err(format!(
                "unknown export format '{}', expected one of documentation, json-schema, form",
                other
            )),
        }
    }
}

/// Render `node` (named `name`) in `format` as text
pub fn render(node: &SchemaNode, name: &str, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Documentation => Ok(render_markdown_table(&documentation_rows(node, name))),
        ExportFormat::JsonSchema => {
            let document = to_json_schema(node);
            compile_json_schema(&document)?;
            Ok(serde_json::to_string_pretty(&document)?)
        }
        ExportFormat::Form => Ok(serde_json::to_string_pretty(&form_fields(node, name))?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_schema;
    use serde_json::json;

    #[test]
    fn test_render_each_format() {
        let schema = load_schema(&json!({
            "type": "dict",
            "keys": {"hostname": {"type": "str", "required": true}}
        }))
        .unwrap();

        let docs = render(schema.root(), "device", ExportFormat::Documentation).unwrap();
        assert!(docs.contains("<samp>hostname</samp>"));

        let json_schema: serde_json::Value =
            serde_json::from_str(&render(schema.root(), "device", ExportFormat::JsonSchema).unwrap()).unwrap();
        assert_eq!(json_schema["required"], json!(["hostname"]));

        let form: serde_json::Value =
            serde_json::from_str(&render(schema.root(), "device", ExportFormat::Form).unwrap()).unwrap();
        assert_eq!(form[1]["id"], json!("device-hostname"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json-schema".parse::<ExportFormat>().unwrap(), ExportFormat::JsonSchema);
        assert!("yaml".parse::<ExportFormat>().is_err());
    }
}
