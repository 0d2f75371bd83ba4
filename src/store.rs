//! Schema Store
//!
//! Named schema documents that references point into. The store is filled
//! before resolution starts and is read-only afterwards.

use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};
use crate::loader::DEFAULT_MAX_DEPTH;
use crate::metaschema::ensure_valid_schema_with_depth;
use crate::schema::SchemaNode;

/// In-memory map of schema name to schema document
#[derive(Debug, Clone)]
pub struct SchemaStore {
    documents: HashMap<String, Value>,
    max_depth: usize,
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self {
            documents: HashMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nesting bound for meta-validating documents added from now on
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Add a document after checking it against the meta-schema
    pub fn insert(&mut self, name: impl Into<String>, document: Value) -> Result<()> {
        let name = name.into();
        ensure_valid_schema_with_depth(&document, self.max_depth)?;
        debug!(schema = %name, "added schema to store");
        self.documents.insert(name, document);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with_document(mut self, name: impl Into<String>, document: Value) -> Result<Self> {
        self.insert(name, document)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.documents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.documents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Look up the fragment a reference points at
    pub fn fragment(&self, reference: &str) -> Result<SchemaNode> {
        let (name, path) = parse_reference(reference)?;

        let document = self.documents.get(name).ok_or_else(|| SchemaError::ReferenceNotFound {
            reference: reference.to_string(),
            reason: format!("no schema named '{}' in the store", name),
        })?;

        let mut fragment = document;
        for step in &path {
            fragment = fragment.get(*step).ok_or_else(|| SchemaError::ReferenceNotFound {
                reference: reference.to_string(),
                reason: format!("'{}' does not exist in schema '{}'", step, name),
            })?;
        }

        SchemaNode::from_value(fragment).map_err(|e| SchemaError::MalformedReference {
            reference: reference.to_string(),
            reason: format!("target is not a schema node: {}", e),
        })
    }

    /// Load every `.json`, `.yml` and `.yaml` file below `dir`
    ///
    /// Entries are named after the file stem, without a `.schema` suffix.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut store = Self::new();
        store.add_dir(dir)?;
        Ok(store)
    }

    pub fn add_dir(&mut self, dir: &Path) -> Result<()> {
        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_schema_file(path) {
                continue;
            }
            self.add_file(path)?;
        }
        Ok(())
    }

    /// Load one file, returning the name it was stored under
    pub fn add_file(&mut self, path: &Path) -> Result<String> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .trim_end_matches(".schema")
            .to_string();
        let document = read_document(path)?;
        self.insert(name.clone(), document)?;
        Ok(name)
    }
}

/// Split `<entry>#<path>` into the entry name and path steps
///
/// A path starting with `/` is split on `/`, any other on `.`; empty steps
/// are skipped.
pub fn parse_reference(reference: &str) -> Result<(&str, Vec<&str>)> {
    let Some((name, path)) = reference.split_once('#') else {
        return Err(SchemaError::MalformedReference {
            reference: reference.to_string(),
            reason: "missing '#'".to_string(),
        });
    };
    if name.is_empty() {
        return Err(SchemaError::MalformedReference {
            reference: reference.to_string(),
            reason: "missing schema name before '#'".to_string(),
        });
    }

    let separator = if path.starts_with('/') { '/' } else { '.' };
    let steps = path.split(separator).filter(|s| !s.is_empty()).collect();
    Ok((name, steps))
}

/// Read a JSON or YAML document from disk
pub fn read_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        _ => Ok(serde_yaml::from_str(&content)?),
    }
}

fn is_schema_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("yml") | Some("yaml")
    )
}
