//! Reference Resolution
//!
//! Expands every `$ref` in a schema tree, depth-first and post-order. The
//! referenced fragment is resolved first (references may chain), copied, and
//! the referencing node's own fields are merged on top of the copy. Cycles are
//! detected with the stack of references currently being expanded.
//!
//! Resolution also checks what can only be checked on the expanded tree:
//! primary keys name a key of the list items, formats exist in the registry,
//! patterns compile.

use regex::Regex;
use std::collections::HashMap;
use tracing::trace;

use crate::error::{Result, SchemaError};
use crate::format::FormatRegistry;
use crate::path::DataPath;
use crate::schema::{ListSchema, NodeKind, SchemaNode, StrSchema};
use crate::store::SchemaStore;

/// State for one resolution run
///
/// Holds no global state, so independent runs may proceed concurrently.
pub struct ResolveContext<'a> {
    store: &'a SchemaStore,
    formats: &'a FormatRegistry,
    max_depth: usize,
    in_progress: Vec<String>,
    patterns: HashMap<String, Regex>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(store: &'a SchemaStore, formats: &'a FormatRegistry, max_depth: usize) -> Self {
        Self {
            store,
            formats,
            max_depth,
            in_progress: Vec::new(),
            patterns: HashMap::new(),
        }
    }

    /// Return a copy of `node` with every reference expanded
    pub fn resolve(&mut self, node: &SchemaNode) -> Result<SchemaNode> {
        let mut resolved = node.clone();
        self.resolve_in_place(&mut resolved, &DataPath::root(), 0)?;
        Ok(resolved)
    }

    /// Patterns compiled while resolving, keyed by their source
    pub fn into_patterns(self) -> HashMap<String, Regex> {
        self.patterns
    }

    fn resolve_in_place(&mut self, node: &mut SchemaNode, path: &DataPath, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(SchemaError::DepthExceeded {
                path: path.clone(),
                limit: self.max_depth,
            });
        }

        if let Some(reference) = node.meta.reference.take() {
            let target = self.expand(&reference, path, depth)?;
            let overlay = std::mem::replace(node, target);
            if node.kind() != overlay.kind() {
                return Err(SchemaError::TypeConflict {
                    context: format!("$ref '{}' at {}", reference, path),
                    base: node.kind(),
                    overlay: overlay.kind(),
                });
            }
            node.merge_overrides(overlay, path)?;
        }

        match &mut node.kind {
            NodeKind::Dict(dict) => {
                if let Some(keys) = dict.keys.as_mut() {
                    let keys_path = path.join("keys");
                    for (name, child) in keys.iter_mut() {
                        self.resolve_in_place(child, &keys_path.join(name.as_str()), depth + 1)?;
                    }
                }
                if let Some(dynamic) = dict.dynamic_keys.as_mut() {
                    self.resolve_in_place(dynamic, &path.join("dynamic_keys"), depth + 1)?;
                }
            }
            NodeKind::List(list) => {
                if let Some(items) = list.items.as_mut() {
                    self.resolve_in_place(items, &path.join("items"), depth + 1)?;
                }
                check_primary_key(list, path)?;
            }
            NodeKind::Str(string) => self.check_str(string, path)?,
            NodeKind::Int(_) | NodeKind::Bool(_) => {}
        }
        Ok(())
    }

    /// Resolve the target of `reference`, guarding against cycles
    fn expand(&mut self, reference: &str, path: &DataPath, depth: usize) -> Result<SchemaNode> {
        if self.in_progress.iter().any(|r| r == reference) {
            let mut chain = self.in_progress.clone();
            chain.push(reference.to_string());
            return Err(SchemaError::CyclicReference { chain });
        }

        trace!(reference, %path, "expanding reference");
        let mut target = self.store.fragment(reference)?;

        self.in_progress.push(reference.to_string());
        let result = self.resolve_in_place(&mut target, path, depth + 1);
        self.in_progress.pop();

        result.map(|()| target)
    }

    fn check_str(&mut self, string: &StrSchema, path: &DataPath) -> Result<()> {
        if let Some(format) = &string.format {
            if !self.formats.contains(format) {
                return Err(SchemaError::UnknownFormat {
                    path: path.join("format"),
                    format: format.clone(),
                });
            }
        }
        if let Some(source) = string.pattern_source() {
            if !self.patterns.contains_key(&*source) {
                let regex = Regex::new(&source).map_err(|err| SchemaError::InvalidPattern {
                    path: path.join("pattern"),
                    pattern: string.pattern.clone().unwrap_or_default(),
                    source: err,
                })?;
                self.patterns.insert(source.into_owned(), regex);
            }
        }
        Ok(())
    }
}

fn check_primary_key(list: &ListSchema, path: &DataPath) -> Result<()> {
    let (Some(key), Some(items)) = (&list.primary_key, list.items.as_deref()) else {
        return Ok(());
    };
    let declared = items
        .as_dict()
        .map(|dict| dict.static_key(key).is_some())
        .unwrap_or(false);
    if declared {
        Ok(())
    } else {
        Err(SchemaError::InvalidPrimaryKey {
            path: path.join("primary_key"),
            key: key.clone(),
        })
    }
}
