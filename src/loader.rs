//! Schema loading
//!
//! A [`Schema`] is the immutable product of meta-validation plus reference
//! resolution. It is cheap to clone and safe to share between threads; every
//! operation on it (validation, conversion, merge, navigation) only reads it.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::converter::{self, ConversionNote};
use crate::error::{MergeError, Result, SchemaError};
use crate::fingerprint::Fingerprint;
use crate::format::FormatRegistry;
use crate::merge::{self, ListMergeStrategy, MergeOptions};
use crate::metaschema::ensure_valid_schema_with_depth;
use crate::path::DataPath;
use crate::resolver::ResolveContext;
use crate::schema::{NodeKind, SchemaNode};
use crate::store::{read_document, SchemaStore};
use crate::validator::{Validation, ValidationError};

/// Nesting bound applied when nothing else is configured
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// A meta-validated, fully resolved schema
#[derive(Debug, Clone)]
pub struct Schema {
    /// The schema as written, references intact
    source: SchemaNode,
    root: SchemaNode,
    store: Arc<SchemaStore>,
    formats: Arc<FormatRegistry>,
    patterns: Arc<HashMap<String, Regex>>,
    max_depth: usize,
    fingerprint: Fingerprint,
}

impl Schema {
    /// Resolve `node` without meta-validating it first
    pub(crate) fn bootstrap(node: SchemaNode) -> Result<Self> {
        SchemaLoader::new().build(node)
    }

    /// The resolved root node
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The unresolved node this schema was built from
    pub fn source(&self) -> &SchemaNode {
        &self.source
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Compiled form of a `pattern` used somewhere in this schema
    pub fn pattern(&self, pattern: &str) -> Option<&Regex> {
        self.patterns.get(pattern)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Deep-merge `fragment` into this schema and reload the result
    ///
    /// Both the fragment and the merged document are meta-validated; `self`
    /// is left untouched.
    pub fn extend(&self, fragment: &Value) -> Result<Schema> {
        ensure_valid_schema_with_depth(fragment, self.max_depth)?;
        let overlay = SchemaNode::from_value(fragment)?;

        let mut merged = self.source.clone();
        merged.merge_from(overlay, &DataPath::root())?;
        ensure_valid_schema_with_depth(&merged.to_value()?, self.max_depth)?;

        debug!(base = %self.fingerprint.short(), "extending schema");
        self.loader().build(merged)
    }

    /// Node governing the data at `path`
    ///
    /// Dict steps name a key (static keys first, then `dynamic_keys`). On a
    /// list, a numeric step selects `items`; any other step is looked up in
    /// the keys of `items`.
    pub fn subschema<S: AsRef<str>>(&self, path: &[S]) -> Result<&SchemaNode> {
        let mut node = &self.root;
        for (position, step) in path.iter().enumerate() {
            let step = step.as_ref();
            let next = match &node.kind {
                NodeKind::Dict(dict) => dict.child(step),
                NodeKind::List(list) => {
                    let items = list.items.as_deref();
                    if step.parse::<usize>().is_ok() {
                        items
                    } else {
                        items.and_then(|i| i.as_dict()).and_then(|d| d.child(step))
                    }
                }
                _ => None,
            };
            node = next.ok_or_else(|| SchemaError::PathNotFound {
                path: join_steps(&path[..=position]),
            })?;
        }
        Ok(node)
    }

    /// [`subschema`](Self::subschema) with a dotted path such as `vlans.0.id`
    pub fn subschema_dotted(&self, path: &str) -> Result<&SchemaNode> {
        let steps: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        self.subschema(&steps)
    }

    pub fn validate<'a>(&'a self, instance: &'a Value) -> Validation<'a> {
        Validation::new(self, instance)
    }

    pub fn convert(&self, instance: &mut Value) -> Vec<ConversionNote> {
        converter::convert(instance, self)
    }

    /// Convert, then validate the converted instance
    pub fn convert_and_validate(&self, instance: &mut Value) -> (Vec<ConversionNote>, Vec<ValidationError>) {
        let notes = self.convert(instance);
        let errors = self.validate(instance).errors();
        (notes, errors)
    }

    pub fn merge(
        &self,
        base: Value,
        overlay: Value,
        strategy: ListMergeStrategy,
    ) -> std::result::Result<Value, MergeError> {
        let options = MergeOptions {
            list_strategy: strategy,
            max_depth: self.max_depth,
        };
        merge::merge_documents(base, overlay, Some(&self.root), &options)
    }

    fn loader(&self) -> SchemaLoader {
        SchemaLoader {
            store: Arc::clone(&self.store),
            formats: Arc::clone(&self.formats),
            max_depth: self.max_depth,
        }
    }
}

fn join_steps<S: AsRef<str>>(steps: &[S]) -> String {
    steps.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(".")
}

/// Builds [`Schema`]s against one store and format registry
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    store: Arc<SchemaStore>,
    formats: Arc<FormatRegistry>,
    max_depth: usize,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaLoader {
    /// Loader with an empty store and the built-in formats
    pub fn new() -> Self {
        Self {
            store: Arc::new(SchemaStore::new()),
            formats: Arc::new(FormatRegistry::new()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_store(self, store: SchemaStore) -> Self {
        self.with_shared_store(Arc::new(store))
    }

    pub fn with_shared_store(mut self, store: Arc<SchemaStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = Arc::new(formats);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// Meta-validate and resolve a schema document
    pub fn load(&self, document: &Value) -> Result<Schema> {
        ensure_valid_schema_with_depth(document, self.max_depth)?;
        let node = SchemaNode::from_value(document)?;
        self.build(node)
    }

    /// Load a schema document from a JSON or YAML file
    pub fn load_file(&self, path: &Path) -> Result<Schema> {
        let document = read_document(path)?;
        self.load(&document)
    }

    pub(crate) fn build(&self, source: SchemaNode) -> Result<Schema> {
        let mut context = ResolveContext::new(&self.store, &self.formats, self.max_depth);
        let root = context.resolve(&source)?;
        let patterns = context.into_patterns();
        let fingerprint = Fingerprint::from_json(&source.to_value()?);

        debug!(
            fingerprint = %fingerprint.short(),
            patterns = patterns.len(),
            "resolved schema"
        );

        Ok(Schema {
            source,
            root,
            store: Arc::clone(&self.store),
            formats: Arc::clone(&self.formats),
            patterns: Arc::new(patterns),
            max_depth: self.max_depth,
            fingerprint,
        })
    }
}

/// Memoised schemas for one loader, keyed by document fingerprint
#[derive(Debug)]
pub struct SchemaCache {
    loader: SchemaLoader,
    entries: HashMap<Fingerprint, Arc<Schema>>,
}

impl SchemaCache {
    pub fn new(loader: SchemaLoader) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
        }
    }

    pub fn loader(&self) -> &SchemaLoader {
        &self.loader
    }

    /// Return the cached schema for `document`, loading it on first use
    pub fn get_or_load(&mut self, document: &Value) -> Result<Arc<Schema>> {
        let key = Fingerprint::from_json(document);
        if let Some(schema) = self.entries.get(&key) {
            debug!(fingerprint = %key.short(), "schema cache hit");
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(self.loader.load(document)?);
        self.entries.insert(key, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Meta-validate and resolve `document` with no store and built-in formats
pub fn load_schema(document: &Value) -> Result<Schema> {
    SchemaLoader::new().load(document)
}

/// Merge `fragment` into `schema`, re-validating the result
pub fn extend_schema(schema: &Schema, fragment: &Value) -> Result<Schema> {
    schema.extend(fragment)
}

/// Owned copy of the node governing `path`
pub fn subschema<S: AsRef<str>>(schema: &Schema, path: &[S]) -> Result<SchemaNode> {
    schema.subschema(path).cloned()
}

pub fn convert_and_validate(
    schema: &Schema,
    instance: &mut Value,
) -> (Vec<ConversionNote>, Vec<ValidationError>) {
    schema.convert_and_validate(instance)
}

pub fn merge(
    schema: &Schema,
    base: Value,
    overlay: Value,
    strategy: ListMergeStrategy,
) -> std::result::Result<Value, MergeError> {
    schema.merge(base, overlay, strategy)
}
