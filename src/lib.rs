//! Fabric Schema
//!
//! A schema engine for human-authored, deeply nested network configuration
//! data. Schemas are written in a small self-describing dialect, composed
//! with `$ref`, and used to normalize, validate and merge instance documents.
//!
//! ## Features
//!
//! - **Self-validating dialect**: every schema is checked against an embedded
//!   meta-schema written in the same dialect
//! - **Composable**: `$ref` pulls fragments from a named store, with local
//!   overrides merged on top
//! - **Type conversion**: best-effort coercion of loosely typed input
//! - **Path-tracked validation**: lazy, restartable, every error carries the
//!   path to the offending value
//! - **Keyed merge**: lists with a `primary_key` merge like ordered maps
//!
//! ## Pipeline
//!
//! ```text
//! schema document ──► metaschema ──► resolver ──► Schema
//!                                                   │
//! instance ──► converter ──► validator ──► errors   │
//!                    merge(base, overlay) ◄─────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use fabric_schema::{load_schema, convert_and_validate};
//! use serde_json::json;
//!
//! let schema = load_schema(&json!({
//!     "type": "dict",
//!     "keys": {"mtu": {"type": "int", "max": 9214}}
//! })).unwrap();
//!
//! let mut instance = json!({"mtu": "1500"});
//! let (notes, errors) = convert_and_validate(&schema, &mut instance);
//! assert_eq!(notes.len(), 1);
//! assert!(errors.is_empty());
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod format;
pub mod loader;
pub mod merge;
pub mod metaschema;
pub mod path;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod tools;
pub mod validator;

pub use config::EngineConfig;
pub use converter::{convert, ConversionNote, ConversionOutcome};
pub use error::{MergeError, Result, SchemaError};
pub use fingerprint::Fingerprint;
pub use format::{FormatRegistry, FormatValidator};
pub use loader::{
    convert_and_validate, extend_schema, load_schema, merge, subschema, Schema, SchemaCache,
    SchemaLoader, DEFAULT_MAX_DEPTH,
};
pub use merge::{merge_all, merge_documents, ListMergeStrategy, MergeOptions};
pub use metaschema::{validate_schema, validate_schema_with_depth, MetaSchema};
pub use path::{DataPath, PathSegment};
pub use schema::{Kind, NodeKind, SchemaNode, ValueKind};
pub use store::SchemaStore;
pub use tools::{Mode, SchemaTools, ToolReport};
pub use validator::{validate, Validation, ValidationError, ValidationErrorKind};
