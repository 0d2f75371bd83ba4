//! Error types for the schema engine
//!
//! Two disjoint classes: [`SchemaError`] aborts loading or resolving a schema,
//! [`MergeError`] is raised only when two documents cannot be combined
//! structurally. Instance problems are reported as
//! [`ValidationError`](crate::validator::ValidationError) values, never as `Err`.

use thiserror::Error;

use crate::path::DataPath;
use crate::schema::{Kind, ValueKind};

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema engine errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid schema at {path}: {message}")]
    Violation { path: DataPath, message: String },

    #[error("Reference not found: {reference} ({reason})")]
    ReferenceNotFound { reference: String, reason: String },

    #[error("Malformed reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },

    #[error("Type conflict at {context}: '{base}' cannot be overridden by '{overlay}'")]
    TypeConflict {
        context: String,
        base: Kind,
        overlay: Kind,
    },

    #[error("Cyclic reference: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    #[error("Unknown format '{format}' at {path}")]
    UnknownFormat { path: DataPath, format: String },

    #[error("Invalid pattern '{pattern}' at {path}: {source}")]
    InvalidPattern {
        path: DataPath,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Primary key '{key}' at {path} is not a key of the list items")]
    InvalidPrimaryKey { path: DataPath, key: String },

    #[error("The path '{path}' could not be found in the schema")]
    PathNotFound { path: String },

    #[error("Maximum nesting depth {limit} exceeded at {path}")]
    DepthExceeded { path: DataPath, limit: usize },

    #[error("Exported JSON Schema does not compile: {0}")]
    Export(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the merge engine
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Cannot merge {overlay} onto {base} at {path}")]
    StructureMismatch {
        path: DataPath,
        base: ValueKind,
        overlay: ValueKind,
    },

    #[error("Maximum nesting depth {limit} exceeded at {path}")]
    DepthExceeded { path: DataPath, limit: usize },
}
