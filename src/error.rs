//! Error types for schema loading and resolution

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema loading and resolution errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Cannot find reference target: {target}")]
    UnresolvedReference { target: String },

    #[error("Circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("Invalid index '{index}' on {object}")]
    InvalidIndex { index: String, object: String },

    #[error("Cannot flatten non interface type: {kind}")]
    NotAnInterface { kind: String },

    #[error("Invalid object type of IndexedAccess: {kind}")]
    InvalidObjectType { kind: String },

    #[error("Unsupported pattern {mapped}<{target}>")]
    UnsupportedPattern { mapped: String, target: String },

    #[error("Expected a mapped type (Pick, Partial, Omit, Overwrite), got {kind}")]
    NotAMappedType { kind: String },

    #[error("Extends must be from an interface, got {kind}")]
    InvalidExtends { kind: String },

    #[error("Expected a Union or Intersection, got {kind}")]
    NotAUnion { kind: String },

    #[error("Resolution exceeded the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    #[error("Schema defined twice with different content: {id}")]
    DuplicateSchema { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
