//! Error types for schema construction and traversal

use thiserror::Error;

/// Result type for normalizr operations
pub type Result<T> = std::result::Result<T, NormalizrError>;

/// Fatal normalizr errors
///
/// Recoverable events (merge conflicts, unresolved references, unmatched
/// discriminators) are reported through [`crate::Diagnostics`] instead.
#[derive(Error, Debug)]
pub enum NormalizrError {
    #[error("Entity schema key must be a non-empty string")]
    EmptyEntityKey,

    #[error("Expected a discriminator on {schema} schema, none was given")]
    MissingDiscriminator { schema: &'static str },

    #[error("Expected schema definition to be a single schema, but found {count}")]
    AmbiguousSchemaMap { count: usize },

    #[error("Unexpected input given to normalize. Expected type to be \"object\", found \"{found}\"")]
    UnexpectedInput { found: &'static str },

    #[error("No schema given to denormalize")]
    MissingSchema,

    #[error("Unknown entity '{name}' referenced from {from}")]
    UnknownEntity { name: String, from: String },

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

/// Name of the JSON type of `value`, for error messages
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
