//! Error types for the planar store
//!
//! This module defines the structural error hierarchy used throughout the
//! system. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Structural errors cover problems with the *shape* of data and schemas:
//! missing ids, mismatched JSON shapes, unresolvable schema names. Integrity
//! findings (dangling references, constraint failures, orphans, anomalies)
//! are deliberately NOT errors — the checker reports them as plain violation
//! data and never fails a call because of them.

use thiserror::Error;

/// Result type alias for planar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the planar store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Entity input is missing its id field during normalization
    #[error("entity '{schema}' input has no '{id_field}' field")]
    MissingId {
        /// Name of the entity schema being normalized
        schema: String,
        /// The id field the schema expects
        id_field: String,
    },

    /// Input shape does not match the schema node being applied
    #[error("expected {expected} for {context}, found {found}")]
    ShapeMismatch {
        /// JSON shape the schema required ("object", "array", ...)
        expected: &'static str,
        /// JSON shape actually found
        found: &'static str,
        /// Schema position being normalized (entity or field name)
        context: String,
    },

    /// Union input carries no discriminant field
    #[error("union input has no discriminant field '{0}'")]
    MissingDiscriminant(String),

    /// Union discriminant value matches no declared variant
    #[error("union discriminant '{field}' has unknown value '{value}'")]
    UnknownDiscriminant {
        /// The discriminant field that was read
        field: String,
        /// The unmatched tag value
        value: String,
    },

    /// A schema with this name is already registered
    #[error("schema '{0}' is already registered")]
    DuplicateSchema(String),

    /// No schema registered under this name
    #[error("schema '{0}' is not registered")]
    SchemaNotFound(String),

    /// Schema failed registry validation
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Configuration could not be parsed or loaded
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Shape name for a JSON value, for `ShapeMismatch` messages
    pub fn shape_of(value: &serde_json::Value) -> &'static str {
        match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }
}
