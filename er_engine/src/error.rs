//! Error types for graph loading and traversal.

use er_schema::{Mode, SchemaError};
use thiserror::Error;

/// Errors that can occur while building or traversing a graph.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Definition file, column resolution or record decoding failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// I/O error while writing output or scanning directories.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Ill-formed `entity.field` reference in a proposal query.
    #[error("invalid field \"{spec}\": {reason}")]
    InvalidField { spec: String, reason: String },

    /// Proposal query that cannot be built against the schema.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Operation invoked on a graph loaded for the other traversal mode.
    #[error("operation requires a {expected} graph, found a {actual} graph")]
    WrongMode { expected: Mode, actual: Mode },
}

impl EngineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid query error.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }
}

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
