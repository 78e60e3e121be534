//! Error types for schema loading and record access.

use thiserror::Error;

/// Errors raised while loading a definition file or reading input records.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Malformed definition file content.
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    /// I/O failure on a named path.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A declared column is absent from an input file.
    #[error("column \"{column}\" not found in {file}")]
    MissingColumn { file: String, column: String },

    /// A template string could not be parsed.
    #[error("invalid template \"{template}\": {reason}")]
    Template { template: String, reason: String },

    /// An input file could not be decoded into records.
    #[error("bad record in {file}: {message}")]
    Record { file: String, message: String },
}

impl SchemaError {
    /// Create a parse error for a definition file line.
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an I/O error for a path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a record decoding error.
    pub fn record(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Record {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using [`SchemaError`].
pub type Result<T> = std::result::Result<T, SchemaError>;
