use std::path::PathBuf;

use crate::schema::SchemaError;
use crate::table::TableError;

/// Errors that can occur while loading a model or predicting with it
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// I/O error reading a model artifact
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error deserializing a JSON model artifact
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Error loading or applying the training schema
    #[error("Schema error: {0}")]
    SchemaError(#[from] SchemaError),

    /// Error reading or writing a table
    #[error("Table error: {0}")]
    TableError(#[from] TableError),

    /// A required model artifact does not exist
    #[error("Missing model artifact: {0}")]
    MissingArtifact(PathBuf),

    /// Artifact shapes are inconsistent with each other
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A standardized column holds a value that is not a number
    #[error("Non-numeric value '{value}' in numeric feature column '{column}'")]
    NonNumeric {
        /// Feature column
        column: String,
        /// Offending value
        value: String,
    },

    /// The label decoders lack a category
    #[error("No label decoder for category '{0}'")]
    MissingDecoder(String),

    /// The classifier produced a code the decoder does not know
    #[error("Code {code} out of range for category '{category}'")]
    UnknownCode {
        /// Category being decoded
        category: String,
        /// Predicted code
        code: usize,
    },
}
