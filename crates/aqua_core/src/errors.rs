//! Error types for the feature pipeline and serving path

use aqua_boost::EstimatorError;
use thiserror::Error;

/// Problems with a single record; abort that record only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Mandatory field absent or empty
    #[error("missing mandatory field: {field}")]
    MissingField { field: String },

    /// Pharmaceutical code has no catalog entry
    #[error("unknown pharmaceutical code: {code}")]
    ReferenceData { code: String },

    /// A value that cannot be used where it appears
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Problems with the shape of a whole dataset or batch file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("no records to fit on")]
    Empty,

    #[error("required column missing from header: {0}")]
    MissingColumn(String),

    #[error("feature vector has {actual} values, expected {expected}")]
    Width { expected: usize, actual: usize },
}

/// Errors surfaced by the aqua-core crate
#[derive(Error, Debug)]
pub enum AquaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    /// Artifact metadata disagrees with the model it describes
    #[error("model metadata mismatch: {0}")]
    MetadataMismatch(String),

    #[error("solute catalog error: {0}")]
    Catalog(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for aqua-core operations
pub type Result<T> = std::result::Result<T, AquaError>;
