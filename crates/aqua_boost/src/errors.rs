//! Error types for the boosting engines and estimator adapters

use thiserror::Error;

/// Failures raised by the native engines (tree builder, boosting loops).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("training set is empty")]
    EmptyDataset,

    #[error("feature matrix has {rows} rows but {targets} targets were given")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("row {row} has {actual} features, expected {expected}")]
    FeatureCountMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("non-finite value at row {row}, column {column}")]
    NonFiniteFeature { row: usize, column: usize },

    #[error("non-finite target at row {row}")]
    NonFiniteTarget { row: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid model structure: {0}")]
    InvalidModel(String),
}

/// The single failure surfaced by every estimator adapter.
///
/// Carries the backend name so that search reports and serving errors can say
/// which engine failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{backend} estimator failed: {message}")]
pub struct EstimatorError {
    pub backend: String,
    pub message: String,
}

impl EstimatorError {
    pub fn new(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Wrap a native engine failure under the adapter's backend name.
    pub fn from_engine(backend: &str, err: EngineError) -> Self {
        Self::new(backend, err.to_string())
    }
}

/// Raised when a `model_type` tag does not name a known backend.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown model type: {0}")]
pub struct UnknownModelType(pub String);
