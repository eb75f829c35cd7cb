//! Error types for dataset loading, cross-validation and search

use aqua_boost::EstimatorError;
use aqua_core::{AquaError, SchemaError};
use thiserror::Error;

/// Errors while reading or shaping a training dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("required column missing from header: {0}")]
    MissingColumn(String),

    #[error("dataset has no usable rows ({skipped} skipped)")]
    NoUsableRows { skipped: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors from splitting and cross-validation
#[derive(Debug, Error)]
pub enum CvError {
    #[error("cannot make {folds} folds from {rows} rows")]
    InvalidFolds { folds: usize, rows: usize },

    #[error("invalid split: {0}")]
    InvalidSplit(String),

    #[error("row {row} was held out {count} times")]
    Coverage { row: usize, count: usize },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Pipeline(#[from] AquaError),
}

/// Errors from randomized hyperparameter search
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid distribution for {name}: {reason}")]
    InvalidDistribution { name: String, reason: String },

    #[error("search needs at least one trial")]
    NoTrials,

    #[error("all {trials} trials failed")]
    AllTrialsFailed { trials: usize },

    #[error("search cancelled before any trial completed")]
    Cancelled,

    /// Dataset or fold problems; these end the search instead of one trial
    #[error("cross-validation failed: {0}")]
    Evaluation(#[source] CvError),

    #[error("refit with the best parameters failed: {0}")]
    Refit(#[source] CvError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

/// Errors surfaced by the aqua-trainer crate
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("cross-validation error: {0}")]
    Cv(#[from] CvError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("no candidate model could be evaluated")]
    NoCandidates,

    #[error(transparent)]
    Aqua(#[from] AquaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for aqua-trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;
