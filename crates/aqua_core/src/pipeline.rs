//! Frozen inference pipeline: transformer → preprocessor → estimator

use aqua_boost::{Estimator, EstimatorError, Regressor};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::errors::{AquaError, Result, SchemaError, ValidationError};
use crate::preprocess::FittedPreprocessor;
use crate::record::RawRecord;
use crate::transform::{DomainTransformer, EnrichedRecord, QualityWarning};

/// A predicted adsorption capacity with the warnings raised on the way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// qe in mg/g
    pub qe: f64,
    pub warnings: Vec<QualityWarning>,
}

/// Why a single record could not be predicted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

/// Failure of one row in a batch; sibling rows are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {row}: {error}")]
pub struct RowError {
    pub row: usize,
    pub error: RecordError,
}

/// Immutable pipeline; safe to share across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct InferencePipeline {
    transformer: DomainTransformer,
    preprocessor: FittedPreprocessor,
    estimator: Regressor,
}

impl InferencePipeline {
    /// Assemble a pipeline from fitted parts; the estimator must be trained
    /// on vectors of exactly the preprocessor's width.
    pub fn new(
        transformer: DomainTransformer,
        preprocessor: FittedPreprocessor,
        estimator: Regressor,
    ) -> Result<Self> {
        let expected = preprocessor.width();
        match estimator.feature_count() {
            None => {
                return Err(AquaError::Estimator(EstimatorError::new(
                    estimator.backend().as_str(),
                    "estimator is not fitted",
                )))
            }
            Some(actual) if actual != expected => {
                return Err(SchemaError::Width { expected, actual }.into());
            }
            Some(_) => {}
        }

        Ok(Self {
            transformer,
            preprocessor,
            estimator,
        })
    }

    pub fn transformer(&self) -> &DomainTransformer {
        &self.transformer
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    pub fn estimator(&self) -> &Regressor {
        &self.estimator
    }

    pub fn predict(&self, raw: &RawRecord) -> std::result::Result<Prediction, RecordError> {
        let enriched = self.transformer.transform(raw)?;
        self.predict_enriched(enriched)
    }

    /// Predict an already enriched record, carrying its warnings over.
    pub fn predict_enriched(
        &self,
        enriched: EnrichedRecord,
    ) -> std::result::Result<Prediction, RecordError> {
        let (vector, encode_warnings) = self.preprocessor.transform(&enriched);
        let qe = self
            .estimator
            .predict(std::slice::from_ref(&vector))?
            .first()
            .copied()
            .ok_or_else(|| {
                EstimatorError::new(self.estimator.backend().as_str(), "empty prediction")
            })?;

        let mut warnings = enriched.warnings;
        warnings.extend(encode_warnings);
        for warning in &warnings {
            warn!(%warning, "data quality");
        }

        Ok(Prediction { qe, warnings })
    }

    /// Predict every record; output order matches input order.
    pub fn predict_batch(
        &self,
        records: &[RawRecord],
    ) -> Vec<std::result::Result<Prediction, RowError>> {
        records
            .par_iter()
            .enumerate()
            .map(|(row, raw)| self.predict(raw).map_err(|error| RowError { row, error }))
            .collect()
    }
}
