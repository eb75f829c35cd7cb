//! K-fold cross-validation with out-of-fold predictions
//!
//! Each fold fits its own preprocessor on its training rows only, then a fresh
//! estimator cloned from the template. Folds run on rayon workers; results are
//! assembled by fold index so the report does not depend on scheduling.

use aqua_boost::{Estimator, Regressor};
use aqua_core::{DomainTransformer, EnrichedRecord, FeatureSchema, FittedPreprocessor, InferencePipeline};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::TrainingSet;
use crate::errors::CvError;
use crate::folds::{Fold, FoldSplitter};
use crate::metrics::{mean_std, RegressionMetrics};

/// Held-out metrics for one fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: usize,
    pub n_train: usize,
    pub n_val: usize,
    pub metrics: RegressionMetrics,
}

/// Mean and standard deviation of a per-fold metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub mean: f64,
    pub std: f64,
}

impl Spread {
    fn of(values: &[f64]) -> Self {
        let (mean, std) = mean_std(values);
        Self { mean, std }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvReport {
    pub folds: Vec<FoldResult>,
    /// Out-of-fold prediction per row, in dataset order
    pub oof: Vec<f64>,
    /// Fold that held each row out
    pub fold_of: Vec<usize>,
    /// Metrics over all out-of-fold predictions together
    pub oof_metrics: RegressionMetrics,
}

impl CvReport {
    pub fn r2(&self) -> Spread {
        Spread::of(&self.fold_values(|m| m.r2))
    }

    pub fn rmse(&self) -> Spread {
        Spread::of(&self.fold_values(|m| m.rmse))
    }

    pub fn mae(&self) -> Spread {
        Spread::of(&self.fold_values(|m| m.mae))
    }

    /// Validation R² per fold
    pub fn fold_scores(&self) -> Vec<f64> {
        self.fold_values(|m| m.r2)
    }

    fn fold_values(&self, metric: impl Fn(&RegressionMetrics) -> f64) -> Vec<f64> {
        self.folds.iter().map(|f| metric(&f.metrics)).collect()
    }
}

/// Fit a preprocessor and a fresh copy of `template` on the given rows.
pub fn fit_parts(
    records: &[EnrichedRecord],
    targets: &[f64],
    schema: &FeatureSchema,
    template: &Regressor,
) -> Result<(FittedPreprocessor, Regressor), CvError> {
    let preprocessor = FittedPreprocessor::fit(records, schema)?;
    let features = preprocessor.transform_many(records);
    let mut estimator = template.clone_unfitted();
    estimator.fit(&features, targets)?;
    Ok((preprocessor, estimator))
}

/// Fit on the whole dataset and freeze the result as a pipeline.
pub fn fit_pipeline(
    data: &TrainingSet,
    schema: &FeatureSchema,
    template: &Regressor,
    transformer: &DomainTransformer,
) -> Result<InferencePipeline, CvError> {
    let (preprocessor, estimator) = fit_parts(&data.records, &data.targets, schema, template)?;
    Ok(InferencePipeline::new(
        transformer.clone(),
        preprocessor,
        estimator,
    )?)
}

#[derive(Debug, Clone)]
pub struct CrossValidator {
    splitter: FoldSplitter,
    schema: FeatureSchema,
}

impl CrossValidator {
    pub fn new(splitter: FoldSplitter, schema: FeatureSchema) -> Self {
        Self { splitter, schema }
    }

    pub fn splitter(&self) -> &FoldSplitter {
        &self.splitter
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn folds(&self, data: &TrainingSet) -> Result<Vec<Fold>, CvError> {
        self.splitter.split(&data.groups)
    }

    /// Cross-validate a fresh copy of `template` over the splitter's folds.
    pub fn evaluate(&self, data: &TrainingSet, template: &Regressor) -> Result<CvReport, CvError> {
        let folds = self.folds(data)?;
        self.evaluate_folds(data, template, &folds)
    }

    pub fn evaluate_folds(
        &self,
        data: &TrainingSet,
        template: &Regressor,
        folds: &[Fold],
    ) -> Result<CvReport, CvError> {
        let n = data.len();
        let results: Vec<(FoldResult, Vec<f64>)> = folds
            .par_iter()
            .map(|fold| self.run_fold(data, template, fold))
            .collect::<Result<_, CvError>>()?;

        let mut oof = vec![f64::NAN; n];
        let mut fold_of = vec![0; n];
        let mut held_out = vec![0usize; n];
        for (fold, (_, predictions)) in folds.iter().zip(&results) {
            for (&row, &prediction) in fold.validation.iter().zip(predictions) {
                oof[row] = prediction;
                fold_of[row] = fold.index;
                held_out[row] += 1;
            }
        }
        if let Some(row) = held_out.iter().position(|&count| count != 1) {
            return Err(CvError::Coverage {
                row,
                count: held_out[row],
            });
        }

        let oof_metrics = RegressionMetrics::compute(&data.targets, &oof);
        let folds: Vec<FoldResult> = results.into_iter().map(|(result, _)| result).collect();
        info!(
            backend = %template.backend(),
            folds = folds.len(),
            oof_r2 = oof_metrics.r2,
            oof_rmse = oof_metrics.rmse,
            "cross-validation complete"
        );

        Ok(CvReport {
            folds,
            oof,
            fold_of,
            oof_metrics,
        })
    }

    fn run_fold(
        &self,
        data: &TrainingSet,
        template: &Regressor,
        fold: &Fold,
    ) -> Result<(FoldResult, Vec<f64>), CvError> {
        let train = data.subset(&fold.train);
        let validation = data.subset(&fold.validation);

        let (preprocessor, estimator) =
            fit_parts(&train.records, &train.targets, &self.schema, template)?;
        let predictions = estimator.predict(&preprocessor.transform_many(&validation.records))?;
        let metrics = RegressionMetrics::compute(&validation.targets, &predictions);
        debug!(fold = fold.index, r2 = metrics.r2, rmse = metrics.rmse, "fold done");

        Ok((
            FoldResult {
                fold: fold.index,
                n_train: train.len(),
                n_val: validation.len(),
                metrics,
            },
            predictions,
        ))
    }
}
