//! Candidate pool: compare backends, tune the best ranked ones
//!
//! Every candidate is cross-validated on the training split and scored on the
//! holdout split. The ranking orders by CV RMSE, then CV R², then holdout R².
//! The top-k candidates are tuned with randomized search and the best tuned
//! candidate wins.

use std::cmp::Ordering;

use aqua_boost::{Estimator, ModelType, ParamMap, Regressor};
use aqua_core::{AquaError, DomainTransformer, InferencePipeline};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cv::{fit_pipeline, CrossValidator, CvReport, FoldResult};
use crate::dataset::TrainingSet;
use crate::errors::{CvError, Result, SearchError, TrainerError};
use crate::metrics::RegressionMetrics;
use crate::search::{CancelToken, ParamSpace, RandomizedSearch, SearchOutcome, TrialResult};

/// A named backend with its starting parameters
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub estimator: Regressor,
}

impl Candidate {
    pub fn new(name: &str, estimator: Regressor) -> Self {
        Self {
            name: name.to_string(),
            estimator,
        }
    }

    pub fn model_type(&self) -> ModelType {
        self.estimator.backend()
    }
}

/// One candidate per backend with its default parameters
pub fn default_pool() -> Vec<Candidate> {
    vec![
        Candidate::new("GBDT", Regressor::new(ModelType::Gbdt)),
        Candidate::new("HistGBDT", Regressor::new(ModelType::HistGbdt)),
        Candidate::new("DART", Regressor::new(ModelType::Dart)),
    ]
}

/// Metrics for a pipeline on rows it may or may not have seen
pub fn score_pipeline(pipeline: &InferencePipeline, data: &TrainingSet) -> Result<RegressionMetrics> {
    let features = pipeline.preprocessor().transform_many(&data.records);
    let predictions = pipeline
        .estimator()
        .predict(&features)
        .map_err(AquaError::from)?;
    Ok(RegressionMetrics::compute(&data.targets, &predictions))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub name: String,
    pub model_type: ModelType,
    pub cv_r2: f64,
    pub cv_rmse: f64,
    pub cv_mae: f64,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
    pub folds: Vec<FoldResult>,
}

impl PoolEntry {
    fn ranking(&self, other: &Self) -> Ordering {
        self.cv_rmse
            .total_cmp(&other.cv_rmse)
            .then_with(|| other.cv_r2.total_cmp(&self.cv_r2))
            .then_with(|| other.test.r2.total_cmp(&self.test.r2))
    }
}

/// Sort best first; stable, so equal entries keep pool order.
pub fn rank(entries: &mut [PoolEntry]) {
    entries.sort_by(PoolEntry::ranking);
}

/// Evaluate every candidate. Candidates that fail are logged and left out;
/// the call fails only when none can be evaluated.
pub fn evaluate_pool(
    candidates: &[Candidate],
    train: &TrainingSet,
    test: &TrainingSet,
    validator: &CrossValidator,
    transformer: &DomainTransformer,
) -> Result<Vec<PoolEntry>> {
    let mut entries = Vec::new();
    for candidate in candidates {
        match evaluate_candidate(candidate, train, test, validator, transformer) {
            Ok(entry) => {
                info!(
                    "[CV] {:14} | R2={:.3} | RMSE={:.3} | MAE={:.3} | test R2={:.3}",
                    entry.name, entry.cv_r2, entry.cv_rmse, entry.cv_mae, entry.test.r2
                );
                entries.push(entry);
            }
            Err(err) if is_estimator_failure(&err) => {
                warn!(candidate = %candidate.name, %err, "candidate skipped")
            }
            Err(err) => return Err(err),
        }
    }
    if entries.is_empty() {
        return Err(TrainerError::NoCandidates);
    }
    rank(&mut entries);
    Ok(entries)
}

fn is_estimator_failure(err: &TrainerError) -> bool {
    matches!(
        err,
        TrainerError::Cv(CvError::Estimator(_))
            | TrainerError::Cv(CvError::Pipeline(AquaError::Estimator(_)))
            | TrainerError::Aqua(AquaError::Estimator(_))
    )
}

fn evaluate_candidate(
    candidate: &Candidate,
    train: &TrainingSet,
    test: &TrainingSet,
    validator: &CrossValidator,
    transformer: &DomainTransformer,
) -> Result<PoolEntry> {
    let report = validator.evaluate(train, &candidate.estimator)?;
    let pipeline = fit_pipeline(train, validator.schema(), &candidate.estimator, transformer)?;
    Ok(PoolEntry {
        name: candidate.name.clone(),
        model_type: candidate.model_type(),
        cv_r2: report.r2().mean,
        cv_rmse: report.rmse().mean,
        cv_mae: report.mae().mean,
        train: score_pipeline(&pipeline, train)?,
        test: score_pipeline(&pipeline, test)?,
        folds: report.folds,
    })
}

/// Tuning result for one ranked candidate
#[derive(Debug, Clone)]
pub struct TunedCandidate {
    pub name: String,
    pub outcome: SearchOutcome,
}

/// Serializable digest of a [`TunedCandidate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningSummary {
    pub name: String,
    pub model_type: ModelType,
    pub best_score: f64,
    pub best_trial: usize,
    pub best_params: ParamMap,
    pub cancelled: bool,
    pub trials: Vec<TrialResult>,
}

impl TunedCandidate {
    pub fn summary(&self) -> TuningSummary {
        TuningSummary {
            name: self.name.clone(),
            model_type: self.outcome.model_type,
            best_score: self.outcome.best_score,
            best_trial: self.outcome.best_trial,
            best_params: self.outcome.best_params.clone(),
            cancelled: self.outcome.cancelled,
            trials: self.outcome.trials.clone(),
        }
    }

    pub fn report(&self) -> &CvReport {
        &self.outcome.best_report
    }
}

/// Search settings shared by every tuned candidate
#[derive(Debug, Clone)]
pub struct TuningOptions {
    pub top_k: usize,
    pub n_iter: usize,
    pub seed: u64,
    pub cancel: CancelToken,
}

/// Tune the first `top_k` ranked entries with their default spaces.
/// A candidate whose search fails is logged and skipped.
pub fn tune_top_k(
    ranking: &[PoolEntry],
    candidates: &[Candidate],
    data: &TrainingSet,
    validator: &CrossValidator,
    transformer: &DomainTransformer,
    options: &TuningOptions,
) -> Result<Vec<TunedCandidate>> {
    let mut tuned = Vec::new();
    for entry in ranking.iter().take(options.top_k) {
        let Some(candidate) = candidates.iter().find(|c| c.name == entry.name) else {
            continue;
        };
        info!("Tuning {} ({})", entry.name, entry.model_type);
        let search = RandomizedSearch::new(
            candidate.estimator.clone_unfitted(),
            ParamSpace::default_for(entry.model_type),
            validator,
        )
        .n_iter(options.n_iter)
        .seed(options.seed)
        .cancel_token(options.cancel.clone());

        match search.run(data, transformer) {
            Ok(outcome) => tuned.push(TunedCandidate {
                name: entry.name.clone(),
                outcome,
            }),
            Err(err @ SearchError::Evaluation(_)) => return Err(err.into()),
            Err(err) => warn!(candidate = %entry.name, %err, "tuning failed"),
        }
    }
    if tuned.is_empty() {
        return Err(TrainerError::NoCandidates);
    }
    Ok(tuned)
}

/// Highest tuned score wins; ties go to the better ranked candidate.
pub fn select_best(tuned: &[TunedCandidate]) -> Option<&TunedCandidate> {
    tuned.iter().fold(None, |best: Option<&TunedCandidate>, candidate| match best {
        Some(b) if b.outcome.best_score >= candidate.outcome.best_score => Some(b),
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, cv_rmse: f64, cv_r2: f64, test_r2: f64) -> PoolEntry {
        let metrics = |r2| RegressionMetrics {
            n: 10,
            r2,
            rmse: 1.0,
            mae: 1.0,
        };
        PoolEntry {
            name: name.to_string(),
            model_type: ModelType::Gbdt,
            cv_r2,
            cv_rmse,
            cv_mae: 1.0,
            train: metrics(0.9),
            test: metrics(test_r2),
            folds: Vec::new(),
        }
    }

    #[test]
    fn test_ranking_order() {
        let mut entries = vec![
            entry("a", 2.0, 0.9, 0.9),
            entry("b", 1.0, 0.5, 0.5),
            entry("c", 1.0, 0.7, 0.1),
            entry("d", 1.0, 0.7, 0.3),
        ];
        rank(&mut entries);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_default_pool_covers_every_backend() {
        let pool = default_pool();
        let types: Vec<ModelType> = pool.iter().map(Candidate::model_type).collect();
        assert_eq!(types, ModelType::ALL.to_vec());
    }
}
