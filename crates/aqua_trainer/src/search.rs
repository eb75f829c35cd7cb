//! Randomized hyperparameter search over k-fold cross-validation
//!
//! Trials run one after another; each samples its parameters (in sorted-name
//! order) from a single seeded RNG, so a fixed seed reproduces the whole
//! search. Folds inside a trial run in parallel.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use aqua_boost::{format_params, Estimator, ModelType, ParamMap, ParamValue, Regressor};
use aqua_core::{DomainTransformer, InferencePipeline};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cv::{fit_pipeline, CrossValidator, CvReport};
use crate::dataset::TrainingSet;
use crate::errors::{CvError, SearchError};

/// Where a parameter's values come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Choice { values: Vec<ParamValue> },
    Uniform { low: f64, high: f64 },
    LogUniform { low: f64, high: f64 },
    /// Inclusive on both ends
    IntRange { low: i64, high: i64 },
}

impl Distribution {
    pub fn choice<T: Into<ParamValue>>(values: impl IntoIterator<Item = T>) -> Self {
        Distribution::Choice {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), SearchError> {
        let problem = match self {
            Distribution::Choice { values } if values.is_empty() => Some("no values to choose from"),
            Distribution::Uniform { low, high } if !(low.is_finite() && high.is_finite() && low <= high) => {
                Some("bounds must be finite with low <= high")
            }
            Distribution::LogUniform { low, high } if !(*low > 0.0 && high.is_finite() && low <= high) => {
                Some("bounds must be positive with low <= high")
            }
            Distribution::IntRange { low, high } if low > high => Some("low must not exceed high"),
            _ => None,
        };
        match problem {
            Some(reason) => Err(SearchError::InvalidDistribution {
                name: name.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn sample(&self, rng: &mut StdRng) -> ParamValue {
        match self {
            Distribution::Choice { values } => values
                .choose(rng)
                .cloned()
                .unwrap_or(ParamValue::Float(f64::NAN)),
            Distribution::Uniform { low, high } => {
                ParamValue::Float(low + (high - low) * rng.gen::<f64>())
            }
            Distribution::LogUniform { low, high } => {
                let (a, b) = (low.ln(), high.ln());
                ParamValue::Float((a + (b - a) * rng.gen::<f64>()).exp())
            }
            Distribution::IntRange { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
        }
    }
}

/// `n` values spaced evenly in log10 between `10^start` and `10^end`
pub fn logspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    aqua_core::linspace(start, end, n)
        .into_iter()
        .map(|e| 10f64.powf(e))
        .collect()
}

/// Parameter name → distribution, iterated in sorted-name order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSpace(BTreeMap<String, Distribution>);

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, distribution: Distribution) -> Self {
        self.0.insert(name.to_string(), distribution);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        self.0.iter().try_for_each(|(name, d)| d.validate(name))
    }

    pub fn sample(&self, rng: &mut StdRng) -> ParamMap {
        self.0
            .iter()
            .map(|(name, d)| (name.clone(), d.sample(rng)))
            .collect()
    }

    /// Default search space per backend.
    pub fn default_for(model_type: ModelType) -> Self {
        let learning_rate = Distribution::choice(logspace(-3.0, -1.0, 15));
        match model_type {
            ModelType::Gbdt => Self::new()
                .with("n_estimators", Distribution::choice([400i64, 700, 1000, 1500]))
                .with("max_depth", Distribution::choice([3i64, 5, 7, 9]))
                .with("learning_rate", learning_rate)
                .with("subsample", Distribution::choice(aqua_core::linspace(0.6, 1.0, 5)))
                .with("colsample_bytree", Distribution::choice(aqua_core::linspace(0.6, 1.0, 5)))
                .with("reg_lambda", Distribution::choice(logspace(-6.0, -1.0, 10))),
            ModelType::HistGbdt => Self::new()
                .with("learning_rate", learning_rate)
                .with("max_iter", Distribution::choice([300i64, 500, 800, 1000]))
                .with("max_depth", Distribution::choice([3i64, 5, 7, 9]))
                .with("l2_regularization", Distribution::choice(logspace(-8.0, -2.0, 8)))
                .with("min_samples_leaf", Distribution::choice([5i64, 10, 15, 20, 30])),
            ModelType::Dart => Self::new()
                .with("num_leaves", Distribution::choice([31i64, 63, 127, 255]))
                .with("learning_rate", learning_rate)
                .with("n_estimators", Distribution::choice([600i64, 900, 1200, 1500])),
        }
    }
}

/// Cooperative cancellation, checked between trials
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialStatus {
    Completed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: usize,
    pub params: ParamMap,
    /// Mean validation R², `-inf` for failed trials
    #[serde(with = "score_repr")]
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
    #[serde(flatten)]
    pub status: TrialStatus,
}

impl TrialResult {
    pub fn is_completed(&self) -> bool {
        self.status == TrialStatus::Completed
    }
}

/// JSON has no infinities; failed scores are written as `null`.
mod score_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// Search results plus the pipeline re-fitted with the winning parameters
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub model_type: ModelType,
    /// Full parameter set of the winning estimator
    pub best_params: ParamMap,
    pub best_trial: usize,
    pub best_score: f64,
    pub best_fold_scores: Vec<f64>,
    pub best_report: CvReport,
    pub trials: Vec<TrialResult>,
    pub cancelled: bool,
    pub pipeline: InferencePipeline,
}

pub struct RandomizedSearch<'a> {
    base: Regressor,
    space: ParamSpace,
    validator: &'a CrossValidator,
    n_iter: usize,
    seed: u64,
    cancel: CancelToken,
}

impl<'a> RandomizedSearch<'a> {
    pub fn new(base: Regressor, space: ParamSpace, validator: &'a CrossValidator) -> Self {
        Self {
            base,
            space,
            validator,
            n_iter: 30,
            seed: 42,
            cancel: CancelToken::new(),
        }
    }

    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run(
        &self,
        data: &TrainingSet,
        transformer: &DomainTransformer,
    ) -> Result<SearchOutcome, SearchError> {
        if self.n_iter == 0 {
            return Err(SearchError::NoTrials);
        }
        self.space.validate()?;

        let backend = self.base.backend();
        info!(%backend, trials = self.n_iter, seed = self.seed, "starting randomized search");

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trials = Vec::with_capacity(self.n_iter);
        let mut best: Option<(usize, Regressor, CvReport)> = None;
        let mut cancelled = false;

        for trial in 0..self.n_iter {
            if self.cancel.is_cancelled() {
                warn!(%backend, completed = trial, "search cancelled");
                cancelled = true;
                break;
            }

            let params = self.space.sample(&mut rng);
            let result = match self.run_trial(data, &params)? {
                TrialOutcome::Scored(candidate, report) => {
                    let mean_score = report.r2().mean;
                    info!(%backend, trial, score = mean_score, params = %format_params(&params), "trial complete");
                    let is_better = best
                        .as_ref()
                        .map_or(true, |(_, _, r)| mean_score > r.r2().mean);
                    let fold_scores = report.fold_scores();
                    if is_better {
                        best = Some((trial, candidate, report));
                    }
                    TrialResult {
                        trial,
                        params,
                        mean_score,
                        fold_scores,
                        status: TrialStatus::Completed,
                    }
                }
                TrialOutcome::Failed(reason) => {
                    warn!(%backend, trial, %reason, "trial failed");
                    TrialResult {
                        trial,
                        params,
                        mean_score: f64::NEG_INFINITY,
                        fold_scores: Vec::new(),
                        status: TrialStatus::Failed { reason },
                    }
                }
            };
            trials.push(result);
        }

        let Some((best_trial, winner, best_report)) = best else {
            return Err(if cancelled {
                SearchError::Cancelled
            } else {
                SearchError::AllTrialsFailed {
                    trials: trials.len(),
                }
            });
        };

        let pipeline = fit_pipeline(data, self.validator.schema(), &winner, transformer)
            .map_err(SearchError::Refit)?;
        let best_score = best_report.r2().mean;
        info!(%backend, best_trial, best_score, "search finished");

        Ok(SearchOutcome {
            model_type: backend,
            best_params: winner.get_params(),
            best_trial,
            best_score,
            best_fold_scores: best_report.fold_scores(),
            best_report,
            trials,
            cancelled,
            pipeline,
        })
    }

    /// Estimator failures fail the trial; anything else fails the search.
    fn run_trial(&self, data: &TrainingSet, params: &ParamMap) -> Result<TrialOutcome, SearchError> {
        let mut candidate = self.base.clone_unfitted();
        if let Err(err) = candidate.set_params(params) {
            return Ok(TrialOutcome::Failed(err.to_string()));
        }
        match self.validator.evaluate(data, &candidate) {
            Ok(report) if report.r2().mean.is_finite() => Ok(TrialOutcome::Scored(candidate, report)),
            Ok(_) => Ok(TrialOutcome::Failed("non-finite validation score".to_string())),
            Err(CvError::Estimator(err)) => Ok(TrialOutcome::Failed(err.to_string())),
            Err(err) => Err(SearchError::Evaluation(err)),
        }
    }
}

enum TrialOutcome {
    Scored(Regressor, CvReport),
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distributions_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let u = Distribution::Uniform { low: 0.5, high: 1.0 }.sample(&mut rng);
            assert!((0.5..=1.0).contains(&u.as_f64().unwrap()));
            let l = Distribution::LogUniform { low: 1e-3, high: 1e-1 }.sample(&mut rng);
            assert!((1e-3 - 1e-12..=1e-1 + 1e-12).contains(&l.as_f64().unwrap()));
            let i = Distribution::IntRange { low: 2, high: 4 }.sample(&mut rng);
            assert!((2..=4).contains(&i.as_i64().unwrap()));
            let c = Distribution::choice(["a", "b"]).sample(&mut rng);
            assert!(matches!(c.as_str(), Some("a") | Some("b")));
        }
    }

    #[test]
    fn test_invalid_distributions() {
        assert!(Distribution::choice(Vec::<i64>::new()).validate("x").is_err());
        assert!(Distribution::LogUniform { low: 0.0, high: 1.0 }.validate("x").is_err());
        assert!(Distribution::Uniform { low: 2.0, high: 1.0 }.validate("x").is_err());
        assert!(Distribution::IntRange { low: 5, high: 1 }.validate("x").is_err());
        assert!(Distribution::IntRange { low: 1, high: 1 }.validate("x").is_ok());
    }

    #[test]
    fn test_logspace() {
        let values = logspace(-3.0, -1.0, 3);
        assert_eq!(values.len(), 3);
        assert!((values[0] - 1e-3).abs() < 1e-15);
        assert!((values[1] - 1e-2).abs() < 1e-15);
        assert!((values[2] - 1e-1).abs() < 1e-15);
    }

    #[test]
    fn test_sampling_is_seeded() {
        let space = ParamSpace::default_for(ModelType::Gbdt);
        let a = space.sample(&mut StdRng::seed_from_u64(9));
        let b = space.sample(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn test_default_spaces_are_accepted_by_their_backends() {
        let mut rng = StdRng::seed_from_u64(3);
        for model_type in ModelType::ALL {
            let space = ParamSpace::default_for(model_type);
            space.validate().unwrap();
            for _ in 0..10 {
                let params = space.sample(&mut rng);
                let mut estimator = Regressor::new(model_type);
                estimator.set_params(&params).unwrap();
            }
        }
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_trial_result_json_handles_failed_score() {
        let trial = TrialResult {
            trial: 3,
            params: ParamMap::new(),
            mean_score: f64::NEG_INFINITY,
            fold_scores: Vec::new(),
            status: TrialStatus::Failed {
                reason: "boom".into(),
            },
        };
        let json = serde_json::to_string(&trial).unwrap();
        assert!(json.contains("\"mean_score\":null"));
        assert!(json.contains("\"status\":\"failed\""));
        let back: TrialResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trial);
    }
}
