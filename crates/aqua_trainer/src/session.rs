//! End-to-end model selection: split, compare, tune, report

use std::collections::BTreeMap;

use aqua_core::config::TrainingConfig;
use aqua_core::{DomainTransformer, FeatureSchema, InferencePipeline};
use chrono::Utc;
use tracing::{info, instrument};

use crate::cv::CrossValidator;
use crate::dataset::TrainingSet;
use crate::errors::{Result, TrainerError};
use crate::folds::FoldSplitter;
use crate::pool::{default_pool, evaluate_pool, score_pipeline, select_best, tune_top_k, Candidate, TuningOptions};
use crate::report::{FoldTable, OofReport, TrainingSummary};
use crate::search::CancelToken;
use crate::split::train_test_split;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    pub seed: u64,
    pub test_size: f64,
    pub n_folds: usize,
    pub n_iter: usize,
    pub top_k: usize,
    pub stratify_by_pharmaceutical: bool,
    /// Restricted to the columns present in the dataset before use
    pub schema: FeatureSchema,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for TrainingOptions {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            seed: config.seed,
            test_size: config.test_size,
            n_folds: config.n_folds,
            n_iter: config.n_iter,
            top_k: config.top_k,
            stratify_by_pharmaceutical: config.stratify_by_pharmaceutical,
            schema: FeatureSchema::default(),
        }
    }
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub pipeline: InferencePipeline,
    pub summary: TrainingSummary,
    pub oof: OofReport,
    /// Headline numbers stored in the artifact metadata
    pub cv_metrics: BTreeMap<String, f64>,
}

pub struct TrainingSession {
    options: TrainingOptions,
    candidates: Vec<Candidate>,
    cancel: CancelToken,
}

impl TrainingSession {
    pub fn new(options: TrainingOptions) -> Self {
        Self {
            options,
            candidates: default_pool(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Token that stops tuning after the trial in progress
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[instrument(skip_all, fields(rows = data.len()))]
    pub fn run(&self, data: &TrainingSet, transformer: &DomainTransformer) -> Result<TrainingOutcome> {
        let options = &self.options;
        let (train_idx, test_idx) = train_test_split(data.len(), options.test_size, options.seed)?;
        let train = data.subset(&train_idx);
        let test = data.subset(&test_idx);
        info!(train = train.len(), test = test.len(), "holdout split");
        let schema = train.schema(&options.schema);

        let splitter = FoldSplitter::new(options.n_folds, options.seed)
            .stratified(options.stratify_by_pharmaceutical);
        let validator = CrossValidator::new(splitter, schema);

        let pool = evaluate_pool(&self.candidates, &train, &test, &validator, transformer)?;
        info!(
            "Pool ranking: {}",
            pool.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(" > ")
        );

        let tuning = TuningOptions {
            top_k: options.top_k,
            n_iter: options.n_iter,
            seed: options.seed,
            cancel: self.cancel.clone(),
        };
        let tuned = tune_top_k(&pool, &self.candidates, &train, &validator, transformer, &tuning)?;
        let best = select_best(&tuned).ok_or(TrainerError::NoCandidates)?;
        info!(
            "Best model: {} ({}) with CV R2={:.4}",
            best.name, best.outcome.model_type, best.outcome.best_score
        );

        let report = best.report();
        let test_metrics = score_pipeline(&best.outcome.pipeline, &test)?;
        let oof = OofReport::build(&train, report, transformer.catalog());
        let folds = FoldTable::from_report(report);

        let mut cv_metrics = BTreeMap::new();
        cv_metrics.insert("cv_r2_mean".to_string(), folds.r2.mean);
        cv_metrics.insert("cv_r2_std".to_string(), folds.r2.std);
        cv_metrics.insert("cv_rmse_mean".to_string(), folds.rmse.mean);
        cv_metrics.insert("cv_mae_mean".to_string(), folds.mae.mean);
        cv_metrics.insert("oof_r2".to_string(), report.oof_metrics.r2);
        cv_metrics.insert("oof_rmse".to_string(), report.oof_metrics.rmse);
        cv_metrics.insert("oof_mae".to_string(), report.oof_metrics.mae);
        cv_metrics.insert("test_r2".to_string(), test_metrics.r2);
        cv_metrics.insert("test_rmse".to_string(), test_metrics.rmse);
        cv_metrics.insert("test_mae".to_string(), test_metrics.mae);

        let summary = TrainingSummary {
            created_at: Utc::now(),
            rows: data.len(),
            train_rows: train.len(),
            test_rows: test.len(),
            seed: options.seed,
            n_folds: options.n_folds,
            pool,
            tuning: tuned.iter().map(|t| t.summary()).collect(),
            best_name: best.name.clone(),
            best_model_type: best.outcome.model_type,
            best_params: best.outcome.best_params.clone(),
            best_folds: folds,
            oof: report.oof_metrics,
            test: test_metrics,
        };

        Ok(TrainingOutcome {
            pipeline: best.outcome.pipeline.clone(),
            summary,
            oof,
            cv_metrics,
        })
    }
}
