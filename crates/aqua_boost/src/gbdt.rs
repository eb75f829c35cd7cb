//! Gradient Boosted Decision Tree trainer (squared-error regression)
//!
//! Covers both the exact-greedy engine and the histogram engine; the latter is
//! the same loop with `max_bins` set, which restricts thresholds to quantile
//! edges computed once from the training matrix.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{quantile_edges, CartBuilder, SplitCandidates, TreeConfig};
use crate::errors::EngineError;
use crate::forest::Forest;
use crate::sampling::{check_fraction, check_training_data, sample_indices};

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GbdtConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub reg_lambda: f64,
    pub min_split_gain: f64,
    /// Row fraction drawn (without replacement) for each tree
    pub subsample: f64,
    /// Column fraction drawn for each tree
    pub colsample_bytree: f64,
    /// `Some(n)` switches to quantile-binned split candidates
    pub max_bins: Option<usize>,
    pub seed: u64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bins: None,
            seed: 42,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.n_estimators == 0 {
            return Err(EngineError::InvalidConfig("n_estimators must be > 0".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == 0 {
            return Err(EngineError::InvalidConfig("max_depth must be > 0".into()));
        }
        if !(self.reg_lambda >= 0.0) || !(self.min_split_gain >= 0.0) {
            return Err(EngineError::InvalidConfig(
                "reg_lambda and min_split_gain must be non-negative".into(),
            ));
        }
        check_fraction("subsample", self.subsample)?;
        check_fraction("colsample_bytree", self.colsample_bytree)?;
        if matches!(self.max_bins, Some(bins) if bins < 2) {
            return Err(EngineError::InvalidConfig("max_bins must be >= 2".into()));
        }
        Ok(())
    }

    pub(crate) fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            reg_lambda: self.reg_lambda,
            min_split_gain: self.min_split_gain,
        }
    }
}

/// Split candidates for a training matrix: exact, or quantile edges per column.
pub(crate) fn split_candidates(features: &[Vec<f64>], max_bins: Option<usize>) -> SplitCandidates {
    match max_bins {
        None => SplitCandidates::Exact,
        Some(bins) => {
            let feature_count = features.first().map_or(0, Vec::len);
            let edges = (0..feature_count)
                .map(|f| {
                    let column: Vec<f64> = features.iter().map(|row| row[f]).collect();
                    quantile_edges(&column, bins)
                })
                .collect();
            SplitCandidates::Binned(edges)
        }
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<Forest, EngineError> {
        self.config.validate()?;
        let feature_count = check_training_data(features, targets)?;
        let n_samples = features.len();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let candidates = split_candidates(features, self.config.max_bins);
        let tree_config = self.config.tree_config();

        let base_score = mean(targets);
        let mut predictions = vec![base_score; n_samples];
        let hessians = vec![1.0; n_samples];
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for tree_idx in 0..self.config.n_estimators {
            // Squared error: g = prediction - target, h = 1
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(p, t)| p - t)
                .collect();

            let rows = sample_indices(&mut rng, n_samples, self.config.subsample);
            let columns = sample_indices(&mut rng, feature_count, self.config.colsample_bytree);

            let builder = CartBuilder::new(
                &tree_config,
                features,
                &gradients,
                &hessians,
                &candidates,
                &columns,
            );
            let tree = builder.build(&rows, self.config.learning_rate);

            for (pred, row) in predictions.iter_mut().zip(features) {
                *pred += tree.contribution(row);
            }

            debug!(
                tree = tree_idx + 1,
                total = self.config.n_estimators,
                nodes = tree.nodes.len(),
                "tree trained"
            );
            trees.push(tree);
        }

        Ok(Forest::new(base_score, feature_count, trees))
    }
}
