//! DART boosting (dropout for additive regression trees)
//!
//! Each round drops a random subset of the existing trees, fits the new tree
//! to the residual of the remaining ensemble and then normalizes: the new tree
//! gets weight `lr / (k + 1)` and every dropped tree is scaled by `k / (k + 1)`,
//! where `k` is the number of dropped trees.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::CartBuilder;
use crate::errors::EngineError;
use crate::forest::Forest;
use crate::gbdt::{mean, split_candidates, GbdtConfig};
use crate::sampling::{check_fraction, check_training_data, sample_indices};
use crate::tree::Tree;

/// DART configuration: the GBDT knobs plus the dropout schedule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DartConfig {
    pub boosting: GbdtConfig,
    /// Probability that each existing tree is dropped in a round
    pub drop_rate: f64,
    /// Probability of skipping dropout entirely in a round
    pub skip_drop: f64,
    /// Upper bound on trees dropped per round (0 = unbounded)
    pub max_drop: usize,
}

impl Default for DartConfig {
    fn default() -> Self {
        Self {
            boosting: GbdtConfig::default(),
            drop_rate: 0.1,
            skip_drop: 0.5,
            max_drop: 50,
        }
    }
}

impl DartConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.boosting.validate()?;
        check_fraction("drop_rate", self.drop_rate)?;
        if !(0.0..=1.0).contains(&self.skip_drop) {
            return Err(EngineError::InvalidConfig(format!(
                "skip_drop must be in [0, 1], got {}",
                self.skip_drop
            )));
        }
        Ok(())
    }
}

/// DART trainer
pub struct DartTrainer {
    config: DartConfig,
}

impl DartTrainer {
    pub fn new(config: DartConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<Forest, EngineError> {
        self.config.validate()?;
        let boosting = &self.config.boosting;
        let feature_count = check_training_data(features, targets)?;
        let n_samples = features.len();

        let mut rng = StdRng::seed_from_u64(boosting.seed);
        let candidates = split_candidates(features, boosting.max_bins);
        let tree_config = boosting.tree_config();

        let base_score = mean(targets);
        let mut predictions = vec![base_score; n_samples];
        let hessians = vec![1.0; n_samples];
        let mut trees: Vec<Tree> = Vec::with_capacity(boosting.n_estimators);
        // Weighted per-row output of each tree, kept in step with `trees`.
        let mut contributions: Vec<Vec<f64>> = Vec::with_capacity(boosting.n_estimators);

        for round in 0..boosting.n_estimators {
            let dropped = self.select_dropped(&mut rng, trees.len());

            let mut residual_base = predictions.clone();
            for &t in &dropped {
                for (p, c) in residual_base.iter_mut().zip(&contributions[t]) {
                    *p -= c;
                }
            }

            let gradients: Vec<f64> = residual_base
                .iter()
                .zip(targets)
                .map(|(p, t)| p - t)
                .collect();

            let rows = sample_indices(&mut rng, n_samples, boosting.subsample);
            let columns = sample_indices(&mut rng, feature_count, boosting.colsample_bytree);

            let k = dropped.len() as f64;
            let builder = CartBuilder::new(
                &tree_config,
                features,
                &gradients,
                &hessians,
                &candidates,
                &columns,
            );
            let tree = builder.build(&rows, boosting.learning_rate / (k + 1.0));

            let factor = k / (k + 1.0);
            for &t in &dropped {
                trees[t].weight *= factor;
                for (p, c) in predictions.iter_mut().zip(contributions[t].iter_mut()) {
                    let scaled = *c * factor;
                    *p += scaled - *c;
                    *c = scaled;
                }
            }

            let contribution: Vec<f64> = features.iter().map(|row| tree.contribution(row)).collect();
            for (p, c) in predictions.iter_mut().zip(&contribution) {
                *p += c;
            }

            debug!(
                tree = round + 1,
                total = boosting.n_estimators,
                dropped = dropped.len(),
                "dart round finished"
            );
            trees.push(tree);
            contributions.push(contribution);
        }

        Ok(Forest::new(base_score, feature_count, trees))
    }

    fn select_dropped(&self, rng: &mut StdRng, existing: usize) -> Vec<usize> {
        if existing == 0 || rng.gen::<f64>() < self.config.skip_drop {
            return Vec::new();
        }

        let mut dropped: Vec<usize> = (0..existing)
            .filter(|_| rng.gen::<f64>() < self.config.drop_rate)
            .collect();

        if self.config.max_drop > 0 && dropped.len() > self.config.max_drop {
            let keep = index::sample(rng, dropped.len(), self.config.max_drop).into_vec();
            let mut trimmed: Vec<usize> = keep.into_iter().map(|i| dropped[i]).collect();
            trimmed.sort_unstable();
            dropped = trimmed;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, ((i * 7) % 5) as f64]).collect();
        let targets = features.iter().map(|r| r[0] * r[0] / 10.0 + r[1]).collect();
        (features, targets)
    }

    #[test]
    fn test_dart_fits_signal() {
        let (features, targets) = data();
        let config = DartConfig {
            boosting: GbdtConfig {
                n_estimators: 60,
                max_depth: 4,
                learning_rate: 0.3,
                ..GbdtConfig::default()
            },
            ..DartConfig::default()
        };
        let forest = DartTrainer::new(config).train(&features, &targets).unwrap();
        assert_eq!(forest.num_trees(), 60);
        assert!(forest.validate().is_ok());

        let preds = forest.predict(&features).unwrap();
        let base = mean(&targets);
        let sse: f64 = preds.iter().zip(&targets).map(|(p, t)| (p - t).powi(2)).sum();
        let sst: f64 = targets.iter().map(|t| (t - base).powi(2)).sum();
        assert!(sse < 0.5 * sst);
    }

    #[test]
    fn test_no_dropout_matches_gbdt() {
        let (features, targets) = data();
        let boosting = GbdtConfig {
            n_estimators: 15,
            ..GbdtConfig::default()
        };
        let dart = DartConfig {
            boosting: boosting.clone(),
            skip_drop: 1.0,
            ..DartConfig::default()
        };
        let a = DartTrainer::new(dart).train(&features, &targets).unwrap();
        let b = crate::gbdt::GbdtTrainer::new(boosting)
            .train(&features, &targets)
            .unwrap();
        for row in &features {
            assert!((a.predict_row(row) - b.predict_row(row)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dart_is_deterministic() {
        let (features, targets) = data();
        let config = DartConfig {
            boosting: GbdtConfig {
                n_estimators: 20,
                ..GbdtConfig::default()
            },
            skip_drop: 0.0,
            ..DartConfig::default()
        };
        let a = DartTrainer::new(config.clone()).train(&features, &targets).unwrap();
        let b = DartTrainer::new(config).train(&features, &targets).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_drop_rate() {
        let (features, targets) = data();
        let config = DartConfig {
            drop_rate: 1.5,
            ..DartConfig::default()
        };
        assert!(DartTrainer::new(config).train(&features, &targets).is_err());
    }
}
