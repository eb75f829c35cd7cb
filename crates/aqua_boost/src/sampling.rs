//! Seeded row/column subsampling and training-data checks

use rand::rngs::StdRng;
use rand::seq::index;

use crate::errors::EngineError;

/// Check a feature matrix and targets before training; returns the feature count.
pub fn check_training_data(features: &[Vec<f64>], targets: &[f64]) -> Result<usize, EngineError> {
    if features.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    if features.len() != targets.len() {
        return Err(EngineError::LengthMismatch {
            rows: features.len(),
            targets: targets.len(),
        });
    }

    let feature_count = features[0].len();
    for (row, values) in features.iter().enumerate() {
        if values.len() != feature_count {
            return Err(EngineError::FeatureCountMismatch {
                row,
                expected: feature_count,
                actual: values.len(),
            });
        }
        if let Some(column) = values.iter().position(|v| !v.is_finite()) {
            return Err(EngineError::NonFiniteFeature { row, column });
        }
    }
    if let Some(row) = targets.iter().position(|t| !t.is_finite()) {
        return Err(EngineError::NonFiniteTarget { row });
    }

    Ok(feature_count)
}

/// Check that a fraction parameter lies in (0, 1].
pub fn check_fraction(name: &str, value: f64) -> Result<(), EngineError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "{name} must be in (0, 1], got {value}"
        )))
    }
}

/// Sorted subset of `0..n` of size `ceil(fraction·n)` (at least one).
pub fn sample_indices(rng: &mut StdRng, n: usize, fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 || n <= 1 {
        return (0..n).collect();
    }
    let amount = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
    let mut picked = index::sample(rng, n, amount).into_vec();
    picked.sort_unstable();
    picked
}
