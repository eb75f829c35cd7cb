//! Uniform estimator contract over the boosting backends

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{EstimatorError, UnknownModelType};
use crate::params::ParamMap;

/// Backend tag, persisted as `model_type` in artifacts and metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Exact-greedy gradient boosted trees
    Gbdt,
    /// Histogram (quantile-binned) gradient boosting
    HistGbdt,
    /// Boosting with tree dropout
    Dart,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [ModelType::Gbdt, ModelType::HistGbdt, ModelType::Dart];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Gbdt => "gbdt",
            ModelType::HistGbdt => "hist_gbdt",
            ModelType::Dart => "dart",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = UnknownModelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gbdt" => Ok(ModelType::Gbdt),
            "hist_gbdt" => Ok(ModelType::HistGbdt),
            "dart" => Ok(ModelType::Dart),
            other => Err(UnknownModelType(other.to_string())),
        }
    }
}

/// Fit/predict/params contract shared by every backend.
///
/// Parameters are free to change until `fit`. A fitted instance rejects both a
/// second `fit` and `set_params` until `reset` discards the trained state.
pub trait Estimator: Send + Sync {
    fn backend(&self) -> ModelType;

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError>;

    /// Current parameters under their common names
    fn get_params(&self) -> ParamMap;

    /// Apply the given parameters; names not present are left untouched.
    fn set_params(&mut self, params: &ParamMap) -> Result<(), EstimatorError>;

    fn is_fitted(&self) -> bool;

    /// Drop the trained state, keeping the parameters.
    fn reset(&mut self);

    /// Same backend and parameters, untrained
    fn clone_unfitted(&self) -> Self
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_names() {
        for model_type in ModelType::ALL {
            assert_eq!(model_type.as_str().parse::<ModelType>(), Ok(model_type));
        }
        assert_eq!(" DART ".parse::<ModelType>(), Ok(ModelType::Dart));
        assert_eq!(
            "xgboost".parse::<ModelType>(),
            Err(UnknownModelType("xgboost".into()))
        );
        assert_eq!(
            serde_json::to_string(&ModelType::HistGbdt).unwrap(),
            "\"hist_gbdt\""
        );
    }
}
