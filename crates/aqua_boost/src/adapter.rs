//! Backend adapters and the tagged `Regressor` enum
//!
//! Each adapter owns a native config plus the trained forest (if any) and
//! translates the common parameter vocabulary into that config. `Regressor`
//! selects the adapter by its `model_type` tag and is what artifacts persist.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dart::{DartConfig, DartTrainer};
use crate::errors::{EngineError, EstimatorError};
use crate::estimator::{Estimator, ModelType};
use crate::forest::Forest;
use crate::gbdt::{GbdtConfig, GbdtTrainer};
use crate::params::{ParamMap, ParamValue};

fn invalid(backend: ModelType, message: impl Into<String>) -> EstimatorError {
    EstimatorError::new(backend.as_str(), message)
}

fn engine(backend: ModelType, err: EngineError) -> EstimatorError {
    EstimatorError::from_engine(backend.as_str(), err)
}

fn as_f64(backend: ModelType, name: &str, value: &ParamValue) -> Result<f64, EstimatorError> {
    value
        .as_f64()
        .ok_or_else(|| invalid(backend, format!("parameter {name} expects a number, got {value}")))
}

fn as_usize(backend: ModelType, name: &str, value: &ParamValue) -> Result<usize, EstimatorError> {
    value.as_usize().ok_or_else(|| {
        invalid(
            backend,
            format!("parameter {name} expects a non-negative integer, got {value}"),
        )
    })
}

/// Smallest depth whose full binary tree has at least `leaves` leaves
fn depth_for_leaves(leaves: usize) -> usize {
    let mut depth = 1;
    while (1usize << depth) < leaves && depth < 32 {
        depth += 1;
    }
    depth
}

/// Apply one of the shared parameter names (or an alias) to a boosting config.
/// Returns `Ok(false)` when the name is not part of the shared vocabulary.
fn apply_common(
    backend: ModelType,
    config: &mut GbdtConfig,
    name: &str,
    value: &ParamValue,
) -> Result<bool, EstimatorError> {
    match name {
        "n_estimators" | "max_iter" => config.n_estimators = as_usize(backend, name, value)?,
        "learning_rate" => config.learning_rate = as_f64(backend, name, value)?,
        "max_depth" => config.max_depth = as_usize(backend, name, value)?,
        "num_leaves" => config.max_depth = depth_for_leaves(as_usize(backend, name, value)?),
        "min_samples_leaf" | "min_child_samples" => {
            config.min_samples_leaf = as_usize(backend, name, value)?
        }
        "reg_lambda" | "l2_regularization" => config.reg_lambda = as_f64(backend, name, value)?,
        "min_split_gain" => config.min_split_gain = as_f64(backend, name, value)?,
        "subsample" => config.subsample = as_f64(backend, name, value)?,
        "colsample_bytree" => config.colsample_bytree = as_f64(backend, name, value)?,
        "random_state" => config.seed = as_usize(backend, name, value)? as u64,
        _ => return Ok(false),
    }
    Ok(true)
}

fn common_params(config: &GbdtConfig) -> ParamMap {
    let mut params = ParamMap::new();
    params.insert("n_estimators".into(), config.n_estimators.into());
    params.insert("learning_rate".into(), config.learning_rate.into());
    params.insert("max_depth".into(), config.max_depth.into());
    params.insert("min_samples_leaf".into(), config.min_samples_leaf.into());
    params.insert("reg_lambda".into(), config.reg_lambda.into());
    params.insert("min_split_gain".into(), config.min_split_gain.into());
    params.insert("subsample".into(), config.subsample.into());
    params.insert("colsample_bytree".into(), config.colsample_bytree.into());
    params.insert("random_state".into(), ParamValue::Int(config.seed as i64));
    params
}

fn ensure_unfitted(backend: ModelType, fitted: bool, action: &str) -> Result<(), EstimatorError> {
    if fitted {
        return Err(invalid(
            backend,
            format!("cannot {action} a fitted estimator; reset it first"),
        ));
    }
    Ok(())
}

fn predict_with(
    backend: ModelType,
    forest: Option<&Forest>,
    features: &[Vec<f64>],
) -> Result<Vec<f64>, EstimatorError> {
    let forest = forest.ok_or_else(|| invalid(backend, "estimator is not fitted"))?;
    forest.predict(features).map_err(|e| engine(backend, e))
}

/// Exact-greedy boosted trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtAdapter {
    pub config: GbdtConfig,
    pub forest: Option<Forest>,
}

impl Default for GbdtAdapter {
    fn default() -> Self {
        Self {
            config: GbdtConfig {
                n_estimators: 1500,
                learning_rate: 0.05,
                max_depth: 8,
                min_samples_leaf: 1,
                reg_lambda: 1.0,
                min_split_gain: 0.0,
                subsample: 0.8,
                colsample_bytree: 0.8,
                max_bins: None,
                seed: 42,
            },
            forest: None,
        }
    }
}

impl Estimator for GbdtAdapter {
    fn backend(&self) -> ModelType {
        ModelType::Gbdt
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError> {
        let backend = self.backend();
        ensure_unfitted(backend, self.is_fitted(), "fit")?;
        debug!(backend = %backend, rows = features.len(), "fitting estimator");
        let forest = GbdtTrainer::new(self.config.clone())
            .train(features, targets)
            .map_err(|e| engine(backend, e))?;
        self.forest = Some(forest);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        predict_with(self.backend(), self.forest.as_ref(), features)
    }

    fn get_params(&self) -> ParamMap {
        common_params(&self.config)
    }

    fn set_params(&mut self, params: &ParamMap) -> Result<(), EstimatorError> {
        let backend = self.backend();
        ensure_unfitted(backend, self.is_fitted(), "reconfigure")?;
        let mut config = self.config.clone();
        for (name, value) in params {
            if !apply_common(backend, &mut config, name, value)? {
                return Err(invalid(backend, format!("unknown parameter: {name}")));
            }
        }
        config.validate().map_err(|e| engine(backend, e))?;
        self.config = config;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.forest.is_some()
    }

    fn reset(&mut self) {
        self.forest = None;
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            config: self.config.clone(),
            forest: None,
        }
    }
}

/// Histogram gradient boosting: the GBDT engine restricted to quantile bins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistGbdtAdapter {
    pub config: GbdtConfig,
    pub forest: Option<Forest>,
}

impl Default for HistGbdtAdapter {
    fn default() -> Self {
        Self {
            config: GbdtConfig {
                n_estimators: 500,
                learning_rate: 0.08,
                max_depth: 6,
                min_samples_leaf: 20,
                reg_lambda: 0.0,
                min_split_gain: 0.0,
                subsample: 1.0,
                colsample_bytree: 1.0,
                max_bins: Some(255),
                seed: 42,
            },
            forest: None,
        }
    }
}

impl Estimator for HistGbdtAdapter {
    fn backend(&self) -> ModelType {
        ModelType::HistGbdt
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError> {
        let backend = self.backend();
        ensure_unfitted(backend, self.is_fitted(), "fit")?;
        debug!(backend = %backend, rows = features.len(), "fitting estimator");
        let forest = GbdtTrainer::new(self.config.clone())
            .train(features, targets)
            .map_err(|e| engine(backend, e))?;
        self.forest = Some(forest);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        predict_with(self.backend(), self.forest.as_ref(), features)
    }

    fn get_params(&self) -> ParamMap {
        let mut params = common_params(&self.config);
        params.insert("max_bins".into(), self.config.max_bins.unwrap_or(255).into());
        params
    }

    fn set_params(&mut self, params: &ParamMap) -> Result<(), EstimatorError> {
        let backend = self.backend();
        ensure_unfitted(backend, self.is_fitted(), "reconfigure")?;
        let mut config = self.config.clone();
        for (name, value) in params {
            if name == "max_bins" {
                config.max_bins = Some(as_usize(backend, name, value)?);
            } else if !apply_common(backend, &mut config, name, value)? {
                return Err(invalid(backend, format!("unknown parameter: {name}")));
            }
        }
        if config.max_bins.is_none() {
            config.max_bins = Some(255);
        }
        config.validate().map_err(|e| engine(backend, e))?;
        self.config = config;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.forest.is_some()
    }

    fn reset(&mut self) {
        self.forest = None;
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            config: self.config.clone(),
            forest: None,
        }
    }
}

/// Dropout boosting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DartAdapter {
    pub config: DartConfig,
    pub forest: Option<Forest>,
}

impl Default for DartAdapter {
    fn default() -> Self {
        Self {
            config: DartConfig {
                boosting: GbdtConfig {
                    n_estimators: 1500,
                    learning_rate: 0.05,
                    // 63 leaves
                    max_depth: depth_for_leaves(63),
                    min_samples_leaf: 20,
                    reg_lambda: 0.0,
                    min_split_gain: 0.0,
                    subsample: 1.0,
                    colsample_bytree: 1.0,
                    max_bins: Some(255),
                    seed: 42,
                },
                drop_rate: 0.1,
                skip_drop: 0.5,
                max_drop: 50,
            },
            forest: None,
        }
    }
}

impl Estimator for DartAdapter {
    fn backend(&self) -> ModelType {
        ModelType::Dart
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError> {
        let backend = self.backend();
        ensure_unfitted(backend, self.is_fitted(), "fit")?;
        debug!(backend = %backend, rows = features.len(), "fitting estimator");
        let forest = DartTrainer::new(self.config.clone())
            .train(features, targets)
            .map_err(|e| engine(backend, e))?;
        self.forest = Some(forest);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        predict_with(self.backend(), self.forest.as_ref(), features)
    }

    fn get_params(&self) -> ParamMap {
        let mut params = common_params(&self.config.boosting);
        params.insert("drop_rate".into(), self.config.drop_rate.into());
        params.insert("skip_drop".into(), self.config.skip_drop.into());
        params.insert("max_drop".into(), self.config.max_drop.into());
        params
    }

    fn set_params(&mut self, params: &ParamMap) -> Result<(), EstimatorError> {
        let backend = self.backend();
        ensure_unfitted(backend, self.is_fitted(), "reconfigure")?;
        let mut config = self.config.clone();
        for (name, value) in params {
            match name.as_str() {
                "drop_rate" => config.drop_rate = as_f64(backend, name, value)?,
                "skip_drop" => config.skip_drop = as_f64(backend, name, value)?,
                "max_drop" => config.max_drop = as_usize(backend, name, value)?,
                "max_bins" => config.boosting.max_bins = Some(as_usize(backend, name, value)?),
                _ => {
                    if !apply_common(backend, &mut config.boosting, name, value)? {
                        return Err(invalid(backend, format!("unknown parameter: {name}")));
                    }
                }
            }
        }
        config.validate().map_err(|e| engine(backend, e))?;
        self.config = config;
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.forest.is_some()
    }

    fn reset(&mut self) {
        self.forest = None;
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            config: self.config.clone(),
            forest: None,
        }
    }
}

/// Any backend, selected by its `model_type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum Regressor {
    Gbdt(GbdtAdapter),
    HistGbdt(HistGbdtAdapter),
    Dart(DartAdapter),
}

impl Regressor {
    /// Backend with its default parameters
    pub fn new(model_type: ModelType) -> Self {
        match model_type {
            ModelType::Gbdt => Regressor::Gbdt(GbdtAdapter::default()),
            ModelType::HistGbdt => Regressor::HistGbdt(HistGbdtAdapter::default()),
            ModelType::Dart => Regressor::Dart(DartAdapter::default()),
        }
    }

    pub fn with_params(model_type: ModelType, params: &ParamMap) -> Result<Self, EstimatorError> {
        let mut regressor = Self::new(model_type);
        regressor.set_params(params)?;
        Ok(regressor)
    }

    pub fn forest(&self) -> Option<&Forest> {
        match self {
            Regressor::Gbdt(a) => a.forest.as_ref(),
            Regressor::HistGbdt(a) => a.forest.as_ref(),
            Regressor::Dart(a) => a.forest.as_ref(),
        }
    }

    /// Number of input features the trained forest expects
    pub fn feature_count(&self) -> Option<usize> {
        self.forest().map(|f| f.feature_count)
    }

    /// Structural check of a trained state, typically after deserialization.
    pub fn validate(&self) -> Result<(), EstimatorError> {
        let backend = self.backend();
        match self.forest() {
            Some(forest) => forest.validate().map_err(|e| engine(backend, e)),
            None => Err(invalid(backend, "estimator is not fitted")),
        }
    }

    fn inner(&self) -> &dyn Estimator {
        match self {
            Regressor::Gbdt(a) => a,
            Regressor::HistGbdt(a) => a,
            Regressor::Dart(a) => a,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Estimator {
        match self {
            Regressor::Gbdt(a) => a,
            Regressor::HistGbdt(a) => a,
            Regressor::Dart(a) => a,
        }
    }
}

impl Estimator for Regressor {
    fn backend(&self) -> ModelType {
        self.inner().backend()
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError> {
        self.inner_mut().fit(features, targets)
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        self.inner().predict(features)
    }

    fn get_params(&self) -> ParamMap {
        self.inner().get_params()
    }

    fn set_params(&mut self, params: &ParamMap) -> Result<(), EstimatorError> {
        self.inner_mut().set_params(params)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }

    fn clone_unfitted(&self) -> Self {
        match self {
            Regressor::Gbdt(a) => Regressor::Gbdt(a.clone_unfitted()),
            Regressor::HistGbdt(a) => Regressor::HistGbdt(a.clone_unfitted()),
            Regressor::Dart(a) => Regressor::Dart(a.clone_unfitted()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_for_leaves() {
        assert_eq!(depth_for_leaves(2), 1);
        assert_eq!(depth_for_leaves(31), 5);
        assert_eq!(depth_for_leaves(63), 6);
        assert_eq!(depth_for_leaves(64), 6);
    }

    #[test]
    fn test_aliases_map_to_common_names() {
        let mut params = ParamMap::new();
        params.insert("max_iter".into(), ParamValue::Int(40));
        params.insert("l2_regularization".into(), ParamValue::Float(0.5));
        let regressor = Regressor::with_params(ModelType::HistGbdt, &params).unwrap();
        let current = regressor.get_params();
        assert_eq!(current["n_estimators"], ParamValue::Int(40));
        assert_eq!(current["reg_lambda"], ParamValue::Float(0.5));
        assert_eq!(current["max_bins"], ParamValue::Int(255));
    }

    #[test]
    fn test_unknown_parameter_is_rejected() {
        let mut params = ParamMap::new();
        params.insert("booster".into(), ParamValue::from("gblinear"));
        let err = Regressor::with_params(ModelType::Gbdt, &params).unwrap_err();
        assert_eq!(err.backend, "gbdt");
        assert!(err.message.contains("booster"));
    }

    #[test]
    fn test_invalid_value_leaves_config_untouched() {
        let mut regressor = Regressor::new(ModelType::Dart);
        let before = regressor.get_params();
        let mut params = ParamMap::new();
        params.insert("max_depth".into(), ParamValue::Int(3));
        params.insert("subsample".into(), ParamValue::Float(1.5));
        assert!(regressor.set_params(&params).is_err());
        assert_eq!(regressor.get_params(), before);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let regressor = Regressor::new(ModelType::Gbdt);
        assert!(!regressor.is_fitted());
        assert!(regressor.predict(&[vec![1.0]]).is_err());
        assert!(regressor.validate().is_err());
    }
}
