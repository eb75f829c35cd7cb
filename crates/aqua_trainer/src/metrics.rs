//! Regression metrics

use serde::{Deserialize, Serialize};

/// Coefficient of determination. A constant target scores 1.0 when matched
/// exactly and 0.0 otherwise.
pub fn r2(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    mse.sqrt()
}

pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return f64::NAN;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Absolute percentage error, `None` when the true value is zero.
pub fn ape_pct(y_true: f64, y_pred: f64) -> Option<f64> {
    (y_true != 0.0).then(|| (y_pred - y_true).abs() / y_true.abs() * 100.0)
}

/// Mean absolute percentage error over rows with a non-zero target.
pub fn mape(y_true: &[f64], y_pred: &[f64]) -> Option<f64> {
    let apes: Vec<f64> = y_true
        .iter()
        .zip(y_pred)
        .filter_map(|(&t, &p)| ape_pct(t, p))
        .collect();
    (!apes.is_empty()).then(|| apes.iter().sum::<f64>() / apes.len() as f64)
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub n: usize,
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Self {
        Self {
            n: y_true.len(),
            r2: r2(y_true, y_pred),
            rmse: rmse(y_true, y_pred),
            mae: mae(y_true, y_pred),
        }
    }
}
