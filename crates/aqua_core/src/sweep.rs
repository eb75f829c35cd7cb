//! Sensitivity sweeps and pharmaceutical comparison over a base record

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::DESCRIPTOR_FIELDS;
use crate::errors::ValidationError;
use crate::pipeline::{InferencePipeline, Prediction, RecordError};
use crate::record::{RawRecord, ACTIVATION_ATMOSPHERE, TARGET_PHAR};

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// One variant of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: f64,
    pub prediction: Prediction,
}

/// Prediction for the base record re-targeted to one pharmaceutical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmaComparison {
    pub code: String,
    pub display_name: String,
    pub prediction: Prediction,
}

/// Vary `field` over `values` (other fields fixed); results in value order.
pub fn sweep_values(
    pipeline: &InferencePipeline,
    base: &RawRecord,
    field: &str,
    values: &[f64],
) -> Result<Vec<SweepPoint>, RecordError> {
    let field = field.trim();
    if field == TARGET_PHAR || field == ACTIVATION_ATMOSPHERE {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "categorical fields cannot be swept numerically".into(),
        }
        .into());
    }
    if DESCRIPTOR_FIELDS.contains(&field) || field.ends_with("_molar") {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "derived field is recomputed from other inputs".into(),
        }
        .into());
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("non-finite sweep value {bad}"),
        }
        .into());
    }

    // Fail once on an invalid base rather than once per variant.
    pipeline.transformer().transform(base)?;

    debug!(field, points = values.len(), "running sensitivity sweep");
    values
        .iter()
        .map(|&value| {
            let variant = base.clone().with(field, value);
            pipeline
                .predict(&variant)
                .map(|prediction| SweepPoint { value, prediction })
        })
        .collect()
}

/// `linspace(start, end, n)` sweep of one field
pub fn sweep(
    pipeline: &InferencePipeline,
    base: &RawRecord,
    field: &str,
    start: f64,
    end: f64,
    n: usize,
) -> Result<Vec<SweepPoint>, RecordError> {
    sweep_values(pipeline, base, field, &linspace(start, end, n))
}

/// Predict the base record for every catalog code, in catalog order.
pub fn compare_pharmaceuticals(
    pipeline: &InferencePipeline,
    base: &RawRecord,
) -> Result<Vec<PharmaComparison>, RecordError> {
    let catalog = pipeline.transformer().catalog();
    catalog
        .entries()
        .iter()
        .map(|entry| {
            let variant = base.clone().with(TARGET_PHAR, entry.code.as_str());
            pipeline.predict(&variant).map(|prediction| PharmaComparison {
                code: entry.code.clone(),
                display_name: entry.display_name.clone(),
                prediction,
            })
        })
        .collect()
}
