//! Model artifacts: canonical JSON bundle plus validated metadata
//!
//! An artifact is a directory holding `model.json` (the fitted preprocessor and
//! estimator, serialized as canonical JSON with sorted keys) and
//! `model.meta.json`. The metadata records the feature order and a BLAKE3 hash
//! of `model.json`; any disagreement at load time refuses to serve the model.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use aqua_boost::{Estimator, ModelType, ParamMap, Regressor};
use chrono::{DateTime, Utc};
use serde::{ser::Error as SerdeSerError, Deserialize, Serialize};
use serde_json::{map::Map, ser::PrettyFormatter, Serializer, Value};
use tracing::info;

use crate::catalog::SoluteCatalog;
use crate::errors::{AquaError, Result};
use crate::pipeline::InferencePipeline;
use crate::preprocess::FittedPreprocessor;
use crate::transform::DomainTransformer;

pub const MODEL_FILE: &str = "model.json";
pub const META_FILE: &str = "model.meta.json";

/// Contents of `model.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub preprocessor: FittedPreprocessor,
    pub estimator: Regressor,
}

#[derive(Serialize)]
struct ModelBundleRef<'a> {
    preprocessor: &'a FittedPreprocessor,
    estimator: &'a Regressor,
}

/// Contents of `model.meta.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Encoded feature vector columns, in order
    pub features: Vec<String>,
    pub model_type: ModelType,
    pub feature_count: usize,
    /// Enriched columns the preprocessor reads
    pub input_columns: Vec<String>,
    /// BLAKE3 hex of `model.json`
    pub model_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cv_metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub params: ParamMap,
}

/// Recursively sort JSON object keys to obtain a canonical representation.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, canonicalize(val));
            }
            Value::Object(sorted)
        }
        Value::Array(elements) => Value::Array(elements.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize a value as canonical JSON (sorted keys, two-space indent).
pub fn write_canonical_json<T, W>(mut writer: W, value: &T) -> std::result::Result<(), serde_json::Error>
where
    T: Serialize,
    W: Write,
{
    let canonical = canonicalize(serde_json::to_value(value)?);
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    canonical.serialize(&mut serializer)?;
    Ok(())
}

pub fn canonical_json_string<T: Serialize>(value: &T) -> std::result::Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    write_canonical_json(&mut buffer, value)?;
    String::from_utf8(buffer).map_err(|err| SerdeSerError::custom(err.to_string()))
}

pub fn hash_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Write `model.json` and `model.meta.json` for a fitted pipeline.
pub fn save_artifact<P: AsRef<Path>>(
    dir: P,
    pipeline: &InferencePipeline,
    cv_metrics: BTreeMap<String, f64>,
) -> Result<ModelMetadata> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let bundle = ModelBundleRef {
        preprocessor: pipeline.preprocessor(),
        estimator: pipeline.estimator(),
    };
    let model_json = canonical_json_string(&bundle)?;
    let model_hash = hash_hex(model_json.as_bytes());

    let features = pipeline.preprocessor().feature_names();
    let metadata = ModelMetadata {
        feature_count: features.len(),
        features,
        model_type: pipeline.estimator().backend(),
        input_columns: pipeline.preprocessor().input_columns(),
        model_hash,
        created_at: Utc::now(),
        cv_metrics,
        params: pipeline.estimator().get_params(),
    };

    std::fs::write(dir.join(MODEL_FILE), &model_json)?;
    std::fs::write(dir.join(META_FILE), canonical_json_string(&metadata)?)?;

    info!(
        path = %dir.display(),
        model_type = %metadata.model_type,
        hash = %metadata.model_hash,
        "saved model artifact"
    );
    Ok(metadata)
}

/// Check metadata against the bundle it claims to describe.
pub fn validate_metadata(metadata: &ModelMetadata, model_json: &[u8], bundle: &ModelBundle) -> Result<()> {
    let mismatch = |msg: String| Err(AquaError::MetadataMismatch(msg));

    let actual_hash = hash_hex(model_json);
    if metadata.model_hash != actual_hash {
        return mismatch(format!(
            "model hash {} does not match {MODEL_FILE} ({actual_hash})",
            metadata.model_hash
        ));
    }
    if metadata.feature_count != metadata.features.len() {
        return mismatch(format!(
            "feature_count is {} but {} features are listed",
            metadata.feature_count,
            metadata.features.len()
        ));
    }
    if metadata.features != bundle.preprocessor.feature_names() {
        return mismatch("feature list differs from the preprocessor output columns".into());
    }
    if metadata.input_columns != bundle.preprocessor.input_columns() {
        return mismatch("input columns differ from the preprocessor inputs".into());
    }
    let backend = bundle.estimator.backend();
    if metadata.model_type != backend {
        return mismatch(format!(
            "model_type is {} but the estimator is {backend}",
            metadata.model_type
        ));
    }
    match bundle.estimator.feature_count() {
        Some(count) if count == metadata.feature_count => Ok(()),
        Some(count) => mismatch(format!(
            "estimator expects {count} features, metadata lists {}",
            metadata.feature_count
        )),
        None => mismatch("estimator in the artifact is not fitted".into()),
    }
}

/// Load and validate an artifact directory into a serving pipeline.
pub fn load_artifact<P: AsRef<Path>>(
    dir: P,
    catalog: Arc<SoluteCatalog>,
) -> Result<(InferencePipeline, ModelMetadata)> {
    let dir = dir.as_ref();
    let model_json = std::fs::read(dir.join(MODEL_FILE))?;
    let metadata: ModelMetadata = serde_json::from_slice(&std::fs::read(dir.join(META_FILE))?)?;
    let bundle: ModelBundle = serde_json::from_slice(&model_json)?;

    validate_metadata(&metadata, &model_json, &bundle)?;
    bundle.estimator.validate()?;

    let pipeline = InferencePipeline::new(
        DomainTransformer::new(catalog),
        bundle.preprocessor,
        bundle.estimator,
    )?;

    info!(
        path = %dir.display(),
        model_type = %metadata.model_type,
        features = metadata.feature_count,
        "loaded model artifact"
    );
    Ok((pipeline, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = serde_json::json!({"b": 1, "a": {"d": 2, "c": [3, {"f": 4, "e": 5}]}});
        let json = canonical_json_string(&value).unwrap();
        let a = json.find("\"a\"").unwrap();
        let b = json.find("\"b\"").unwrap();
        let e = json.find("\"e\"").unwrap();
        let f = json.find("\"f\"").unwrap();
        assert!(a < b);
        assert!(e < f);
        assert!(json.contains("\n  \"a\""));
    }

    #[test]
    fn test_hash_is_stable() {
        let a = hash_hex(b"model");
        assert_eq!(a, hash_hex(b"model"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_hex(b"model2"));
    }
}
