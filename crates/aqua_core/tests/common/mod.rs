//! Shared fixtures: a small synthetic dataset and a pipeline fitted on it

use std::sync::Arc;

use aqua_boost::{Estimator, ModelType, ParamMap, ParamValue, Regressor};
use aqua_core::{
    DomainTransformer, EnrichedRecord, FeatureSchema, FittedPreprocessor, InferencePipeline,
    RawRecord, SoluteCatalog,
};

pub const CODES: [&str; 4] = ["CIP", "SMX", "TC", "CAF"];
pub const ATMOSPHERES: [&str; 3] = ["N2", "Air", "SG"];

pub fn raw_row(i: usize) -> RawRecord {
    let f = i as f64;
    RawRecord::new()
        .with("Target_Phar", CODES[i % CODES.len()])
        .with("Activation_Atmosphere", ATMOSPHERES[i % ATMOSPHERES.len()])
        .with("Agent/Sample(g/g)", 0.5 + (i % 5) as f64 * 0.5)
        .with("Soaking_Time(min)", 60.0 + (i % 7) as f64 * 30.0)
        .with("BET_Surface_Area(m2/g)", 400.0 + f * 10.0)
        .with("Total_Pore_Volume(cm3/g)", 0.3 + (i % 4) as f64 * 0.1)
        .with("Micropore_Volume(cm3/g)", 0.1 + (i % 3) as f64 * 0.05)
        .with("C_percent", 60.0 + (i % 10) as f64)
        .with("O_percent", 5.0 + (i % 3) as f64)
        .with("Initial_Concentration(mg/L)", 20.0 + (i % 6) as f64 * 10.0)
        .with("Solution_pH", 3.0 + (i % 8) as f64)
        .with("Dosage(g/L)", 0.5 + (i % 4) as f64 * 0.25)
}

/// Synthetic qe: grows with surface area and concentration, shifts by solute.
pub fn target(record: &EnrichedRecord) -> f64 {
    let bet = record.get_num("BET_Surface_Area(m2/g)").unwrap_or(0.0);
    let c0 = record.get_num("Initial_Concentration(mg/L)").unwrap_or(0.0);
    let v = record.get_num("V").unwrap_or(0.0);
    0.1 * bet + 2.0 * c0 + 30.0 * v
}

pub fn schema() -> FeatureSchema {
    FeatureSchema::default()
}

pub fn fit_pipeline(model_type: ModelType) -> InferencePipeline {
    let transformer = DomainTransformer::new(Arc::new(SoluteCatalog::builtin()));
    let enriched: Vec<EnrichedRecord> = (0..48)
        .map(|i| transformer.transform(&raw_row(i)).unwrap())
        .collect();
    let targets: Vec<f64> = enriched.iter().map(target).collect();

    let schema = schema().restricted_to(|c| enriched.iter().any(|r| r.get(c).is_some()));
    let preprocessor = FittedPreprocessor::fit(&enriched, &schema).unwrap();
    let features = preprocessor.transform_many(&enriched);

    let mut params = ParamMap::new();
    params.insert("n_estimators".into(), ParamValue::Int(40));
    params.insert("learning_rate".into(), ParamValue::Float(0.2));
    params.insert("max_depth".into(), ParamValue::Int(3));
    params.insert("min_samples_leaf".into(), ParamValue::Int(2));
    let mut estimator = Regressor::with_params(model_type, &params).unwrap();
    estimator.fit(&features, &targets).unwrap();

    InferencePipeline::new(transformer, preprocessor, estimator).unwrap()
}
