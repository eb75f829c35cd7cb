//! Synthetic adsorption dataset shared by the integration tests

use std::fmt::Write;
use std::sync::Arc;

use aqua_boost::{ModelType, ParamMap, ParamValue, Regressor};
use aqua_core::{DomainTransformer, SoluteCatalog};
use aqua_trainer::{CrossValidator, FoldSplitter, TrainingSet};

pub const CODES: [&str; 4] = ["CIP", "SMX", "TC", "CAF"];
pub const ATMOSPHERES: [&str; 3] = ["N2", "Air", "SG"];

pub fn transformer() -> DomainTransformer {
    DomainTransformer::new(Arc::new(SoluteCatalog::builtin()))
}

/// CSV text with `rows` rows; qe rises with surface area and concentration.
pub fn dataset_csv(rows: usize) -> String {
    let mut csv = String::from(
        "Target_Phar,Activation_Atmosphere,BET_Surface_Area(m2/g),Initial_Concentration(mg/L),Solution_pH,C_percent,O_percent,qe(mg/g)\n",
    );
    for i in 0..rows {
        let bet = 400.0 + (i * 37 % 600) as f64;
        let c0 = 20.0 + (i % 6) as f64 * 10.0;
        let ph = 3.0 + (i % 8) as f64;
        let shift = (i % CODES.len()) as f64 * 15.0;
        let qe = 0.1 * bet + 2.0 * c0 + shift;
        writeln!(
            csv,
            "{},{},{},{},{},{},{},{}",
            CODES[i % CODES.len()],
            ATMOSPHERES[i % ATMOSPHERES.len()],
            bet,
            c0,
            ph,
            60 + i % 10,
            5 + i % 3,
            qe
        )
        .unwrap();
    }
    csv
}

pub fn dataset(rows: usize) -> TrainingSet {
    TrainingSet::from_reader(dataset_csv(rows).as_bytes(), &transformer()).unwrap()
}

/// Like [`dataset`], with `column` observed in row `row` only.
pub fn dataset_with_sparse_column(rows: usize, column: &str, row: usize, value: f64) -> TrainingSet {
    let csv: String = dataset_csv(rows)
        .lines()
        .enumerate()
        .map(|(line, text)| match line {
            0 => format!("{text},{column}\n"),
            l if l == row + 1 => format!("{text},{value}\n"),
            _ => format!("{text},\n"),
        })
        .collect();
    TrainingSet::from_reader(csv.as_bytes(), &transformer()).unwrap()
}

pub fn validator(data: &TrainingSet, folds: usize) -> CrossValidator {
    CrossValidator::new(
        FoldSplitter::new(folds, 42),
        data.schema(&aqua_core::FeatureSchema::default()),
    )
}

/// A cheap estimator for tests
pub fn small(model_type: ModelType) -> Regressor {
    let mut params = ParamMap::new();
    params.insert("n_estimators".into(), ParamValue::Int(30));
    params.insert("learning_rate".into(), ParamValue::Float(0.2));
    params.insert("max_depth".into(), ParamValue::Int(3));
    params.insert("min_samples_leaf".into(), ParamValue::Int(2));
    Regressor::with_params(model_type, &params).unwrap()
}
