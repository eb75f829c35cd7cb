mod common;

use std::sync::Arc;

use aqua_boost::ModelType;
use aqua_core::catalog::DESCRIPTOR_FIELDS;
use aqua_core::{
    compare_pharmaceuticals, sweep, sweep_values, DomainTransformer, QualityWarning, RawRecord,
    RecordError, SoluteCatalog, ValidationError,
};
use proptest::prelude::*;

fn transformer() -> DomainTransformer {
    DomainTransformer::new(Arc::new(SoluteCatalog::builtin()))
}

fn cip_example() -> RawRecord {
    RawRecord::new()
        .with("Agent/Sample(g/g)", 1.0)
        .with("Soaking_Time(min)", 240.0)
        .with("Target_Phar", "CIP")
        .with("Activation_Atmosphere", "N2")
}

#[test]
fn test_cip_example_predicts_with_cip_descriptors() {
    let enriched = transformer().transform(&cip_example()).unwrap();
    assert_eq!(enriched.get_num("E"), Some(2.20));
    assert_eq!(enriched.get_num("S"), Some(2.34));
    assert_eq!(enriched.get_num("A"), Some(0.70));
    assert_eq!(enriched.get_num("B"), Some(2.52));
    assert_eq!(enriched.get_num("V"), Some(2.3040));

    let pipeline = common::fit_pipeline(ModelType::Gbdt);
    let prediction = pipeline.predict(&cip_example()).unwrap();
    assert!(prediction.qe.is_finite());
}

#[test]
fn test_micropore_warning_does_not_block_prediction() {
    let record = cip_example()
        .with("Micropore_Volume(cm3/g)", 0.9)
        .with("Total_Pore_Volume(cm3/g)", 0.5);

    let pipeline = common::fit_pipeline(ModelType::HistGbdt);
    let prediction = pipeline.predict(&record).unwrap();
    assert!(prediction.qe.is_finite());
    assert!(prediction.warnings.contains(&QualityWarning::MicroporeExceedsTotal {
        micropore: 0.9,
        total: 0.5
    }));
}

#[test]
fn test_transform_is_idempotent() {
    let t = transformer();
    for i in 0..12 {
        let once = t.transform(&common::raw_row(i)).unwrap();
        let twice = t.transform(&once.to_raw()).unwrap();
        assert_eq!(once.fields, twice.fields);
    }
}

#[test]
fn test_every_catalog_code_merges_its_descriptor() {
    let t = transformer();
    let catalog = SoluteCatalog::builtin();
    for entry in catalog.entries() {
        let raw = RawRecord::new()
            .with("Target_Phar", entry.code.to_lowercase().as_str())
            .with("Activation_Atmosphere", "Air");
        let enriched = t.transform(&raw).unwrap();
        for (field, value) in DESCRIPTOR_FIELDS.iter().zip(entry.descriptor.values()) {
            assert_eq!(enriched.get_num(field), Some(value), "{} {}", entry.code, field);
        }
    }
}

#[test]
fn test_unseen_atmosphere_is_a_warning() {
    let pipeline = common::fit_pipeline(ModelType::Gbdt);
    let record = cip_example().with("Activation_Atmosphere", "CO2");
    let prediction = pipeline.predict(&record).unwrap();
    assert!(prediction
        .warnings
        .iter()
        .any(|w| matches!(w, QualityWarning::UnseenCategory { .. })));
}

#[test]
fn test_sweep_returns_points_in_order() {
    let pipeline = common::fit_pipeline(ModelType::Dart);
    let points = sweep(
        &pipeline,
        &cip_example(),
        "BET_Surface_Area(m2/g)",
        100.0,
        900.0,
        9,
    )
    .unwrap();
    assert_eq!(points.len(), 9);
    assert_eq!(points[0].value, 100.0);
    assert_eq!(points[8].value, 900.0);
    assert!(points.iter().all(|p| p.prediction.qe.is_finite()));

    let grid = sweep_values(&pipeline, &cip_example(), "Solution_pH", &[7.0, 3.0]).unwrap();
    assert_eq!(grid[0].value, 7.0);
    assert_eq!(grid[1].value, 3.0);
}

#[test]
fn test_sweep_rejects_invalid_base_and_fields() {
    let pipeline = common::fit_pipeline(ModelType::Gbdt);
    let bad = cip_example().with("Target_Phar", "NOPE");
    assert!(matches!(
        sweep(&pipeline, &bad, "Solution_pH", 2.0, 10.0, 3),
        Err(RecordError::Validation(ValidationError::ReferenceData { .. }))
    ));
    assert!(matches!(
        sweep(&pipeline, &cip_example(), "Target_Phar", 0.0, 1.0, 2),
        Err(RecordError::Validation(ValidationError::InvalidValue { .. }))
    ));
}

#[test]
fn test_sweep_rejects_derived_fields() {
    let pipeline = common::fit_pipeline(ModelType::Gbdt);
    for field in DESCRIPTOR_FIELDS.iter().copied().chain(["C_molar", "H_C_molar"]) {
        let result = sweep_values(&pipeline, &cip_example(), field, &[1.0, 2.0]);
        assert!(
            matches!(
                result,
                Err(RecordError::Validation(ValidationError::InvalidValue { field: ref f, .. })) if f == field
            ),
            "{field} should not be sweepable"
        );
    }
    assert!(sweep_values(&pipeline, &cip_example(), "Solution_pH", &[5.0]).is_ok());
}

#[test]
fn test_compare_pharmaceuticals_covers_catalog() {
    let pipeline = common::fit_pipeline(ModelType::Gbdt);
    let results = compare_pharmaceuticals(&pipeline, &cip_example()).unwrap();
    let codes: Vec<&str> = results.iter().map(|r| r.code.as_str()).collect();
    let catalog = SoluteCatalog::builtin();
    let expected: Vec<&str> = catalog.codes().collect();
    assert_eq!(codes, expected);
    assert_eq!(results[0].display_name, "Phenol");
}

proptest! {
    #[test]
    fn prop_unknown_codes_fail_without_output(code in "[A-Z]{1,6}") {
        let catalog = SoluteCatalog::builtin();
        prop_assume!(catalog.entry(&code).is_none());
        let raw = RawRecord::new()
            .with("Target_Phar", code.as_str())
            .with("Activation_Atmosphere", "N2");
        let result = transformer().transform(&raw);
        prop_assert_eq!(result, Err(ValidationError::ReferenceData { code }));
    }

    #[test]
    fn prop_molar_ratios_are_non_negative(c in 0.1f64..100.0, h in -5.0f64..10.0, s in 0.0f64..5.0) {
        let raw = cip_example()
            .with("C_percent", c)
            .with("H_percent", h)
            .with("S_percent", s);
        let enriched = transformer().transform(&raw).unwrap();
        prop_assert!(enriched.get_num("H_C_molar").unwrap() >= 0.0);
        prop_assert!(enriched.get_num("S_C_molar").unwrap() >= 0.0);
    }
}
