mod common;

use aqua_boost::ModelType;
use aqua_trainer::{CrossValidator, FoldSplitter};

#[test]
fn test_every_row_gets_one_oof_prediction() {
    let data = common::dataset(47);
    let report = common::validator(&data, 5)
        .evaluate(&data, &common::small(ModelType::Gbdt))
        .unwrap();

    assert_eq!(report.oof.len(), 47);
    assert!(report.oof.iter().all(|p| p.is_finite()));
    let sizes: Vec<usize> = report.folds.iter().map(|f| f.n_val).collect();
    assert_eq!(sizes, vec![10, 10, 9, 9, 9]);
    for fold in &report.folds {
        let held = report.fold_of.iter().filter(|&&f| f == fold.fold).count();
        assert_eq!(held, fold.n_val);
        assert_eq!(fold.n_train + fold.n_val, 47);
    }
    assert!(report.oof_metrics.r2 > 0.5, "oof r2 {}", report.oof_metrics.r2);
}

#[test]
fn test_cross_validation_is_reproducible() {
    let data = common::dataset(40);
    let validator = common::validator(&data, 4);
    for model_type in ModelType::ALL {
        let estimator = common::small(model_type);
        let a = validator.evaluate(&data, &estimator).unwrap();
        let b = validator.evaluate(&data, &estimator).unwrap();
        assert_eq!(a, b, "{model_type}");
    }
}

#[test]
fn test_stratified_folds_cover_each_pharmaceutical() {
    let data = common::dataset(40);
    let validator = CrossValidator::new(
        FoldSplitter::new(5, 7).stratified(true),
        data.schema(&aqua_core::FeatureSchema::default()),
    );
    for fold in validator.folds(&data).unwrap() {
        for code in common::CODES {
            let count = fold
                .validation
                .iter()
                .filter(|&&row| data.groups[row] == code)
                .count();
            assert_eq!(count, 2);
        }
    }
    let report = validator
        .evaluate(&data, &common::small(ModelType::HistGbdt))
        .unwrap();
    assert_eq!(report.folds.len(), 5);
}

#[test]
fn test_too_many_folds_is_an_error() {
    let data = common::dataset(4);
    assert!(common::validator(&data, 5)
        .evaluate(&data, &common::small(ModelType::Gbdt))
        .is_err());
}

#[test]
fn test_column_seen_in_one_row_does_not_break_folds() {
    let data = common::dataset_with_sparse_column(40, "pHpzc", 1, 6.5);
    assert_eq!(data.records[1].get_num("pHpzc"), Some(6.5));
    assert!(data.records[0].get_num("pHpzc").is_none());

    let validator = common::validator(&data, 5);
    assert!(validator.schema().numeric.iter().any(|c| c == "pHpzc"));
    let report = validator
        .evaluate(&data, &common::small(ModelType::Gbdt))
        .unwrap();
    assert_eq!(report.folds.len(), 5);
    assert!(report.oof.iter().all(|p| p.is_finite()));
}
