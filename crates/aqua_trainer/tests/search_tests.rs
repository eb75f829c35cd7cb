mod common;

use aqua_boost::{Estimator, ModelType, ParamValue};
use aqua_trainer::{
    CancelToken, CvError, Distribution, ParamSpace, RandomizedSearch, SearchError, TrialStatus,
};

fn space() -> ParamSpace {
    ParamSpace::new()
        .with("learning_rate", Distribution::LogUniform { low: 0.05, high: 0.3 })
        .with("max_depth", Distribution::IntRange { low: 2, high: 4 })
        .with("n_estimators", Distribution::choice([10i64, 20, 30]))
}

#[test]
fn test_search_is_deterministic_for_a_seed() {
    let data = common::dataset(40);
    let validator = common::validator(&data, 4);
    let run = |seed| {
        RandomizedSearch::new(common::small(ModelType::Gbdt), space(), &validator)
            .n_iter(4)
            .seed(seed)
            .run(&data, &common::transformer())
            .unwrap()
    };

    let a = run(11);
    let b = run(11);
    assert_eq!(a.trials, b.trials);
    assert_eq!(a.best_trial, b.best_trial);
    assert_eq!(a.best_params, b.best_params);
    assert!(!a.cancelled);
    assert_eq!(a.trials.len(), 4);
    assert_eq!(a.best_fold_scores.len(), 4);

    let best = &a.trials[a.best_trial];
    assert_eq!(best.mean_score, a.best_score);
    assert!(a.trials.iter().all(|t| t.mean_score <= a.best_score));
    for (name, value) in &best.params {
        assert_eq!(a.best_params.get(name), Some(value));
    }

    assert_eq!(a.pipeline.estimator().backend(), ModelType::Gbdt);
    assert!(a.pipeline.estimator().is_fitted());
    assert!(a.pipeline.predict(&data.records[0].to_raw()).is_ok());
}

#[test]
fn test_ties_go_to_the_earliest_trial() {
    let data = common::dataset(30);
    let validator = common::validator(&data, 3);
    let fixed = ParamSpace::new().with("max_depth", Distribution::choice([3i64]));
    let outcome = RandomizedSearch::new(common::small(ModelType::Gbdt), fixed, &validator)
        .n_iter(3)
        .run(&data, &common::transformer())
        .unwrap();
    assert_eq!(outcome.best_trial, 0);
    assert_eq!(outcome.trials[0].mean_score, outcome.trials[2].mean_score);
}

#[test]
fn test_failed_trials_score_negative_infinity() {
    let data = common::dataset(30);
    let validator = common::validator(&data, 3);
    let mixed = ParamSpace::new().with(
        "max_depth",
        Distribution::Choice {
            values: vec![
                ParamValue::Int(2),
                ParamValue::Int(3),
                ParamValue::Int(4),
                ParamValue::Text("deep".into()),
            ],
        },
    );
    let outcome = RandomizedSearch::new(common::small(ModelType::Dart), mixed, &validator)
        .n_iter(8)
        .seed(5)
        .run(&data, &common::transformer())
        .unwrap();

    for trial in &outcome.trials {
        let failed = matches!(trial.params["max_depth"], ParamValue::Text(_));
        assert_eq!(!trial.is_completed(), failed);
        if failed {
            assert!(matches!(trial.status, TrialStatus::Failed { .. }));
            assert_eq!(trial.mean_score, f64::NEG_INFINITY);
        } else {
            assert!(trial.mean_score.is_finite());
        }
    }
    assert!(outcome.trials[outcome.best_trial].is_completed());
}

#[test]
fn test_all_failed_trials_fail_the_search() {
    let data = common::dataset(30);
    let validator = common::validator(&data, 3);
    let broken = ParamSpace::new().with("learning_rate", Distribution::choice([-1.0]));
    let err = RandomizedSearch::new(common::small(ModelType::Gbdt), broken, &validator)
        .n_iter(3)
        .run(&data, &common::transformer())
        .unwrap_err();
    assert!(matches!(err, SearchError::AllTrialsFailed { trials: 3 }));
}

#[test]
fn test_cancelled_search_without_results_is_an_error() {
    let data = common::dataset(30);
    let validator = common::validator(&data, 3);
    let token = CancelToken::new();
    token.cancel();
    let err = RandomizedSearch::new(common::small(ModelType::Gbdt), space(), &validator)
        .n_iter(3)
        .cancel_token(token)
        .run(&data, &common::transformer())
        .unwrap_err();
    assert!(matches!(err, SearchError::Cancelled));
}

#[test]
fn test_unknown_parameter_fails_every_trial() {
    let data = common::dataset(30);
    let validator = common::validator(&data, 3);
    let unknown = ParamSpace::new().with("gamma", Distribution::Uniform { low: 0.0, high: 1.0 });
    let result = RandomizedSearch::new(common::small(ModelType::HistGbdt), unknown, &validator)
        .n_iter(2)
        .run(&data, &common::transformer());
    assert!(matches!(result, Err(SearchError::AllTrialsFailed { .. })));
}

#[test]
fn test_fold_problems_fail_the_search_instead_of_trials() {
    let data = common::dataset(4);
    let validator = common::validator(&data, 5);
    let err = RandomizedSearch::new(common::small(ModelType::Gbdt), space(), &validator)
        .n_iter(3)
        .run(&data, &common::transformer())
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::Evaluation(CvError::InvalidFolds { folds: 5, rows: 4 })
    ));
}
