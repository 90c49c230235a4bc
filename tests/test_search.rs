//! Integration test: Cross-validated grid search

use churnlab::error::PipelineError;
use churnlab::evaluation::ScoringMetric;
use churnlab::optimizer::{HyperparameterGrid, ModelSearchRunner, SearchConfig};
use churnlab::training::{Classifier, ModelFamily, ParamValue};
use ndarray::{Array1, Array2};

/// Two noisy clusters with a little overlap
fn dataset(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 3), |(i, j)| {
        let center = if i % 3 == 0 { 1.0 } else { -1.0 };
        let wobble = (((i * 31 + j * 17) % 23) as f64 / 23.0 - 0.5) * 2.5;
        center + wobble * (j as f64 + 1.0) * 0.5
    });
    let y = Array1::from_iter((0..n).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }));
    (x, y)
}

fn runner(folds: usize, seed: u64) -> ModelSearchRunner {
    ModelSearchRunner::new(SearchConfig::new().with_folds(folds).with_seed(seed))
}

#[test]
fn test_candidate_count_matches_grid_size() {
    let (x, y) = dataset(90);
    let grid = HyperparameterGrid::new()
        .with("max_depth", [2usize, 4])
        .with("min_samples_leaf", [1usize, 3, 5]);
    let result = runner(3, 1).search(ModelFamily::DecisionTree, &grid, &x, &y).unwrap();

    assert_eq!(grid.len(), 6);
    assert_eq!(result.candidates.len(), 6);
    assert_eq!(result.fold_scores.len(), 3);
    assert_eq!(result.candidates[0].rank, 1);
    assert_eq!(result.best_score, result.candidates[0].mean_score);
    assert!(result
        .candidates
        .windows(2)
        .all(|w| w[0].mean_score >= w[1].mean_score));
}

#[test]
fn test_fixed_seed_is_reproducible() {
    let (x, y) = dataset(90);
    let grid = HyperparameterGrid::new()
        .with("n_estimators", [5usize, 10])
        .with("max_depth", [Some(3usize), None]);

    let a = runner(3, 11).search(ModelFamily::RandomForest, &grid, &x, &y).unwrap();
    let b = runner(3, 11).search(ModelFamily::RandomForest, &grid, &x, &y).unwrap();

    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.best_score, b.best_score);
}

#[test]
fn test_winner_is_refit_on_full_training_set() {
    let (x, y) = dataset(60);
    let grid = HyperparameterGrid::new().with("c", [0.1, 1.0]);
    let result = runner(3, 2)
        .search(ModelFamily::LogisticRegression, &grid, &x, &y)
        .unwrap();

    assert!(result.model.is_fitted());
    assert_eq!(result.model.spec(), &result.best_spec);
    assert_eq!(result.model.predict(&x).unwrap().len(), 60);
}

#[test]
fn test_label_only_family_scores_hard_labels() {
    let (x, y) = dataset(60);
    let result = runner(3, 3)
        .search(ModelFamily::LinearSvm, &HyperparameterGrid::new(), &x, &y)
        .unwrap();
    assert_eq!(result.candidates.len(), 1);
    assert!(result.best_score > 0.5);
}

#[test]
fn test_other_scoring_metric() {
    let (x, y) = dataset(60);
    let config = SearchConfig::new()
        .with_folds(3)
        .with_scoring(ScoringMetric::Accuracy)
        .with_n_jobs(2);
    let result = ModelSearchRunner::new(config)
        .search(ModelFamily::DecisionTree, &HyperparameterGrid::new(), &x, &y)
        .unwrap();
    assert!(result.best_score > 0.0 && result.best_score <= 1.0);
}

#[test]
fn test_unknown_parameter_is_config_error() {
    let (x, y) = dataset(30);
    let grid = HyperparameterGrid::new().with("n_neighbors", [3usize]);
    let err = runner(3, 0)
        .search(ModelFamily::RandomForest, &grid, &x, &y)
        .unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}

#[test]
fn test_wrong_value_type_is_config_error() {
    let (x, y) = dataset(30);
    let mut grid = HyperparameterGrid::new();
    grid.insert("max_depth", vec![ParamValue::Str("deep".to_string())]);
    let err = runner(3, 0)
        .search(ModelFamily::DecisionTree, &grid, &x, &y)
        .unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}

#[test]
fn test_fold_count_bounds() {
    let (x, y) = dataset(30);
    let grid = HyperparameterGrid::new();
    for folds in [1, 31] {
        let err = runner(folds, 0)
            .search(ModelFamily::LogisticRegression, &grid, &x, &y)
            .unwrap_err();
        assert!(matches!(err, PipelineError::ValidationError(_)));
    }
}

#[test]
fn test_single_class_fold_makes_auc_undefined() {
    // One positive among twelve rows: every fold but one holds only negatives
    let (x, _) = dataset(12);
    let y = Array1::from_iter((0..12).map(|i| if i == 0 { 1.0 } else { 0.0 }));
    let err = runner(3, 0)
        .search(ModelFamily::LogisticRegression, &HyperparameterGrid::new(), &x, &y)
        .unwrap_err();
    assert!(matches!(err, PipelineError::MetricUndefined { .. }));
}

#[test]
fn test_inputs_are_not_mutated() {
    let (x, y) = dataset(45);
    let (x0, y0) = (x.clone(), y.clone());
    runner(3, 5)
        .search(ModelFamily::DecisionTree, &HyperparameterGrid::new(), &x, &y)
        .unwrap();
    assert_eq!(x, x0);
    assert_eq!(y, y0);
}

#[test]
fn test_label_length_mismatch_is_shape_error() {
    let (x, y) = dataset(30);
    let short = y.slice(ndarray::s![..29]).to_owned();
    let err = runner(3, 0)
        .search(ModelFamily::LogisticRegression, &HyperparameterGrid::new(), &x, &short)
        .unwrap_err();
    assert!(matches!(err, PipelineError::ShapeError { .. }));
}
