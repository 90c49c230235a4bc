//! Integration test: Full pipeline (generate → prepare → search → stack → evaluate)

use churnlab::optimizer::HyperparameterGrid;
use churnlab::pipeline::{
    ExperimentPipeline, ImportanceOutcome, ModelEntry, PipelineConfig, STACKING_NAME,
};
use churnlab::synthetic::synthetic_churn;
use churnlab::training::{Classifier, ModelFamily};
use churnlab::utils::DataSaver;
use tempfile::tempdir;

/// The churn workflow with grids small enough for a test run
fn light_config() -> PipelineConfig {
    PipelineConfig::default().with_models(vec![
        ModelEntry::new(
            "logistic_regression",
            ModelFamily::LogisticRegression,
            HyperparameterGrid::new().with("c", [0.1, 1.0]),
        ),
        ModelEntry::new(
            "random_forest",
            ModelFamily::RandomForest,
            HyperparameterGrid::new()
                .with("n_estimators", [20usize])
                .with("max_depth", [6usize]),
        ),
        ModelEntry::new(
            "xgboost",
            ModelFamily::Xgboost,
            HyperparameterGrid::new()
                .with("n_estimators", [30usize])
                .with("max_depth", [3usize]),
        ),
    ])
}

#[test]
fn test_end_to_end_churn_workflow() {
    let df = synthetic_churn(1000, 0.2, 42).unwrap();
    let run = ExperimentPipeline::new(light_config())
        .run_with_artifacts(&df)
        .unwrap();
    let report = &run.report;

    assert_eq!(report.dataset.rows, 1000);
    assert_eq!(report.dataset.test_rows, 200);
    assert!((report.dataset.positive_rate - 0.2).abs() < 1e-12);

    let stacked = report.stacking.as_ref().unwrap();
    assert_eq!(stacked.model_name, STACKING_NAME);
    assert_eq!(stacked.confusion_matrix.total(), 200);
    assert!(stacked.roc_auc.unwrap() > 0.6);

    for evaluation in &report.evaluations {
        assert_eq!(evaluation.confusion_matrix.total(), 200);
        assert!(evaluation.has_ranking_score());
    }

    let stack = run.stack.as_ref().unwrap();
    assert_eq!(stack.splits().len(), 5);
    assert_eq!(stack.predict(&run.prepared.test_x).unwrap().len(), 200);

    let skipped: Vec<&str> = report
        .importances
        .iter()
        .filter(|e| matches!(e.outcome, ImportanceOutcome::Skipped { .. }))
        .map(|e| e.model.as_str())
        .collect();
    assert_eq!(skipped, vec!["logistic_regression", STACKING_NAME]);
}

#[test]
fn test_run_is_deterministic() {
    let df = synthetic_churn(300, 0.2, 8).unwrap();
    let mut config = light_config();
    config.search.folds = 3;
    config.stacking.folds = 3;
    let pipeline = ExperimentPipeline::new(config);

    let a = pipeline.run(&df).unwrap();
    let b = pipeline.run(&df).unwrap();
    for (x, y) in a.searches.iter().zip(b.searches.iter()) {
        assert_eq!(x.best_params, y.best_params);
        assert_eq!(x.best_score, y.best_score);
    }
    assert_eq!(
        a.stacking.as_ref().unwrap().predictions,
        b.stacking.as_ref().unwrap().predictions
    );
}

#[test]
fn test_run_csv_and_json_report() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("churn.csv");
    let json = dir.path().join("report.json");
    let mut df = synthetic_churn(250, 0.2, 3).unwrap();
    DataSaver::save_csv(&mut df, &csv).unwrap();

    let mut config = light_config();
    config.models.truncate(2);
    config.search.folds = 3;
    config.stacking.folds = 3;
    let report = ExperimentPipeline::new(config).run_csv(&csv).unwrap();
    report.save_json(&json).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value["dataset"]["rows"], 250);
    assert_eq!(value["searches"].as_array().unwrap().len(), 2);
    assert_eq!(value["importances"][0]["status"], "skipped");
    assert_eq!(value["importances"][1]["status"], "ranked");
}
