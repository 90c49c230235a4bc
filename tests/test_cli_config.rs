//! Integration test: Config files and CLI overrides

use churnlab::cli::{resolve_config, Cli, Commands, RunOverrides};
use churnlab::error::PipelineError;
use churnlab::evaluation::ScoringMetric;
use churnlab::pipeline::PipelineConfig;
use churnlab::training::ModelFamily;
use clap::Parser;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    let config = PipelineConfig::default();
    config.save(&path).unwrap();
    let loaded = PipelineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_overrides_win_over_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "data": { "label": "churned", "categorical": [], "exclude": ["id"] },
            "search": { "folds": 4, "scoring": "accuracy" },
            "models": [
                { "name": "forest", "family": "random_forest", "grid": { "n_estimators": [10] } },
                { "name": "svm", "family": "linear_svm" }
            ]
        }"#,
    )
    .unwrap();

    let overrides = RunOverrides {
        folds: Some(3),
        scoring: Some(ScoringMetric::RocAuc),
        test_ratio: Some(0.25),
        ..Default::default()
    };
    let config = resolve_config(Some(&path), &overrides).unwrap();

    assert_eq!(config.data.label, "churned");
    assert_eq!(config.search.folds, 3);
    assert_eq!(config.search.scoring, ScoringMetric::RocAuc);
    assert_eq!(config.split.test_ratio, 0.25);
    assert_eq!(config.models[1].family, ModelFamily::LinearSvm);
    assert_eq!(config.models[1].grid.len(), 1);
}

#[test]
fn test_unknown_family_in_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{ "models": [ { "name": "k", "family": "knn" } ] }"#).unwrap();

    let err = PipelineConfig::load(&path).unwrap_err();
    assert!(matches!(err, PipelineError::SerializationError(_)));
}

#[test]
fn test_generate_command_defaults() {
    let cli = Cli::try_parse_from(["churnlab", "generate", "--output", "out.csv"]).unwrap();
    match cli.command {
        Commands::Generate { rows, positive_rate, seed, .. } => {
            assert_eq!(rows, 1000);
            assert_eq!(positive_rate, 0.2);
            assert_eq!(seed, 42);
        }
        _ => panic!("expected generate"),
    }
}

#[test]
fn test_unknown_scoring_flag_rejected() {
    let parsed = Cli::try_parse_from(["churnlab", "run", "--data", "d.csv", "--scoring", "log_loss"]);
    assert!(parsed.is_err());
}
