//! Experiment pipeline
//!
//! Wires preparation, per-family grid search, stacking, evaluation and
//! importance ranking together under one [`PipelineConfig`].

mod config;
mod report;

pub use config::{ModelEntry, PipelineConfig, StackingSettings};
pub use report::{
    DatasetSummary, ImportanceEntry, ImportanceOutcome, PipelineReport, SearchSummary,
};

use crate::ensemble::{EnsembleComposer, StackingClassifier};
use crate::error::Result;
use crate::evaluation::Evaluator;
use crate::explainability::ImportanceReporter;
use crate::optimizer::ModelSearchRunner;
use crate::preprocessing::{DataPreparer, PreparedData};
use crate::training::{Classifier, TrainedModel};
use crate::utils::DataLoader;
use chrono::Utc;
use polars::prelude::DataFrame;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Name the stacked model is reported under
pub const STACKING_NAME: &str = "stacking";

/// Report plus the fitted artifacts behind it
#[derive(Debug, Clone)]
pub struct ExperimentRun {
    pub report: PipelineReport,
    pub prepared: PreparedData,
    /// Tuned models refit on the training partition, in configuration order
    pub models: Vec<(String, TrainedModel)>,
    pub stack: Option<StackingClassifier>,
}

/// Runs one experiment end to end
#[derive(Debug, Clone, Default)]
pub struct ExperimentPipeline {
    config: PipelineConfig,
    evaluator: Evaluator,
}

impl ExperimentPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            evaluator: Evaluator::new(),
        }
    }

    /// Builder method to set the evaluator
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, df: &DataFrame) -> Result<PipelineReport> {
        Ok(self.run_with_artifacts(df)?.report)
    }

    /// Load a CSV and run on it
    pub fn run_csv(&self, path: impl AsRef<Path>) -> Result<PipelineReport> {
        let df = DataLoader::new().load_csv(path)?;
        self.run(&df)
    }

    pub fn run_with_artifacts(&self, df: &DataFrame) -> Result<ExperimentRun> {
        let started_at = Utc::now();
        let start = Instant::now();
        let config = &self.config;
        config.validate()?;

        let prepared =
            DataPreparer::new(config.data.clone(), config.split.clone()).prepare(df)?;
        let (train_x, train_y) = (&prepared.train_x, &prepared.train_y);
        let (test_x, test_y) = (&prepared.test_x, &prepared.test_y);

        let runner = ModelSearchRunner::new(config.search.clone());
        let mut searches = Vec::with_capacity(config.models.len());
        let mut models = Vec::with_capacity(config.models.len());
        for entry in &config.models {
            info!(model = %entry.name, family = %entry.family, configs = entry.grid.len(), "Searching");
            let result = runner.search(entry.family, &entry.grid, train_x, train_y)?;
            searches.push(SearchSummary::from_result(&entry.name, &result));
            models.push((entry.name.clone(), result.model));
        }

        let mut evaluations = Vec::with_capacity(models.len());
        for (name, model) in &models {
            evaluations.push(self.evaluator.evaluate(name, model, test_x, test_y)?);
        }

        let stack = if config.stacking.enabled && models.len() >= 2 {
            let composer = EnsembleComposer::new(config.stacking_config());
            Some(composer.compose_stack(&models, &config.stacking.meta, train_x, train_y)?)
        } else {
            if config.stacking.enabled {
                info!(models = models.len(), "Stacking needs at least two models, skipping");
            }
            None
        };
        let stacking = match &stack {
            Some(stack) => Some(self.evaluator.evaluate(STACKING_NAME, stack, test_x, test_y)?),
            None => None,
        };

        let mut ranked: Vec<(&str, &dyn Classifier)> = models
            .iter()
            .map(|(name, model)| (name.as_str(), model as &dyn Classifier))
            .collect();
        if let Some(stack) = &stack {
            ranked.push((STACKING_NAME, stack as &dyn Classifier));
        }
        let reporter = ImportanceReporter::new();
        let mut importances = Vec::with_capacity(ranked.len());
        for (name, model) in ranked {
            let outcome = match reporter.rank(model, &prepared.feature_names) {
                Ok(features) => ImportanceOutcome::Ranked { features },
                Err(e) if e.is_capability_absence() => {
                    info!(model = name, reason = %e, "Feature importance skipped");
                    ImportanceOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };
            importances.push(ImportanceEntry {
                model: name.to_string(),
                outcome,
            });
        }

        let report = PipelineReport {
            started_at,
            elapsed_secs: start.elapsed().as_secs_f64(),
            scoring: config.search.scoring,
            dataset: DatasetSummary {
                rows: prepared.n_rows(),
                train_rows: prepared.train_indices.len(),
                test_rows: prepared.test_indices.len(),
                feature_names: prepared.feature_names.clone(),
                positive_rate: prepared.positive_rate(),
                label_classes: prepared.label_classes.clone(),
            },
            searches,
            evaluations,
            stacking,
            importances,
        };
        info!(elapsed_secs = report.elapsed_secs, "Experiment finished");

        Ok(ExperimentRun {
            report,
            prepared,
            models,
            stack,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::optimizer::HyperparameterGrid;
    use crate::synthetic::synthetic_churn;
    use crate::training::ModelFamily;

    fn quick_config() -> PipelineConfig {
        let mut config = PipelineConfig::default().with_models(vec![
            ModelEntry::new(
                "lr",
                ModelFamily::LogisticRegression,
                HyperparameterGrid::new().with("c", [1.0]),
            ),
            ModelEntry::new(
                "tree",
                ModelFamily::DecisionTree,
                HyperparameterGrid::new().with("max_depth", [3usize]),
            ),
        ]);
        config.search.folds = 3;
        config.stacking.folds = 3;
        config
    }

    #[test]
    fn test_run_reports_every_stage() {
        let df = synthetic_churn(200, 0.25, 3).unwrap();
        let report = ExperimentPipeline::new(quick_config()).run(&df).unwrap();

        assert_eq!(report.dataset.rows, 200);
        assert_eq!(report.searches.len(), 2);
        assert_eq!(report.evaluations.len(), 2);
        let stacked = report.stacking.as_ref().unwrap();
        assert_eq!(stacked.confusion_matrix.total(), 40);

        let outcome = |name: &str| {
            &report.importances.iter().find(|e| e.model == name).unwrap().outcome
        };
        assert!(matches!(outcome("lr"), ImportanceOutcome::Skipped { .. }));
        assert!(matches!(outcome("tree"), ImportanceOutcome::Ranked { .. }));
        assert!(matches!(outcome(STACKING_NAME), ImportanceOutcome::Skipped { .. }));
        assert!(!report.render().is_empty());
    }

    #[test]
    fn test_single_model_skips_stacking() {
        let df = synthetic_churn(120, 0.25, 4).unwrap();
        let mut config = quick_config();
        config.models.truncate(1);
        let report = ExperimentPipeline::new(config).run(&df).unwrap();
        assert!(report.stacking.is_none());
    }

    #[test]
    fn test_missing_label_is_fatal() {
        let df = synthetic_churn(60, 0.25, 5).unwrap();
        let mut config = quick_config();
        config.data.label = "Churn".to_string();
        let err = ExperimentPipeline::new(config).run(&df).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError(_)));
    }
}
