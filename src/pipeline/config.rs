//! Experiment configuration

use crate::ensemble::StackingConfig;
use crate::error::{PipelineError, Result};
use crate::optimizer::{HyperparameterGrid, SearchConfig};
use crate::preprocessing::{DataConfig, SplitConfig};
use crate::training::{ModelFamily, ModelSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// One model family to tune, under a display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub family: ModelFamily,
    #[serde(default)]
    pub grid: HyperparameterGrid,
}

impl ModelEntry {
    pub fn new(name: impl Into<String>, family: ModelFamily, grid: HyperparameterGrid) -> Self {
        Self {
            name: name.into(),
            family,
            grid,
        }
    }
}

/// Second-stage ensemble settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingSettings {
    pub enabled: bool,
    pub folds: usize,
    /// Meta-model fit on out-of-fold base outputs
    pub meta: ModelSpec,
    /// Also feed the original features to the meta-model
    pub passthrough: bool,
}

impl Default for StackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            folds: 5,
            meta: ModelSpec::defaults(ModelFamily::LogisticRegression),
            passthrough: false,
        }
    }
}

/// Everything one experiment run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub split: SplitConfig,
    pub search: SearchConfig,
    pub models: Vec<ModelEntry>,
    pub stacking: StackingSettings,
}

impl Default for PipelineConfig {
    /// The bank churn workflow: three tuned families stacked under logistic regression
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            split: SplitConfig::default(),
            search: SearchConfig::default(),
            models: vec![
                ModelEntry::new(
                    "logistic_regression",
                    ModelFamily::LogisticRegression,
                    HyperparameterGrid::new().with("c", [0.1, 1.0, 10.0]),
                ),
                ModelEntry::new(
                    "random_forest",
                    ModelFamily::RandomForest,
                    HyperparameterGrid::new()
                        .with("n_estimators", [100usize])
                        .with("max_depth", [Some(6usize), None]),
                ),
                ModelEntry::new(
                    "xgboost",
                    ModelFamily::Xgboost,
                    HyperparameterGrid::new()
                        .with("n_estimators", [50usize, 100])
                        .with("max_depth", [3usize])
                        .with("learning_rate", [0.1]),
                ),
            ],
            stacking: StackingSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Builder method to replace the model list
    pub fn with_models(mut self, models: Vec<ModelEntry>) -> Self {
        self.models = models;
        self
    }

    /// Use one seed for the split, the search and the stack
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.seed = seed;
        self.search.seed = seed;
        self
    }

    /// Stacking options in the form the composer takes; shares the search seed
    pub fn stacking_config(&self) -> StackingConfig {
        StackingConfig {
            folds: self.stacking.folds,
            seed: self.search.seed,
            passthrough: self.stacking.passthrough,
        }
    }

    /// Reject anything that would fail after data has been loaded
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.split.validate()?;

        if self.search.folds < 2 {
            return Err(PipelineError::ConfigError(format!(
                "search.folds must be at least 2, got {}",
                self.search.folds
            )));
        }
        if self.search.n_jobs == Some(0) {
            return Err(PipelineError::ConfigError("search.n_jobs must be positive".to_string()));
        }
        if self.models.is_empty() {
            return Err(PipelineError::ConfigError("no models configured".to_string()));
        }

        let mut names = BTreeSet::new();
        for entry in &self.models {
            if !names.insert(entry.name.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "duplicate model name '{}'",
                    entry.name
                )));
            }
            for params in entry.grid.combinations()? {
                ModelSpec::new(entry.family, params).validate()?;
            }
        }

        if self.stacking.enabled {
            if self.stacking.folds < 2 {
                return Err(PipelineError::ConfigError(format!(
                    "stacking.folds must be at least 2, got {}",
                    self.stacking.folds
                )));
            }
            self.stacking.meta.validate()?;
        }
        Ok(())
    }

    /// Read a JSON config; missing sections take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
