//! Preprocessing configuration

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A ratio feature computed after encoding, before scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeature {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

impl DerivedFeature {
    pub fn ratio(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
        }
    }
}

/// Which columns mean what in the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Binary target column
    pub label: String,
    /// Nominal columns encoded to integer codes
    pub categorical: Vec<String>,
    /// Identifier-only columns dropped before modelling
    pub exclude: Vec<String>,
    /// Ratio features appended after the input columns
    pub derived: Vec<DerivedFeature>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            label: "Exited".to_string(),
            categorical: vec!["Geography".to_string(), "Gender".to_string()],
            exclude: vec![
                "RowNumber".to_string(),
                "CustomerId".to_string(),
                "Surname".to_string(),
            ],
            derived: Vec::new(),
        }
    }
}

impl DataConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            categorical: Vec::new(),
            exclude: Vec::new(),
            derived: Vec::new(),
        }
    }

    /// Builder method to set categorical columns
    pub fn with_categorical<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.categorical = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set excluded columns
    pub fn with_exclude<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.exclude = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to add a derived ratio feature
    pub fn with_derived(mut self, feature: DerivedFeature) -> Self {
        self.derived.push(feature);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(PipelineError::ConfigError("label column name is empty".to_string()));
        }
        if self.categorical.contains(&self.label) || self.exclude.contains(&self.label) {
            return Err(PipelineError::ConfigError(format!(
                "label column '{}' cannot also be categorical or excluded",
                self.label
            )));
        }
        let mut seen = BTreeSet::new();
        for feature in &self.derived {
            if feature.name.trim().is_empty() {
                return Err(PipelineError::ConfigError("derived feature without a name".to_string()));
            }
            if feature.name == self.label || self.categorical.contains(&feature.name) {
                return Err(PipelineError::ConfigError(format!(
                    "derived feature '{}' shadows a configured column",
                    feature.name
                )));
            }
            if !seen.insert(feature.name.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "derived feature '{}' is declared twice",
                    feature.name
                )));
            }
        }
        Ok(())
    }
}

/// Train/test partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(PipelineError::ConfigError(format!(
                "test_ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        Ok(())
    }
}
