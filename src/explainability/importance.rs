//! Ranked feature importances for models that expose them

use crate::error::{PipelineError, Result};
use crate::training::Classifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One feature's weight in a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Column position in the feature matrix
    pub feature_index: usize,
    pub feature_name: String,
    pub score: f64,
}

impl fmt::Display for FeatureImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.4}", self.feature_name, self.score)
    }
}

/// Pairs model importances with feature names, highest first
#[derive(Debug, Clone, Default)]
pub struct ImportanceReporter;

impl ImportanceReporter {
    pub fn new() -> Self {
        Self
    }

    /// Rank features by the model's importance scores.
    ///
    /// Stable sort: equal scores keep column order. Models whose capability flags
    /// lack importance support yield `UnsupportedCapability` without being queried.
    pub fn rank(&self, model: &dyn Classifier, feature_names: &[String]) -> Result<Vec<FeatureImportance>> {
        if !model.capabilities().supports_importance {
            return Err(PipelineError::unsupported(model.name(), "feature importances"));
        }

        let scores = model.feature_importances()?;
        if scores.len() != feature_names.len() {
            return Err(PipelineError::shape(
                format!("{} feature names", scores.len()),
                format!("{} feature names", feature_names.len()),
            ));
        }

        let mut ranked: Vec<FeatureImportance> = feature_names
            .iter()
            .zip(scores.iter())
            .enumerate()
            .map(|(feature_index, (name, &score))| FeatureImportance {
                feature_index,
                feature_name: name.clone(),
                score,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        Ok(ranked)
    }
}
