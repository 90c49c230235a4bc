//! Held-out evaluation of fitted classifiers

use super::metrics::{roc_auc, roc_curve, ClassificationReport, ConfusionMatrix, RocPoint};
use crate::error::Result;
use crate::training::Classifier;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything measured for one model on the test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub predictions: Vec<f64>,
    /// Positive-class probabilities, absent for label-only models
    pub probabilities: Option<Vec<f64>>,
    pub confusion_matrix: ConfusionMatrix,
    pub classification_report: ClassificationReport,
    pub roc_auc: Option<f64>,
    pub roc_curve: Option<Vec<RocPoint>>,
}

impl EvaluationReport {
    pub fn accuracy(&self) -> f64 {
        self.classification_report.accuracy
    }

    pub fn has_ranking_score(&self) -> bool {
        self.roc_auc.is_some()
    }
}

/// Computes classification metrics and, when the model supports it, ROC statistics
#[derive(Debug, Clone)]
pub struct Evaluator {
    include_curve: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self { include_curve: true }
    }

    /// Skip storing the ROC curve points (AUC is still computed)
    pub fn without_curve(mut self) -> Self {
        self.include_curve = false;
        self
    }

    pub fn evaluate(
        &self,
        name: &str,
        model: &dyn Classifier,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<EvaluationReport> {
        let predictions = model.predict(x)?;
        let confusion_matrix = ConfusionMatrix::from_predictions(y, &predictions)?;
        let classification_report = ClassificationReport::from_confusion(&confusion_matrix);

        let (probabilities, auc, curve) = if model.capabilities().supports_probability {
            let proba = model.predict_proba(x)?;
            let auc = roc_auc(y, &proba)?;
            let curve = if self.include_curve {
                Some(roc_curve(y, &proba)?)
            } else {
                None
            };
            (Some(proba.to_vec()), Some(auc), curve)
        } else {
            debug!(model = name, "no probability output, skipping ROC statistics");
            (None, None, None)
        };

        debug!(
            model = name,
            accuracy = classification_report.accuracy,
            roc_auc = ?auc,
            "evaluated"
        );

        Ok(EvaluationReport {
            model_name: name.to_string(),
            predictions: predictions.to_vec(),
            probabilities,
            confusion_matrix,
            classification_report,
            roc_auc: auc,
            roc_curve: curve,
        })
    }
}
