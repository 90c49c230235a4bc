//! Model evaluation: confusion matrix, classification report, ROC statistics

pub mod evaluator;
pub mod metrics;

pub use evaluator::{EvaluationReport, Evaluator};
pub use metrics::{
    curve_area, roc_auc, roc_curve, ClassMetrics, ClassificationReport, ConfusionMatrix, RocPoint,
    ScoringMetric,
};
