//! Binary classification metrics

use crate::error::{PipelineError, Result};
use crate::training::{ranking_scores, Classifier};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// 2×2 confusion matrix for 0/1 labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let mut cm = ConfusionMatrix::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.true_positives += 1,
                (false, true) => cm.false_positives += 1,
                (false, false) => cm.true_negatives += 1,
                (true, false) => cm.false_negatives += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    /// `[[tn, fp], [fn, tp]]`, rows are actual classes
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    pub fn accuracy(&self) -> f64 {
        safe_div(
            (self.true_positives + self.true_negatives) as f64,
            self.total() as f64,
        )
    }

    pub fn precision(&self) -> f64 {
        safe_div(
            self.true_positives as f64,
            (self.true_positives + self.false_positives) as f64,
        )
    }

    pub fn recall(&self) -> f64 {
        safe_div(
            self.true_positives as f64,
            (self.true_positives + self.false_negatives) as f64,
        )
    }

    pub fn f1(&self) -> f64 {
        f1(self.precision(), self.recall())
    }

    /// Same counts with the roles of the classes swapped
    fn flipped(&self) -> ConfusionMatrix {
        ConfusionMatrix {
            true_negatives: self.true_positives,
            false_positives: self.false_negatives,
            false_negatives: self.false_positives,
            true_positives: self.true_negatives,
        }
    }
}

/// Per-class row of a classification report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Precision/recall/F1/support per class, accuracy, macro and weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub negative: ClassMetrics,
    pub positive: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let row = |m: &ConfusionMatrix| ClassMetrics {
            precision: m.precision(),
            recall: m.recall(),
            f1: m.f1(),
            support: m.true_positives + m.false_negatives,
        };
        let positive = row(cm);
        let negative = row(&cm.flipped());
        let total = cm.total();

        let macro_avg = ClassMetrics {
            precision: (negative.precision + positive.precision) / 2.0,
            recall: (negative.recall + positive.recall) / 2.0,
            f1: (negative.f1 + positive.f1) / 2.0,
            support: total,
        };

        let weight = |neg: f64, pos: f64| {
            safe_div(
                neg * negative.support as f64 + pos * positive.support as f64,
                total as f64,
            )
        };
        let weighted_avg = ClassMetrics {
            precision: weight(negative.precision, positive.precision),
            recall: weight(negative.recall, positive.recall),
            f1: weight(negative.f1, positive.f1),
            support: total,
        };

        Self {
            negative,
            positive,
            accuracy: cm.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        write_row(f, "0", &self.negative)?;
        write_row(f, "1", &self.positive)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        label, m.precision, m.recall, m.f1, m.support
    )
}

/// One point of a ROC curve: scores `>= threshold` are predicted positive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    /// `+inf` is written to JSON as null and read back as `+inf`
    #[serde(deserialize_with = "threshold_from_json")]
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

fn threshold_from_json<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
}

/// Area under the ROC curve via the Mann-Whitney rank statistic (ties averaged)
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, scores)?;
    let (n_pos, n_neg) = class_counts(y_true);
    if n_pos == 0 || n_neg == 0 {
        return Err(single_class("roc_auc", n_pos, n_neg));
    }

    let ranks = average_ranks(scores);
    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(y_true.iter())
        .filter(|(_, &t)| t > 0.5)
        .map(|(r, _)| r)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// ROC points at every distinct score, ascending threshold, closed by `(+inf, 0, 0)`
pub fn roc_curve(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<Vec<RocPoint>> {
    check_lengths(y_true, scores)?;
    let (n_pos, n_neg) = class_counts(y_true);
    if n_pos == 0 || n_neg == 0 {
        return Err(single_class("roc_curve", n_pos, n_neg));
    }

    // Sweep from the highest score down, accumulating counts at or above each threshold
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if y_true[order[i]] > 0.5 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            false_positive_rate: fp as f64 / n_neg as f64,
            true_positive_rate: tp as f64 / n_pos as f64,
        });
    }

    points.reverse();
    Ok(points)
}

/// Trapezoidal area under a curve produced by [`roc_curve`]
pub fn curve_area(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let dx = (w[0].false_positive_rate - w[1].false_positive_rate).abs();
            dx * (w[0].true_positive_rate + w[1].true_positive_rate) / 2.0
        })
        .sum()
}

/// Metric used to rank configurations during search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMetric {
    #[default]
    RocAuc,
    Accuracy,
    F1,
    Precision,
    Recall,
}

impl ScoringMetric {
    pub const ALL: [ScoringMetric; 5] = [
        ScoringMetric::RocAuc,
        ScoringMetric::Accuracy,
        ScoringMetric::F1,
        ScoringMetric::Precision,
        ScoringMetric::Recall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMetric::RocAuc => "roc_auc",
            ScoringMetric::Accuracy => "accuracy",
            ScoringMetric::F1 => "f1",
            ScoringMetric::Precision => "precision",
            ScoringMetric::Recall => "recall",
        }
    }

    /// Score a fitted model on held-out data (higher is better).
    ///
    /// `roc_auc` ranks probabilities when the model has them and hard labels otherwise.
    pub fn score(&self, model: &dyn Classifier, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let confusion = || -> Result<ConfusionMatrix> {
            ConfusionMatrix::from_predictions(y, &model.predict(x)?)
        };
        match self {
            ScoringMetric::RocAuc => roc_auc(y, &ranking_scores(model, x)?),
            ScoringMetric::Accuracy => Ok(confusion()?.accuracy()),
            ScoringMetric::F1 => Ok(confusion()?.f1()),
            ScoringMetric::Precision => Ok(confusion()?.precision()),
            ScoringMetric::Recall => Ok(confusion()?.recall()),
        }
    }
}

impl fmt::Display for ScoringMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScoringMetric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        ScoringMetric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                PipelineError::ConfigError(format!(
                    "unknown scoring metric '{}' (expected one of: {})",
                    s,
                    ScoringMetric::ALL.map(|m| m.as_str()).join(", ")
                ))
            })
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    safe_div(2.0 * precision * recall, precision + recall)
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn class_counts(y: &Array1<f64>) -> (usize, usize) {
    let n_pos = y.iter().filter(|&&v| v > 0.5).count();
    (n_pos, y.len() - n_pos)
}

fn single_class(metric: &str, n_pos: usize, n_neg: usize) -> PipelineError {
    PipelineError::MetricUndefined {
        metric: metric.to_string(),
        reason: format!(
            "only one class present in y_true ({} positive, {} negative)",
            n_pos, n_neg
        ),
    }
}

fn check_lengths(a: &Array1<f64>, b: &Array1<f64>) -> Result<()> {
    if a.len() != b.len() {
        return Err(PipelineError::shape(
            format!("{} values", a.len()),
            format!("{} values", b.len()),
        ));
    }
    Ok(())
}

/// 1-based ranks, tied values share the mean of their positions
fn average_ranks(values: &Array1<f64>) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_confusion_matrix_counts() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();

        assert_eq!(cm.as_rows(), [[3, 1], [1, 3]]);
        assert_eq!(cm.total(), 8);
        assert!((cm.accuracy() - 0.75).abs() < 1e-12);
        assert!((cm.precision() - 0.75).abs() < 1e-12);
        assert!((cm.recall() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let y_true = array![0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let report = ClassificationReport::from_confusion(
            &ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap(),
        );
        assert_eq!(report.positive.precision, 0.0);
        assert_eq!(report.positive.f1, 0.0);
        assert_eq!(report.negative.recall, 1.0);
    }

    #[test]
    fn test_report_averages() {
        let y_true = array![0.0, 0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 1.0, 1.0];
        let cm = ConfusionMatrix::from_predictions(&y_true, &y_pred).unwrap();
        let report = ClassificationReport::from_confusion(&cm);

        assert_eq!(report.negative.support, 3);
        assert_eq!(report.positive.support, 1);
        // negative: p=1, r=2/3; positive: p=1/2, r=1
        assert!((report.macro_avg.precision - 0.75).abs() < 1e-12);
        assert!((report.weighted_avg.recall - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&y, &array![0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn test_roc_auc_ties_are_averaged() {
        let y = array![0.0, 1.0, 0.0, 1.0];
        assert!((roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]).unwrap() - 0.5).abs() < 1e-12);
        // classic example: 0.75
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert!((roc_auc(&y, &array![0.1, 0.4, 0.35, 0.8]).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_undefined() {
        let err = roc_auc(&array![1.0, 1.0], &array![0.2, 0.4]).unwrap_err();
        assert!(matches!(err, PipelineError::MetricUndefined { .. }));
    }

    #[test]
    fn test_roc_curve_shape() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let scores = array![0.1, 0.4, 0.35, 0.8];
        let curve = roc_curve(&y, &scores).unwrap();

        assert_eq!(curve.len(), 5);
        let last = curve.last().unwrap();
        assert!(last.threshold.is_infinite());
        assert_eq!((last.false_positive_rate, last.true_positive_rate), (0.0, 0.0));
        assert_eq!(curve[0].threshold, 0.1);
        assert_eq!((curve[0].false_positive_rate, curve[0].true_positive_rate), (1.0, 1.0));
        assert!(curve.windows(2).all(|w| w[0].threshold < w[1].threshold));
    }

    #[test]
    fn test_curve_area_matches_auc() {
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
        let scores = array![0.2, 0.7, 0.7, 0.9, 0.4, 0.1, 0.4, 0.6, 0.3];
        let auc = roc_auc(&y, &scores).unwrap();
        let area = curve_area(&roc_curve(&y, &scores).unwrap());
        assert!((auc - area).abs() < 1e-12);
    }

    #[test]
    fn test_infinite_threshold_survives_json() {
        let point = RocPoint {
            threshold: f64::INFINITY,
            false_positive_rate: 0.0,
            true_positive_rate: 0.0,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert!(json.contains("null"));
        let back: RocPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_scoring_metric_parse() {
        assert_eq!("f1".parse::<ScoringMetric>().unwrap(), ScoringMetric::F1);
        assert_eq!(ScoringMetric::default(), ScoringMetric::RocAuc);
        assert!("log_loss".parse::<ScoringMetric>().is_err());
    }
}
