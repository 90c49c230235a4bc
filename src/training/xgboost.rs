//! Boosted trees on the logistic loss
//!
//! Each round fits a regression tree to the loss gradient `g = p - y` and
//! hessian `h = p(1 - p)`. Leaves take `-G / (H + lambda)` and a split is kept
//! when `0.5 * (GL²/(HL+λ) + GR²/(HR+λ) - G²/(H+λ))` exceeds `gamma`.

use super::linear_models::{check_width, check_xy, sigmoid};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Boosting hyperparameters, named after their `xgboost` counterparts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

impl XGBoostConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::ConfigError(
                "xgboost needs at least one estimator".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::ConfigError(format!(
                "xgboost learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        for (name, penalty) in [("reg_lambda", self.reg_lambda), ("reg_alpha", self.reg_alpha)] {
            if !(penalty >= 0.0) {
                return Err(PipelineError::ConfigError(format!(
                    "xgboost {} must be >= 0, got {}",
                    name, penalty
                )));
            }
        }
        for (name, ratio) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PipelineError::ConfigError(format!(
                    "xgboost {} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum BoostNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: Box<BoostNode>,
        right: Box<BoostNode>,
    },
}

impl BoostNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            BoostNode::Leaf { weight } => *weight,
            BoostNode::Split { feature, threshold, left, right, .. } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn accumulate_gain(&self, totals: &mut [f64]) {
        if let BoostNode::Split { feature, gain, left, right, .. } = self {
            totals[*feature] += gain;
            left.accumulate_gain(totals);
            right.accumulate_gain(totals);
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grow one round's tree over the sampled rows
fn grow_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> BoostNode {
    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let weight = leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return BoostNode::Leaf { weight };
    }

    // Per-feature search runs in parallel; ties keep the lowest feature index
    let candidates: Vec<Option<SplitCandidate>> = feature_indices
        .par_iter()
        .map(|&f| best_split_on(x, grad, hess, indices, f, config))
        .collect();
    let best = candidates.into_iter().flatten().fold(None, |best: Option<SplitCandidate>, cand| {
        match best {
            Some(b) if b.gain >= cand.gain => Some(b),
            _ => Some(cand),
        }
    });

    match best {
        Some(split) if split.gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, split.feature]] <= split.threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return BoostNode::Leaf { weight };
            }

            let left = grow_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = grow_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            BoostNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                gain: split.gain - config.gamma,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => BoostNode::Leaf { weight },
    }
}

fn leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        // L1 soft threshold
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Scan sorted values of one feature, accumulating left-side gradient sums
fn best_split_on(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<SplitCandidate> {
    let mut order: Vec<usize> = indices.to_vec();
    order.sort_by(|&a, &b| {
        x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = order.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = order.iter().map(|&i| hess[i]).sum();
    let lambda = config.reg_lambda;
    let parent_score = (g_total * g_total) / (h_total + lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<SplitCandidate> = None;

    // The last position would leave the right child empty
    for pos in 0..order.len() - 1 {
        let idx = order[pos];
        let next_idx = order[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        let value = x[[idx, feature]];
        let next_value = x[[next_idx, feature]];
        if (next_value - value).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - parent_score);

        if best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                threshold: (value + next_value) / 2.0,
                gain,
            });
        }
    }

    best
}

/// Binary boosted-tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    trees: Vec<BoostNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        // Start from the prior log-odds
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = grow_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            // Every row moves, sampled or not, so the next gradients stay consistent
            for (raw, row) in raw_preds.iter_mut().zip(x.rows()) {
                *raw += self.config.learning_rate * tree.predict(row);
            }

            self.trees.push(tree);
        }

        Ok(self)
    }

    /// Raw log-odds margin
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        check_width(self.n_features, x)?;

        let lr = self.config.learning_rate;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_score + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>()
            })
            .collect())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Total split gain per feature, normalized to sum to 1
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut totals = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            tree.accumulate_gain(&mut totals);
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for t in totals.iter_mut() {
                *t /= sum;
            }
        }
        Some(Array1::from_vec(totals))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}
