//! Decision tree classifier for binary targets

use super::linear_models::{check_width, check_xy};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the fraction of positive training samples
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Shannon entropy
    Entropy,
}

impl Criterion {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            other => Err(PipelineError::ConfigError(format!(
                "unknown criterion '{}' (expected gini or entropy)",
                other
            ))),
        }
    }

    /// Impurity of a node holding `positives` out of `count` samples
    fn impurity(&self, positives: f64, count: f64) -> f64 {
        if count <= 0.0 {
            return 0.0;
        }
        let p = positives / count;
        match self {
            Criterion::Gini => 2.0 * p * (1.0 - p),
            Criterion::Entropy => {
                let term = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                term(p) + term(1.0 - p)
            }
        }
    }
}

/// Best split found for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Nodes smaller than this become leaves
    pub min_samples_split: usize,
    /// Smallest child a split may produce
    pub min_samples_leaf: usize,
    /// Number of features examined at each node (all when `None`)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub random_state: u64,
    n_features: usize,
    /// Impurity-decrease feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set number of features examined per node
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;

        let n_features = x.ncols();
        self.n_features = n_features;

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..x.nrows()).collect();

        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let positives: f64 = indices.iter().map(|&i| y[i]).sum();
        let leaf = TreeNode::Leaf {
            value: if n_samples > 0 { positives / n_samples as f64 } else { 0.0 },
            n_samples,
        };

        let is_pure = positives == 0.0 || positives == n_samples as f64;
        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure
        {
            return leaf;
        }

        let parent_impurity = self.criterion.impurity(positives, n_samples as f64);
        let features = self.candidate_features(rng);

        let best = match self.find_best_split(x, y, indices, &features, positives, parent_impurity) {
            Some(best) => best,
            None => return leaf,
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return leaf;
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = self.build_tree(x, y, &left_indices, depth + 1, importances, rng);
        let right = self.build_tree(x, y, &right_indices, depth + 1, importances, rng);

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.unwrap_or(self.n_features).clamp(1, self.n_features.max(1));
        if k >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut features = rand::seq::index::sample(rng, self.n_features, k).into_vec();
        features.sort_unstable();
        features
    }

    /// Sorted sweep per feature: one sort, then running positive counts give
    /// the impurity of every threshold in a single pass.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        total_pos: f64,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.min_samples_leaf;

        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut sorted: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                let mut best: Option<SplitCandidate> = None;
                let mut left_pos = 0.0;

                for pos in 0..n - 1 {
                    left_pos += sorted[pos].1;
                    let left_n = pos + 1;
                    let right_n = n - left_n;

                    if sorted[pos + 1].0 - sorted[pos].0 <= 1e-12 {
                        continue;
                    }
                    if left_n < min_leaf || right_n < min_leaf {
                        continue;
                    }

                    let left_imp = self.criterion.impurity(left_pos, left_n as f64);
                    let right_imp = self.criterion.impurity(total_pos - left_pos, right_n as f64);
                    let weighted = (left_n as f64 * left_imp + right_n as f64 * right_imp) / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (sorted[pos].0 + sorted[pos + 1].0) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // Sequential reduction keeps the lowest feature index on ties
        per_feature.into_iter().flatten().fold(None, |acc: Option<SplitCandidate>, cand| {
            match acc {
                Some(a) if a.gain >= cand.gain => Some(a),
                _ => Some(cand),
            }
        })
    }

    fn root(&self) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        Ok(root)
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root()?;
        check_width(self.n_features, x)?;
        Ok(x.rows().into_iter().map(|row| root.predict(row)).collect())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_single_threshold_separates_classes() {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_probabilities_are_leaf_fractions() {
        let x = array![[1.0], [1.0], [1.0], [5.0], [5.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&array![[1.0], [5.0]]).unwrap();
        assert!((proba[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((proba[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 1.0], [6.0, 0.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(Some(2));
        tree.fit(&x, &y).unwrap();

        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_splits() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 0.0, 0.0, 0.0];

        let mut tree = DecisionTree::new().with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();

        // The only pure split isolates one sample, which is not allowed
        let proba = tree.predict_proba(&array![[1.0]]).unwrap();
        assert!(proba[0] < 1.0);
    }

    #[test]
    fn test_unknown_criterion() {
        assert!(Criterion::parse("mse").is_err());
        assert_eq!(Criterion::parse("gini").unwrap(), Criterion::Gini);
    }
}
