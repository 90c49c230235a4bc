//! Cross-validation splitters

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold splitter. Each class is shuffled with the seed and dealt
/// round-robin across folds.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    n_splits: usize,
    random_state: u64,
}

impl CrossValidator {
    pub fn stratified(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            random_state: seed,
        }
    }

    /// Train/test index pairs, one per fold
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        Self::check_sizes(y.len(), self.n_splits)?;
        self.stratified_folds(y)
    }

    fn check_sizes(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(PipelineError::ValidationError(
                "n_splits must be at least 2".to_string()
            ));
        }
        if n_samples < n_splits {
            return Err(PipelineError::ValidationError(
                format!("n_samples ({}) must be >= n_splits ({})", n_samples, n_splits)
            ));
        }
        Ok(())
    }

    fn stratified_folds(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;

        // Ordered by class so the rng is consumed the same way on every run
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
        }

        // Deal each class round-robin, continuing where the previous class stopped
        // so fold sizes never differ by more than one.
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[offset % n_splits].push(idx);
                offset += 1;
            }
        }

        Ok(Self::splits_from_folds(folds))
    }

    fn splits_from_folds(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Per-fold scores with their mean and population std
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced_labels(n: usize, positives_every: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| if i % positives_every == 0 { 1.0 } else { 0.0 }))
    }

    #[test]
    fn test_folds_cover_every_row_once() {
        let y = imbalanced_labels(100, 4);
        let splits = CrossValidator::stratified(5, 3).split(&y).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_k_fold_preserves_ratio() {
        let y = imbalanced_labels(100, 5); // 20 positives
        let splits = CrossValidator::stratified(5, 7).split(&y).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            let positives = split.test_indices.iter().filter(|&&i| y[i] > 0.5).count();
            assert_eq!(positives, 4);
            assert_eq!(split.test_indices.len(), 20);
        }
    }

    #[test]
    fn test_train_and_test_disjoint() {
        let y = imbalanced_labels(53, 3);
        let splits = CrossValidator::stratified(4, 1).split(&y).unwrap();
        for split in &splits {
            for idx in &split.test_indices {
                assert!(!split.train_indices.contains(idx));
            }
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 53);
        }
    }

    #[test]
    fn test_stratified_is_deterministic() {
        let y = imbalanced_labels(60, 4);
        let a = CrossValidator::stratified(5, 99).split(&y).unwrap();
        let b = CrossValidator::stratified(5, 99).split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_samples() {
        let y = imbalanced_labels(3, 2);
        let cv = CrossValidator::stratified(5, 0);
        assert!(matches!(cv.split(&y), Err(PipelineError::ValidationError(_))));
        assert!(matches!(
            CrossValidator::stratified(1, 0).split(&y),
            Err(PipelineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_fold_score_summary() {
        let results = CVResults::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((results.mean_score - 0.9).abs() < 1e-12);
        assert!(results.std_score > 0.0);
        assert_eq!(results.n_folds, 3);
    }
}
