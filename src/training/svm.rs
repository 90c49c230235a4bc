//! Linear support vector machine (hinge loss, label output only)

use super::linear_models::{check_width, check_xy};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Linear SVM trained with full-batch subgradient descent on the hinge loss.
///
/// Produces hard labels only; it carries no calibrated probability output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvm {
    pub weights: Option<Array1<f64>>,
    pub bias: f64,
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
}

impl Default for LinearSvm {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearSvm {
    pub fn new() -> Self {
        Self {
            weights: None,
            bias: 0.0,
            c: 1.0,
            max_iter: 500,
            learning_rate: 0.05,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        if self.c <= 0.0 {
            return Err(PipelineError::ConfigError(format!(
                "linear SVM requires c > 0, got {}",
                self.c
            )));
        }

        let n_samples = x.nrows() as f64;
        let alpha = 1.0 / (self.c * n_samples);
        // Hinge loss works on ±1 targets
        let signed = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });

        let mut weights: Array1<f64> = Array1::zeros(x.ncols());
        let mut bias = 0.0;

        for iter in 0..self.max_iter {
            let margins = (x.dot(&weights) + bias) * &signed;
            // Subgradient only flows through margin violators
            let active = margins.mapv(|m| if m < 1.0 { 1.0 } else { 0.0 }) * &signed;

            let grad_w = -x.t().dot(&active) / n_samples;
            let grad_b = -active.sum() / n_samples;

            let lr = self.learning_rate / (1.0 + 0.01 * iter as f64);
            weights = (weights - lr * grad_w) / (1.0 + lr * alpha);
            bias -= lr * grad_b;
        }

        self.weights = Some(weights);
        self.bias = bias;
        Ok(self)
    }

    /// Signed distance to the separating hyperplane (unscaled)
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_width(weights.len(), x)?;
        Ok(x.dot(weights) + self.bias)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| if d >= 0.0 { 1.0 } else { 0.0 }))
    }
}
