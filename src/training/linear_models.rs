//! Linear model implementations

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Numerically stable logistic function
pub(crate) fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::shape(
            format!("y length = {}", x.nrows()),
            format!("y length = {}", y.len()),
        ));
    }
    if x.nrows() == 0 {
        return Err(PipelineError::ValidationError(
            "cannot fit on an empty training set".to_string(),
        ));
    }
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::ValidationError(
            "binary classifiers expect labels encoded as 0/1".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_width(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(PipelineError::shape(
            format!("{} features", expected),
            format!("{} features", x.ncols()),
        ));
    }
    Ok(())
}

/// Logistic regression for binary classification
///
/// `c` is the inverse regularization strength: the L2 penalty applied per
/// sample is `1 / (c * n_samples)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            is_fitted: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set convergence tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Fit the model using batch gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        if self.c <= 0.0 {
            return Err(PipelineError::ConfigError(format!(
                "logistic regression requires c > 0, got {}",
                self.c
            )));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let alpha = 1.0 / (self.c * n_samples as f64);
        let lr = self.learning_rate;

        let mut weights: Array1<f64> = Array1::zeros(n_features);
        let mut bias = 0.0;

        for _ in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let errors = linear.mapv(sigmoid) - y;

            let loss_grad = x.t().dot(&errors) / n_samples as f64;
            let db = errors.mean().unwrap_or(0.0);

            let dw = &loss_grad + &(alpha * &weights);
            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            // Proximal L2 step: stable for any c
            weights = (weights - lr * loss_grad) / (1.0 + lr * alpha);
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;

        Ok(self)
    }

    /// Raw linear scores `w·x + b`
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(PipelineError::ModelNotFitted),
        };
        check_width(coefficients.len(), x)?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    /// Predict positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-2.0, 0.5],
            [-1.5, -0.5],
            [-1.0, 0.0],
            [-0.5, 0.3],
            [0.5, -0.2],
            [1.0, 0.1],
            [1.5, 0.4],
            [2.0, -0.3],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_logistic_separable() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new().with_c(10.0);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        assert_eq!(preds, y);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[7] > proba[0]);
    }

    #[test]
    fn test_stronger_regularization_shrinks_weights() {
        let (x, y) = separable();
        let mut weak = LogisticRegression::new().with_c(100.0);
        let mut strong = LogisticRegression::new().with_c(0.01);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();

        let norm = |m: &LogisticRegression| m.coefficients.as_ref().unwrap().mapv(|v| v * v).sum();
        assert!(norm(&strong) < norm(&weak));
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(matches!(
            model.predict(&array![[1.0, 2.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let (x, _) = separable();
        let y = array![0.0, 1.0, 2.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        assert!(LogisticRegression::new().fit(&x, &y).is_err());
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert!(sigmoid(-1000.0).is_finite());
        assert!(sigmoid(1000.0).is_finite());
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
    }
}
