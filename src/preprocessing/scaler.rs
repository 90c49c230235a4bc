//! Feature scaling

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Uses the population standard deviation. Columns with zero spread keep a
/// scale of 1 so they map to all zeros instead of NaN.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Option<Array1<f64>>,
    scales: Option<Array1<f64>>,
    constant_columns: Vec<usize>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let means = x.mean_axis(Axis(0)).ok_or_else(|| {
            PipelineError::ValidationError("cannot fit a scaler on zero rows".to_string())
        })?;
        let stds = x.std_axis(Axis(0), 0.0);

        self.constant_columns = stds
            .iter()
            .enumerate()
            .filter(|(_, &s)| s == 0.0)
            .map(|(i, _)| i)
            .collect();
        self.scales = Some(stds.mapv(|s| if s == 0.0 { 1.0 } else { s }));
        self.means = Some(means);
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, scales) = match (&self.means, &self.scales) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        if x.ncols() != means.len() {
            return Err(PipelineError::shape(
                format!("{} columns", means.len()),
                format!("{} columns", x.ncols()),
            ));
        }
        Ok((x - means) / scales)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match (&self.means, &self.scales) {
            (Some(means), Some(scales)) => Ok(x * scales + means),
            _ => Err(PipelineError::ModelNotFitted),
        }
    }

    pub fn means(&self) -> Option<&Array1<f64>> {
        self.means.as_ref()
    }

    pub fn scales(&self) -> Option<&Array1<f64>> {
        self.scales.as_ref()
    }

    /// Indices of columns that had zero spread during fit
    pub fn constant_columns(&self) -> &[usize] {
        &self.constant_columns
    }
}
