//! Stacking ensemble method

use crate::error::{PipelineError, Result};
use crate::training::linear_models::check_width;
use crate::training::{
    ranking_scores, CVSplit, Capabilities, Classifier, CrossValidator, ModelSpec, TrainedModel,
};
use ndarray::{s, Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for stacking ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingConfig {
    /// Number of stratified folds used for out-of-fold predictions
    pub folds: usize,
    /// Random seed for fold shuffling and the meta-model
    pub seed: u64,
    /// Whether to include original features in meta-learner input
    pub passthrough: bool,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: 42,
            passthrough: false,
        }
    }
}

/// A named base estimator inside the stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseLearner {
    pub name: String,
    pub model: TrainedModel,
}

/// Stacking classifier: a meta-model fit on out-of-fold base outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingClassifier {
    config: StackingConfig,
    base_models: Vec<BaseLearner>,
    meta_spec: ModelSpec,
    meta_model: Option<TrainedModel>,
    splits: Vec<CVSplit>,
    oof_features: Option<Array2<f64>>,
    n_features: usize,
}

impl StackingClassifier {
    /// Unfitted stack over `base_models`; only their specs and seeds are used when fitting
    pub fn new(config: StackingConfig, base_models: Vec<BaseLearner>, meta_spec: ModelSpec) -> Self {
        Self {
            config,
            base_models,
            meta_spec,
            meta_model: None,
            splits: Vec::new(),
            oof_features: None,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &StackingConfig {
        &self.config
    }

    pub fn base_models(&self) -> &[BaseLearner] {
        &self.base_models
    }

    pub fn meta_model(&self) -> Option<&TrainedModel> {
        self.meta_model.as_ref()
    }

    /// Fold splits used to build the out-of-fold matrix
    pub fn splits(&self) -> &[CVSplit] {
        &self.splits
    }

    /// The matrix the meta-model was fit on, one column per base (plus passthrough)
    pub fn out_of_fold_features(&self) -> Option<&Array2<f64>> {
        self.oof_features.as_ref()
    }

    fn meta_width(&self, n_features: usize) -> usize {
        if self.config.passthrough {
            self.base_models.len() + n_features
        } else {
            self.base_models.len()
        }
    }

    fn append_passthrough(&self, meta: &mut Array2<f64>, x: &Array2<f64>) {
        if self.config.passthrough {
            let n_base = self.base_models.len();
            meta.slice_mut(s![.., n_base..]).assign(x);
        }
    }

    /// Out-of-fold base outputs: each row is scored by an instance that never saw it
    fn out_of_fold(&self, x: &Array2<f64>, y: &Array1<f64>, splits: &[CVSplit]) -> Result<Array2<f64>> {
        let units: Vec<(usize, usize)> = (0..self.base_models.len())
            .flat_map(|b| (0..splits.len()).map(move |f| (b, f)))
            .collect();

        let outputs: Vec<Result<(usize, usize, Array1<f64>)>> = units
            .par_iter()
            .map(|&(base_idx, fold_idx)| {
                let split = &splits[fold_idx];
                let mut model = self.base_models[base_idx].model.unfitted_clone()?;
                model.fit(
                    &x.select(Axis(0), &split.train_indices),
                    &y.select(Axis(0), &split.train_indices),
                )?;
                let held_out = x.select(Axis(0), &split.test_indices);
                Ok((base_idx, fold_idx, ranking_scores(&model, &held_out)?))
            })
            .collect();

        let mut meta = Array2::zeros((x.nrows(), self.meta_width(x.ncols())));
        for output in outputs {
            let (base_idx, fold_idx, scores) = output?;
            for (&row, &score) in splits[fold_idx].test_indices.iter().zip(scores.iter()) {
                meta[[row, base_idx]] = score;
            }
        }
        self.append_passthrough(&mut meta, x);
        Ok(meta)
    }

    /// Base outputs on new data from the full-train base models
    fn meta_features(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(self.n_features, x)?;
        let mut meta = Array2::zeros((x.nrows(), self.meta_width(x.ncols())));
        for (base_idx, base) in self.base_models.iter().enumerate() {
            meta.column_mut(base_idx).assign(&ranking_scores(&base.model, x)?);
        }
        self.append_passthrough(&mut meta, x);
        Ok(meta)
    }

    fn fitted_meta(&self) -> Result<&TrainedModel> {
        self.meta_model.as_ref().ok_or(PipelineError::ModelNotFitted)
    }
}

impl Classifier for StackingClassifier {
    fn name(&self) -> &str {
        "stacking"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_probability: self.meta_spec.family.capabilities().supports_probability,
            supports_importance: false,
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.base_models.is_empty() {
            return Err(PipelineError::ValidationError(
                "stacking needs at least one base model".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::shape(
                format!("y length = {}", x.nrows()),
                format!("y length = {}", y.len()),
            ));
        }

        let splits = CrossValidator::stratified(self.config.folds, self.config.seed).split(y)?;
        let oof = self.out_of_fold(x, y, &splits)?;
        debug!(rows = oof.nrows(), cols = oof.ncols(), "out-of-fold matrix built");

        let mut meta_model = self.meta_spec.build(self.config.seed)?;
        meta_model.fit(&oof, y)?;

        // Inference uses bases refit on the whole training partition
        let refit: Vec<BaseLearner> = self
            .base_models
            .par_iter()
            .map(|base| {
                let mut model = base.model.unfitted_clone()?;
                model.fit(x, y)?;
                Ok(BaseLearner {
                    name: base.name.clone(),
                    model,
                })
            })
            .collect::<Vec<Result<BaseLearner>>>()
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        self.base_models = refit;
        self.meta_model = Some(meta_model);
        self.splits = splits;
        self.oof_features = Some(oof);
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let meta = self.fitted_meta()?;
        meta.predict(&self.meta_features(x)?)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let meta = self.fitted_meta()?;
        if !self.capabilities().supports_probability {
            return Err(PipelineError::unsupported(self.name(), "probability estimates"));
        }
        meta.predict_proba(&self.meta_features(x)?)
    }
}

/// Builds stacking ensembles from already tuned base models
#[derive(Debug, Clone, Default)]
pub struct EnsembleComposer {
    config: StackingConfig,
}

impl EnsembleComposer {
    pub fn new(config: StackingConfig) -> Self {
        Self { config }
    }

    /// Fit a stack whose meta-model is built from `meta_spec`
    pub fn compose_stack(
        &self,
        base_models: &[(String, TrainedModel)],
        meta_spec: &ModelSpec,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<StackingClassifier> {
        let bases = base_models
            .iter()
            .map(|(name, model)| BaseLearner {
                name: name.clone(),
                model: model.clone(),
            })
            .collect();

        let mut stack = StackingClassifier::new(self.config.clone(), bases, meta_spec.clone());
        stack.fit(x, y)?;

        info!(
            bases = base_models.len(),
            meta = %meta_spec,
            folds = self.config.folds,
            passthrough = self.config.passthrough,
            "stacking ensemble fitted"
        );
        Ok(stack)
    }
}
