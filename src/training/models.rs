//! Classifier contract, model families and buildable model specs

use super::decision_tree::{Criterion, DecisionTree};
use super::linear_models::LogisticRegression;
use super::params::ParamSet;
use super::random_forest::{MaxFeatures, RandomForest};
use super::svm::LinearSvm;
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a fitted model can report beyond hard labels.
///
/// Consumers check these flags before asking; they never call and catch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_probability: bool,
    pub supports_importance: bool,
}

impl Capabilities {
    pub const LABELS_ONLY: Capabilities = Capabilities {
        supports_probability: false,
        supports_importance: false,
    };
}

/// Binary classifier over dense `f64` features with 0/1 labels
pub trait Classifier: Send + Sync {
    /// Display name used in reports and errors
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Hard 0/1 predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Positive-class probabilities
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Err(PipelineError::unsupported(self.name(), "probability estimates"))
    }

    /// One non-negative weight per input feature
    fn feature_importances(&self) -> Result<Array1<f64>> {
        Err(PipelineError::unsupported(self.name(), "feature importances"))
    }
}

/// Scores usable for ranking: probabilities when available, hard labels otherwise
pub fn ranking_scores(model: &dyn Classifier, x: &Array2<f64>) -> Result<Array1<f64>> {
    if model.capabilities().supports_probability {
        model.predict_proba(x)
    } else {
        model.predict(x)
    }
}

/// Estimator families the pipeline can search over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    DecisionTree,
    RandomForest,
    Xgboost,
    LinearSvm,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::LogisticRegression,
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
        ModelFamily::Xgboost,
        ModelFamily::LinearSvm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_regression",
            ModelFamily::DecisionTree => "decision_tree",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::Xgboost => "xgboost",
            ModelFamily::LinearSvm => "linear_svm",
        }
    }

    /// Hyperparameter names accepted by this family
    pub fn known_params(&self) -> &'static [&'static str] {
        match self {
            ModelFamily::LogisticRegression => &["c", "learning_rate", "max_iter", "tol"],
            ModelFamily::DecisionTree => &[
                "criterion",
                "max_depth",
                "max_features",
                "min_samples_leaf",
                "min_samples_split",
            ],
            ModelFamily::RandomForest => &[
                "bootstrap",
                "max_depth",
                "max_features",
                "min_samples_leaf",
                "min_samples_split",
                "n_estimators",
            ],
            ModelFamily::Xgboost => &[
                "colsample_bytree",
                "gamma",
                "learning_rate",
                "max_depth",
                "min_child_weight",
                "n_estimators",
                "reg_alpha",
                "reg_lambda",
                "subsample",
            ],
            ModelFamily::LinearSvm => &["c", "learning_rate", "max_iter"],
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            ModelFamily::LogisticRegression => Capabilities {
                supports_probability: true,
                supports_importance: false,
            },
            ModelFamily::DecisionTree | ModelFamily::RandomForest | ModelFamily::Xgboost => {
                Capabilities {
                    supports_probability: true,
                    supports_importance: true,
                }
            }
            ModelFamily::LinearSvm => Capabilities::LABELS_ONLY,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        ModelFamily::ALL
            .iter()
            .copied()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| {
                PipelineError::ConfigError(format!(
                    "unknown model family '{}' (expected one of: {})",
                    s,
                    ModelFamily::ALL.map(|f| f.as_str()).join(", ")
                ))
            })
    }
}

/// A model family plus one concrete configuration; builds fresh unfitted estimators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub family: ModelFamily,
    #[serde(default)]
    pub params: ParamSet,
}

impl ModelSpec {
    pub fn new(family: ModelFamily, params: ParamSet) -> Self {
        Self { family, params }
    }

    /// Family defaults, no overrides
    pub fn defaults(family: ModelFamily) -> Self {
        Self::new(family, ParamSet::new())
    }

    /// Check names and value types without building anything
    pub fn validate(&self) -> Result<()> {
        self.build(0).map(|_| ())
    }

    /// Build an unfitted estimator; `seed` drives every randomized family
    pub fn build(&self, seed: u64) -> Result<TrainedModel> {
        let p = &self.params;
        p.ensure_known(self.family.as_str(), self.family.known_params())?;

        let kind = match self.family {
            ModelFamily::LogisticRegression => ModelKind::LogisticRegression(
                LogisticRegression::new()
                    .with_c(p.get_f64("c", 1.0)?)
                    .with_max_iter(p.get_usize("max_iter", 1000)?)
                    .with_learning_rate(p.get_f64("learning_rate", 0.1)?)
                    .with_tol(p.get_f64("tol", 1e-6)?),
            ),
            ModelFamily::DecisionTree => {
                let max_features = match p.get("max_features") {
                    Some(value) => MaxFeatures::from_param(value)?,
                    None => MaxFeatures::All,
                };
                ModelKind::DecisionTree {
                    tree: DecisionTree::new()
                        .with_max_depth(p.get_opt_usize("max_depth", None)?)
                        .with_min_samples_split(p.get_usize("min_samples_split", 2)?)
                        .with_min_samples_leaf(p.get_usize("min_samples_leaf", 1)?)
                        .with_criterion(Criterion::parse(&p.get_str("criterion", "gini")?)?)
                        .with_random_state(seed),
                    max_features,
                }
            }
            ModelFamily::RandomForest => {
                let max_features = match p.get("max_features") {
                    Some(value) => MaxFeatures::from_param(value)?,
                    None => MaxFeatures::Sqrt,
                };
                ModelKind::RandomForest(
                    RandomForest::new(p.get_usize("n_estimators", 100)?)
                        .with_max_depth(p.get_opt_usize("max_depth", None)?)
                        .with_min_samples_split(p.get_usize("min_samples_split", 2)?)
                        .with_min_samples_leaf(p.get_usize("min_samples_leaf", 1)?)
                        .with_max_features(max_features)
                        .with_bootstrap(p.get_bool("bootstrap", true)?)
                        .with_random_state(seed),
                )
            }
            ModelFamily::Xgboost => {
                let defaults = XGBoostConfig::default();
                ModelKind::Xgboost(XGBoostClassifier::new(XGBoostConfig {
                    n_estimators: p.get_usize("n_estimators", defaults.n_estimators)?,
                    learning_rate: p.get_f64("learning_rate", defaults.learning_rate)?,
                    max_depth: p.get_usize("max_depth", defaults.max_depth)?,
                    min_child_weight: p.get_f64("min_child_weight", defaults.min_child_weight)?,
                    reg_lambda: p.get_f64("reg_lambda", defaults.reg_lambda)?,
                    reg_alpha: p.get_f64("reg_alpha", defaults.reg_alpha)?,
                    gamma: p.get_f64("gamma", defaults.gamma)?,
                    subsample: p.get_f64("subsample", defaults.subsample)?,
                    colsample_bytree: p.get_f64("colsample_bytree", defaults.colsample_bytree)?,
                    random_state: seed,
                }))
            }
            ModelFamily::LinearSvm => ModelKind::LinearSvm(
                LinearSvm::new()
                    .with_c(p.get_f64("c", 1.0)?)
                    .with_max_iter(p.get_usize("max_iter", 500)?)
                    .with_learning_rate(p.get_f64("learning_rate", 0.05)?),
            ),
        };

        Ok(TrainedModel {
            spec: self.clone(),
            seed,
            fitted: false,
            kind,
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.family, self.params)
    }
}

/// Wrapper over the concrete estimators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression(LogisticRegression),
    DecisionTree {
        tree: DecisionTree,
        max_features: MaxFeatures,
    },
    RandomForest(RandomForest),
    Xgboost(XGBoostClassifier),
    LinearSvm(LinearSvm),
}

/// An estimator built from a [`ModelSpec`], fitted or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    spec: ModelSpec,
    seed: u64,
    fitted: bool,
    kind: ModelKind,
}

impl TrainedModel {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn family(&self) -> ModelFamily {
        self.spec.family
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    /// Fresh unfitted copy with the same spec and seed
    pub fn unfitted_clone(&self) -> Result<TrainedModel> {
        self.spec.build(self.seed)
    }

    fn ensure_fitted(&self) -> Result<()> {
        if self.fitted {
            Ok(())
        } else {
            Err(PipelineError::ModelNotFitted)
        }
    }
}

impl Classifier for TrainedModel {
    fn name(&self) -> &str {
        self.spec.family.as_str()
    }

    fn capabilities(&self) -> Capabilities {
        self.spec.family.capabilities()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match &mut self.kind {
            ModelKind::LogisticRegression(m) => {
                m.fit(x, y)?;
            }
            ModelKind::DecisionTree { tree, max_features } => {
                tree.max_features = Some(max_features.resolve(x.ncols()));
                tree.fit(x, y)?;
            }
            ModelKind::RandomForest(m) => {
                m.fit(x, y)?;
            }
            ModelKind::Xgboost(m) => {
                m.fit(x, y)?;
            }
            ModelKind::LinearSvm(m) => {
                m.fit(x, y)?;
            }
        }
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensure_fitted()?;
        match &self.kind {
            ModelKind::LogisticRegression(m) => m.predict(x),
            ModelKind::DecisionTree { tree, .. } => tree.predict(x),
            ModelKind::RandomForest(m) => m.predict(x),
            ModelKind::Xgboost(m) => m.predict(x),
            ModelKind::LinearSvm(m) => m.predict(x),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensure_fitted()?;
        match &self.kind {
            ModelKind::LogisticRegression(m) => m.predict_proba(x),
            ModelKind::DecisionTree { tree, .. } => tree.predict_proba(x),
            ModelKind::RandomForest(m) => m.predict_proba(x),
            ModelKind::Xgboost(m) => m.predict_proba(x),
            ModelKind::LinearSvm(_) => {
                Err(PipelineError::unsupported(self.name(), "probability estimates"))
            }
        }
    }

    fn feature_importances(&self) -> Result<Array1<f64>> {
        self.ensure_fitted()?;
        let importances = match &self.kind {
            ModelKind::DecisionTree { tree, .. } => tree.feature_importances().cloned(),
            ModelKind::RandomForest(m) => m.feature_importances().cloned(),
            ModelKind::Xgboost(m) => m.feature_importances(),
            ModelKind::LogisticRegression(_) | ModelKind::LinearSvm(_) => {
                return Err(PipelineError::unsupported(self.name(), "feature importances"));
            }
        };
        importances.ok_or(PipelineError::ModelNotFitted)
    }
}
