//! churnlab - Tabular ML experiment pipeline
//!
//! This crate turns a delimited table into a tuned, evaluated binary
//! classifier:
//! - Data preparation: identifier removal, categorical encoding, stratified
//!   split, standard scaling
//! - Cross-validated grid search per model family
//! - Stacking ensembles over the tuned models
//! - Evaluation with confusion matrix, classification report and ROC statistics
//! - Feature-importance ranking for tree models
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Encoding, splitting and scaling
//! - [`training`] - Classifier contract and the built-in estimators
//! - [`optimizer`] - Grid search with stratified k-fold scoring
//! - [`ensemble`] - Stacking
//! - [`evaluation`] - Metrics and evaluation reports
//! - [`explainability`] - Feature-importance ranking
//!
//! ## Orchestration
//! - [`pipeline`] - End-to-end experiment runs and reports
//! - [`synthetic`] - Churn-shaped synthetic tables
//! - [`utils`] - CSV loading and dataset summaries
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod ensemble;
pub mod evaluation;
pub mod explainability;

// Orchestration
pub mod pipeline;
pub mod synthetic;
pub mod utils;
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Preprocessing
    pub use crate::preprocessing::{DataConfig, DataPreparer, DerivedFeature, PreparedData, SplitConfig};

    // Training
    pub use crate::training::{Capabilities, Classifier, ModelFamily, ModelSpec, ParamSet, ParamValue, TrainedModel};

    // Optimization
    pub use crate::optimizer::{HyperparameterGrid, ModelSearchRunner, SearchConfig, SearchResult};

    // Ensemble
    pub use crate::ensemble::{EnsembleComposer, StackingClassifier, StackingConfig};

    // Evaluation
    pub use crate::evaluation::{EvaluationReport, Evaluator, ScoringMetric};

    // Explainability
    pub use crate::explainability::{FeatureImportance, ImportanceReporter};

    // Pipeline
    pub use crate::pipeline::{ExperimentPipeline, ModelEntry, PipelineConfig, PipelineReport};

    // Synthetic data
    pub use crate::synthetic::{synthetic_churn, ChurnGenerator};
}
