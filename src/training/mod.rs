//! Model training module
//!
//! Provides the binary classifiers the pipeline searches over:
//! - Logistic regression
//! - Decision trees and Random Forests
//! - XGBoost-style gradient boosting
//! - Linear Support Vector Machines
//!
//! plus the shared classifier contract, hyperparameter values and
//! cross-validation splitters.

pub mod cross_validation;
pub mod decision_tree;
pub mod linear_models;
pub mod models;
pub mod params;
pub mod random_forest;
pub mod svm;
pub mod xgboost;

pub use cross_validation::{CVResults, CVSplit, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use linear_models::LogisticRegression;
pub use models::{ranking_scores, Capabilities, Classifier, ModelFamily, ModelKind, ModelSpec, TrainedModel};
pub use params::{ParamSet, ParamValue};
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::LinearSvm;
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
