//! Ensemble methods module
//!
//! Stacking (meta-learning) over tuned base classifiers.

mod stacking;

pub use stacking::{BaseLearner, EnsembleComposer, StackingClassifier, StackingConfig};
