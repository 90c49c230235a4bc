//! Model explainability module
//!
//! Ranks the per-feature weights exposed by tree ensembles.

mod importance;

pub use importance::{FeatureImportance, ImportanceReporter};
