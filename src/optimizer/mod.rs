//! Hyperparameter search module
//!
//! Exhaustive grid search scored with stratified k-fold cross-validation.
//! Every (configuration, fold) pair is an independent unit of work; the
//! winner is chosen afterwards by a pure aggregation over unit scores.

mod grid;
mod search;

pub use grid::HyperparameterGrid;
pub use search::{
    aggregate_units, CandidateScore, ModelSearchRunner, SearchConfig, SearchResult, UnitScore,
};
