//! Cross-validated grid search over one model family

use super::grid::HyperparameterGrid;
use crate::error::{PipelineError, Result};
use crate::evaluation::ScoringMetric;
use crate::training::linear_models::check_xy;
use crate::training::{
    CVResults, Classifier, CrossValidator, ModelFamily, ModelSpec, ParamSet, TrainedModel,
};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Configuration for cross-validated search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Stratified folds per configuration
    pub folds: usize,
    /// Metric to maximize
    pub scoring: ScoringMetric,
    /// Seeds fold shuffling and every randomized estimator
    pub seed: u64,
    /// Dedicated worker count; the global rayon pool when `None`
    pub n_jobs: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            scoring: ScoringMetric::RocAuc,
            seed: 42,
            n_jobs: None,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringMetric) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }
}

/// Cross-validated score of one grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Position in enumeration order
    pub config_index: usize,
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1-based position in the leaderboard
    pub rank: usize,
}

/// Outcome of one (configuration, fold) unit of work
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScore {
    pub config_index: usize,
    pub fold_index: usize,
    pub score: f64,
}

/// Winner of a grid search plus the full leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub family: ModelFamily,
    pub best_spec: ModelSpec,
    pub best_params: ParamSet,
    pub best_score: f64,
    /// Per-fold scores of the winning configuration
    pub fold_scores: Vec<f64>,
    /// Every configuration, best first (ties in enumeration order)
    pub candidates: Vec<CandidateScore>,
    /// Winner refit on the full training partition
    #[serde(skip)]
    pub model: TrainedModel,
    pub elapsed_secs: f64,
}

/// Group unit scores by configuration and pick the highest mean.
///
/// Ties go to the configuration that comes first in enumeration order. Returns the
/// winner's index and the leaderboard.
pub fn aggregate_units(params: &[ParamSet], units: &[UnitScore]) -> (usize, Vec<CandidateScore>) {
    let mut per_config: Vec<Vec<(usize, f64)>> = vec![Vec::new(); params.len()];
    for unit in units {
        per_config[unit.config_index].push((unit.fold_index, unit.score));
    }

    let mut candidates: Vec<CandidateScore> = per_config
        .into_iter()
        .enumerate()
        .map(|(config_index, mut scores)| {
            scores.sort_by_key(|(fold, _)| *fold);
            let cv = CVResults::from_scores(scores.into_iter().map(|(_, s)| s).collect());
            CandidateScore {
                config_index,
                params: params[config_index].clone(),
                fold_scores: cv.scores,
                mean_score: cv.mean_score,
                std_score: cv.std_score,
                rank: 0,
            }
        })
        .collect();

    // Stable sort keeps enumeration order among equal means
    candidates.sort_by(|a, b| {
        b.mean_score
            .partial_cmp(&a.mean_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (pos, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = pos + 1;
    }

    let best = candidates.first().map(|c| c.config_index).unwrap_or(0);
    (best, candidates)
}

struct FoldData {
    train_x: Array2<f64>,
    train_y: Array1<f64>,
    test_x: Array2<f64>,
    test_y: Array1<f64>,
}

/// Runs k-fold cross-validated grid search for one model family
#[derive(Debug, Clone, Default)]
pub struct ModelSearchRunner {
    config: SearchConfig,
}

impl ModelSearchRunner {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search `grid` for `family`, then refit the winner on all of `x`/`y`.
    ///
    /// Inputs are only read.
    pub fn search(
        &self,
        family: ModelFamily,
        grid: &HyperparameterGrid,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let combos = grid.combinations()?;
        let specs: Vec<ModelSpec> = combos
            .iter()
            .map(|params| ModelSpec::new(family, params.clone()))
            .collect();
        // Reject bad names and types before any fitting
        for spec in &specs {
            spec.validate()?;
        }

        check_xy(x, y)?;
        let splits = CrossValidator::stratified(self.config.folds, self.config.seed).split(y)?;
        let folds: Vec<FoldData> = splits
            .iter()
            .map(|split| FoldData {
                train_x: x.select(Axis(0), &split.train_indices),
                train_y: y.select(Axis(0), &split.train_indices),
                test_x: x.select(Axis(0), &split.test_indices),
                test_y: y.select(Axis(0), &split.test_indices),
            })
            .collect();

        info!(
            family = %family,
            configs = specs.len(),
            folds = folds.len(),
            scoring = %self.config.scoring,
            "starting grid search"
        );

        let units: Vec<(usize, usize)> = (0..specs.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let outcomes = match self.config.n_jobs {
            Some(n_jobs) => rayon::ThreadPoolBuilder::new()
                .num_threads(n_jobs)
                .build()?
                .install(|| self.run_units(&units, &specs, &folds)),
            None => self.run_units(&units, &specs, &folds),
        };
        // Units come back in submission order, so the first error is deterministic
        let unit_scores = outcomes.into_iter().collect::<Result<Vec<UnitScore>>>()?;

        let (best_idx, candidates) = aggregate_units(&combos, &unit_scores);
        let winner = candidates
            .iter()
            .find(|c| c.config_index == best_idx)
            .cloned()
            .ok_or_else(|| PipelineError::TrainingError("grid search produced no candidates".to_string()))?;

        let best_spec = specs[best_idx].clone();
        let mut model = best_spec.build(self.config.seed)?;
        model.fit(x, y)?;

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            family = %family,
            best = %best_spec.params,
            score = winner.mean_score,
            elapsed_secs,
            "grid search finished"
        );

        Ok(SearchResult {
            family,
            best_params: best_spec.params.clone(),
            best_spec,
            best_score: winner.mean_score,
            fold_scores: winner.fold_scores,
            candidates,
            model,
            elapsed_secs,
        })
    }

    fn run_units(
        &self,
        units: &[(usize, usize)],
        specs: &[ModelSpec],
        folds: &[FoldData],
    ) -> Vec<Result<UnitScore>> {
        units
            .par_iter()
            .map(|&(config_index, fold_index)| {
                let fold = &folds[fold_index];
                let mut model = specs[config_index].build(self.config.seed)?;
                model.fit(&fold.train_x, &fold.train_y)?;
                let score = self.config.scoring.score(&model, &fold.test_x, &fold.test_y)?;
                debug!(config = config_index, fold = fold_index, score, "unit scored");
                Ok(UnitScore {
                    config_index,
                    fold_index,
                    score,
                })
            })
            .collect()
    }
}
