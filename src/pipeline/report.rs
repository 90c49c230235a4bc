//! Run report: JSON-serializable results plus a console rendering

use crate::error::Result;
use crate::evaluation::{EvaluationReport, ScoringMetric};
use crate::explainability::FeatureImportance;
use crate::optimizer::{CandidateScore, SearchResult};
use crate::training::{ModelFamily, ParamSet};
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Shape of the prepared data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_names: Vec<String>,
    pub positive_rate: f64,
    /// Original label values behind codes 0 and 1
    pub label_classes: [String; 2],
}

/// Grid search outcome for one configured model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub name: String,
    pub family: ModelFamily,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub fold_scores: Vec<f64>,
    pub candidates: Vec<CandidateScore>,
    pub elapsed_secs: f64,
}

impl SearchSummary {
    pub fn from_result(name: impl Into<String>, result: &SearchResult) -> Self {
        Self {
            name: name.into(),
            family: result.family,
            best_params: result.best_params.clone(),
            best_score: result.best_score,
            fold_scores: result.fold_scores.clone(),
            candidates: result.candidates.clone(),
            elapsed_secs: result.elapsed_secs,
        }
    }
}

/// Importance ranking for one model, or why there is none
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportanceOutcome {
    Ranked { features: Vec<FeatureImportance> },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceEntry {
    pub model: String,
    #[serde(flatten)]
    pub outcome: ImportanceOutcome,
}

/// Everything an experiment run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub scoring: ScoringMetric,
    pub dataset: DatasetSummary,
    pub searches: Vec<SearchSummary>,
    /// Test-set evaluation of each tuned model, in configuration order
    pub evaluations: Vec<EvaluationReport>,
    pub stacking: Option<EvaluationReport>,
    pub importances: Vec<ImportanceEntry>,
}

impl PipelineReport {
    /// Every evaluated model, stack last
    pub fn all_evaluations(&self) -> impl Iterator<Item = &EvaluationReport> {
        self.evaluations.iter().chain(self.stacking.iter())
    }

    /// Highest test ROC AUC, falling back to accuracy when no model has one
    pub fn best_model(&self) -> Option<&EvaluationReport> {
        let by_auc = self
            .all_evaluations()
            .filter(|r| r.roc_auc.is_some())
            .max_by(|a, b| a.roc_auc.unwrap_or(0.0).total_cmp(&b.roc_auc.unwrap_or(0.0)));
        by_auc.or_else(|| {
            self.all_evaluations()
                .max_by(|a, b| a.accuracy().total_cmp(&b.accuracy()))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Console text: leaderboards, per-model reports and importances
    pub fn render(&self) -> String {
        let mut out = String::new();
        let d = &self.dataset;

        section(&mut out, "Dataset");
        let _ = writeln!(
            out,
            "  {:<14} {} ({} train / {} test)",
            muted("Rows"),
            d.rows,
            d.train_rows,
            d.test_rows
        );
        let _ = writeln!(out, "  {:<14} {}", muted("Features"), d.feature_names.join(", "));
        let _ = writeln!(
            out,
            "  {:<14} {:.2}% ('{}')",
            muted("Positive rate"),
            d.positive_rate * 100.0,
            d.label_classes[1]
        );

        for search in &self.searches {
            section(&mut out, &format!("Search · {} ({})", search.name, self.scoring));
            let _ = writeln!(
                out,
                "  {:>4}  {:>8}  {:>8}  {}",
                muted("rank"),
                muted("mean"),
                muted("std"),
                muted("params")
            );
            for candidate in search.candidates.iter().take(10) {
                let line = format!(
                    "  {:>4}  {:>8.4}  {:>8.4}  {}",
                    candidate.rank, candidate.mean_score, candidate.std_score, candidate.params
                );
                if candidate.rank == 1 {
                    let _ = writeln!(out, "{}", line.green());
                } else {
                    let _ = writeln!(out, "{}", line);
                }
            }
            if search.candidates.len() > 10 {
                let _ = writeln!(out, "  {}", dim(&format!("… {} more", search.candidates.len() - 10)));
            }
        }

        for report in self.all_evaluations() {
            section(&mut out, &format!("Evaluation · {}", report.model_name));
            let cm = &report.confusion_matrix;
            let _ = writeln!(out, "  {}", muted("confusion matrix (rows = actual)"));
            let _ = writeln!(out, "  {:>8} {:>8}", cm.true_negatives, cm.false_positives);
            let _ = writeln!(out, "  {:>8} {:>8}", cm.false_negatives, cm.true_positives);
            let _ = writeln!(out);
            for line in report.classification_report.to_string().lines() {
                let _ = writeln!(out, "  {}", line);
            }
            match report.roc_auc {
                Some(auc) => {
                    let _ = writeln!(out, "  {:<14} {}", muted("ROC AUC"), format!("{:.4}", auc).white().bold());
                }
                None => {
                    let _ = writeln!(out, "  {:<14} {}", muted("ROC AUC"), dim("n/a (no probability output)"));
                }
            }
        }

        if !self.importances.is_empty() {
            section(&mut out, "Feature importance");
            for entry in &self.importances {
                let _ = writeln!(out, "  {}", entry.model.white().bold());
                match &entry.outcome {
                    ImportanceOutcome::Ranked { features } => {
                        for feature in features {
                            let _ = writeln!(out, "    {}", feature);
                        }
                    }
                    ImportanceOutcome::Skipped { reason } => {
                        let _ = writeln!(out, "    {} {}", dim("skipped:"), dim(reason));
                    }
                }
            }
        }

        if let Some(best) = self.best_model() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "  {} {} {}",
                "best".green(),
                best.model_name.white().bold(),
                muted(&format!(
                    "auc={} accuracy={:.4}",
                    best.roc_auc.map(|a| format!("{:.4}", a)).unwrap_or_else(|| "n/a".to_string()),
                    best.accuracy()
                ))
            );
        }
        let _ = writeln!(out, "  {}", dim(&format!("finished in {:.2}s", self.elapsed_secs)));
        out
    }
}

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", title.white().bold());
    let _ = writeln!(out, "  {}", dim(&"─".repeat(56)));
}
