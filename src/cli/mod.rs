//! churnlab CLI Module
//!
//! Command-line interface for running experiments, generating data and
//! inspecting tables.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::evaluation::ScoringMetric;
use crate::pipeline::{ExperimentPipeline, PipelineConfig};
use crate::synthetic::ChurnGenerator;
use crate::utils::{DataLoader, DataSaver, DatasetInfo};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "churnlab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tabular ML experiments: grid search, stacking and evaluation")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full experiment on a CSV file
    Run {
        /// Input CSV with a header row
        #[arg(short, long)]
        data: PathBuf,

        /// JSON experiment config (defaults to the churn workflow)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Label column name
        #[arg(long)]
        label: Option<String>,

        /// Cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Search metric (roc_auc, accuracy, f1, precision, recall)
        #[arg(long)]
        scoring: Option<ScoringMetric>,

        /// Seed for the split, the search and the stack
        #[arg(long)]
        seed: Option<u64>,

        /// Fraction of rows held out for testing
        #[arg(long)]
        test_ratio: Option<f64>,
    },

    /// Generate a synthetic churn table
    Generate {
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of rows
        #[arg(long, default_value = "1000")]
        rows: usize,

        /// Share of churned customers
        #[arg(long, default_value = "0.2")]
        positive_rate: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show data information
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Label column to summarize
        #[arg(long)]
        label: Option<String>,
    },

    /// Print or write the default experiment config
    Config {
        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// CLI overrides for `run`
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub label: Option<String>,
    pub folds: Option<usize>,
    pub scoring: Option<ScoringMetric>,
    pub seed: Option<u64>,
    pub test_ratio: Option<f64>,
}

impl RunOverrides {
    /// Apply every flag that was given on top of `config`
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(label) = &self.label {
            config.data.label = label.clone();
        }
        if let Some(folds) = self.folds {
            config.search.folds = folds;
            config.stacking.folds = folds;
        }
        if let Some(scoring) = self.scoring {
            config.search.scoring = scoring;
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(test_ratio) = self.test_ratio {
            config.split.test_ratio = test_ratio;
        }
        config
    }
}

/// Config file if given, defaults otherwise, then the flag overrides
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &RunOverrides,
) -> anyhow::Result<PipelineConfig> {
    let base = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let config = overrides.apply(base);
    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(
    data_path: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
    overrides: &RunOverrides,
) -> anyhow::Result<()> {
    section("Run");

    let config = resolve_config(config_path, overrides)?;
    step_ok(&format!(
        "{} models, {} folds, scoring {}",
        config.models.len(),
        config.search.folds,
        config.search.scoring.to_string().cyan()
    ));

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run("Running experiment");
    let start = Instant::now();
    let report = ExperimentPipeline::new(config).run(&df)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print!("{}", report.render());

    if let Some(path) = output {
        report.save_json(path)?;
        step_ok(&format!("Report → {}", path.display()));
    }

    println!();
    Ok(())
}

pub fn cmd_generate(output: &Path, rows: usize, positive_rate: f64, seed: u64) -> anyhow::Result<()> {
    section("Generate");

    step_run("Generating");
    let mut df = ChurnGenerator::new(rows, positive_rate, seed).generate()?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run(&format!("Saving → {}", output.display()));
    DataSaver::save_csv(&mut df, output)?;
    step_done("");

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path, label: Option<&str>) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_csv(data_path)?;
    let info = DatasetInfo::from_frame(&df, label)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), info.n_rows);
    println!("  {:<12} {}", muted("Columns"), info.n_cols);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in &info.columns {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            col.null_count,
            col.unique_count
        );
    }

    if let Some(counts) = &info.label_counts {
        println!();
        for (value, count) in counts {
            let share = *count as f64 / info.n_rows.max(1) as f64 * 100.0;
            println!("  {:<12} {:>8} {}", muted(value), count, dim(&format!("{:.1}%", share)));
        }
    }

    println!();
    Ok(())
}

pub fn cmd_config(output: Option<&Path>) -> anyhow::Result<()> {
    let config = PipelineConfig::default();
    match output {
        Some(path) => {
            config.save(path)?;
            step_ok(&format!("Default config → {}", path.display()));
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
