//! churnlab - Main Entry Point
//!
//! Runs tabular ML experiments from the command line.

use churnlab::cli::{cmd_config, cmd_generate, cmd_info, cmd_run, Cli, Commands, RunOverrides};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churnlab=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, config, output, label, folds, scoring, seed, test_ratio } => {
            let overrides = RunOverrides { label, folds, scoring, seed, test_ratio };
            cmd_run(&data, config.as_deref(), output.as_deref(), &overrides)?;
        }
        Commands::Generate { output, rows, positive_rate, seed } => {
            cmd_generate(&output, rows, positive_rate, seed)?;
        }
        Commands::Info { data, label } => {
            cmd_info(&data, label.as_deref())?;
        }
        Commands::Config { output } => {
            cmd_config(output.as_deref())?;
        }
    }

    Ok(())
}
