//! Command-line parsing for the label-flip bias sweep.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! sweep and model code. Environment fallbacks (`LBS_WORKERS`, `LBS_OUTPUT`)
//! are resolved in `app`, after `.env` has been loaded.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ExhaustedPolicy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "lbs",
    version,
    about = "Label-flip bias sweep: accuracy and demographic parity under label noise"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sweep flip rates over several trials and write the result table.
    Sweep(SweepArgs),
    /// Fit the unconstrained and DP-constrained models once on clean data.
    Baseline(BaselineArgs),
}

/// Where the data comes from.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Training CSV (header-less).
    #[arg(long, value_name = "CSV", default_value = "./Data/Adult/adult.data")]
    pub train: PathBuf,

    /// Test CSV (header-less).
    #[arg(long, value_name = "CSV", default_value = "./Data/Adult/adult.test")]
    pub test: PathBuf,

    /// JSON schema describing the CSV columns (default: built-in Adult layout).
    #[arg(long, value_name = "JSON", conflicts_with = "synthetic")]
    pub schema: Option<PathBuf>,

    /// Use a seeded synthetic two-group dataset with this many training rows
    /// instead of the CSV files.
    #[arg(long, value_name = "ROWS")]
    pub synthetic: Option<usize>,
}

/// Options for `lbs sweep`.
#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Smallest flip rate.
    #[arg(long, default_value_t = 0.0)]
    pub flip_min: f64,

    /// Largest flip rate (inclusive).
    #[arg(long, default_value_t = 1.0)]
    pub flip_max: f64,

    /// Flip-rate step.
    #[arg(long, default_value_t = 0.1)]
    pub flip_step: f64,

    /// Reference-model confidence at or below which a row may be flipped
    /// (1 = every row).
    #[arg(long, default_value_t = 1.0)]
    pub confidence_threshold: f64,

    /// Number of independent trials.
    #[arg(long, default_value_t = 10)]
    pub trials: usize,

    /// Worker pool size (default: `LBS_WORKERS`, then the CPU count).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Attempts per point before it counts as exhausted.
    #[arg(long, default_value_t = 5)]
    pub max_attempts: usize,

    /// Allowed demographic-parity difference for the constrained model.
    #[arg(long, default_value_t = 0.01)]
    pub difference_bound: f64,

    /// Base seed for bias draws and synthetic data.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// What to do with a point that fails every attempt.
    #[arg(long, value_enum, default_value_t = ExhaustedPolicy::Sentinel)]
    pub on_exhausted: ExhaustedPolicy,

    /// Results CSV (default: `LBS_OUTPUT`, then `./Results/results.csv`).
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Also write a JSON run summary.
    #[arg(long, value_name = "JSON")]
    pub summary_json: Option<PathBuf>,

    /// Print the grid and exit without fitting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// No per-attempt progress line.
    #[arg(long)]
    pub quiet: bool,
}

/// Options for `lbs baseline`.
#[derive(Debug, Args, Clone)]
pub struct BaselineArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Allowed demographic-parity difference for the constrained model.
    #[arg(long, default_value_t = 0.01)]
    pub difference_bound: f64,

    /// Seed for synthetic data.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_defaults() {
        let cli = Cli::try_parse_from(["lbs", "sweep"]).unwrap();
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!((args.flip_min, args.flip_max, args.flip_step), (0.0, 1.0, 0.1));
        assert_eq!(args.trials, 10);
        assert_eq!(args.max_attempts, 5);
        assert_eq!(args.on_exhausted, ExhaustedPolicy::Sentinel);
        assert_eq!(args.data.train, PathBuf::from("./Data/Adult/adult.data"));
        assert!(args.workers.is_none() && args.output.is_none());
    }

    #[test]
    fn sweep_flags() {
        let cli = Cli::try_parse_from([
            "lbs",
            "sweep",
            "--synthetic",
            "500",
            "--flip-step",
            "0.5",
            "--on-exhausted",
            "fail-trial",
            "--workers",
            "3",
            "--quiet",
        ])
        .unwrap();
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.data.synthetic, Some(500));
        assert_eq!(args.flip_step, 0.5);
        assert_eq!(args.on_exhausted, ExhaustedPolicy::FailTrial);
        assert_eq!(args.workers, Some(3));
        assert!(args.quiet);
    }

    #[test]
    fn schema_conflicts_with_synthetic() {
        let err = Cli::try_parse_from(["lbs", "baseline", "--synthetic", "10", "--schema", "s.json"]);
        assert!(err.is_err());
    }
}
