//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - resolves the run configuration
//! - runs the sweep (or the single baseline fit)
//! - prints reports and writes exports

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::cli::{BaselineArgs, Command, DataArgs, SweepArgs};
use crate::domain::{DataSource, GridSpec, SweepConfig};
use crate::error::AppError;
use crate::io::{RunSummary, write_results_csv, write_summary_json};
use crate::sweep::{ConsoleProgress, NullProgress, ProgressObserver, SweepSettings};

pub mod pipeline;

/// Environment fallback for `--workers`.
pub const WORKERS_ENV: &str = "LBS_WORKERS";
/// Environment fallback for `--output`.
pub const OUTPUT_ENV: &str = "LBS_OUTPUT";
pub const DEFAULT_OUTPUT: &str = "./Results/results.csv";

/// Entry point for the `lbs` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Sweep(args) => handle_sweep(args),
        Command::Baseline(args) => handle_baseline(args),
    }
}

fn handle_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = sweep_config_from_args(&args)?;
    let settings = SweepSettings::from_config(&config)?;

    println!("{}", crate::report::format_run_header(&config, settings.grid.len()));
    if args.dry_run {
        println!("{}", crate::report::format_grid(&settings.grid));
        return Ok(());
    }

    let observer: &dyn ProgressObserver = if args.quiet { &NullProgress } else { &ConsoleProgress };
    let sweep = pipeline::run_sweep(&config, &settings, observer)?;

    write_results_csv(&config.output, &sweep.rows)?;
    info!(path = %config.output.display(), rows = sweep.rows.len(), "Wrote results");

    if let Some(path) = &config.summary_json {
        write_summary_json(path, &RunSummary::new(&config, &sweep))?;
        info!(path = %path.display(), "Wrote run summary");
    }

    println!();
    println!("{}", crate::report::format_sweep_summary(&sweep));
    Ok(())
}

fn handle_baseline(args: BaselineArgs) -> Result<(), AppError> {
    validate_difference_bound(args.difference_bound)?;
    let source = data_source_from_args(&args.data);
    let report = pipeline::run_baseline(&source, args.difference_bound, args.seed)?;
    println!("{}", crate::report::format_baseline(&report));
    Ok(())
}

pub fn sweep_config_from_args(args: &SweepArgs) -> Result<SweepConfig, AppError> {
    if args.trials == 0 {
        return Err(AppError::new(2, "--trials must be >= 1."));
    }
    validate_difference_bound(args.difference_bound)?;

    Ok(SweepConfig {
        source: data_source_from_args(&args.data),
        grid: GridSpec {
            min: args.flip_min,
            max: args.flip_max,
            step: args.flip_step,
        },
        confidence_threshold: args.confidence_threshold,
        trial_count: args.trials,
        workers: resolve_workers(args.workers, std::env::var(WORKERS_ENV).ok())?,
        max_attempts: args.max_attempts,
        difference_bound: args.difference_bound,
        seed: args.seed,
        on_exhausted: args.on_exhausted,
        output: resolve_output(args.output.clone(), std::env::var(OUTPUT_ENV).ok()),
        summary_json: args.summary_json.clone(),
    })
}

pub fn data_source_from_args(args: &DataArgs) -> DataSource {
    match args.synthetic {
        Some(rows) => DataSource::Synthetic { rows },
        None => DataSource::Csv {
            train: args.train.clone(),
            test: args.test.clone(),
            schema: args.schema.clone(),
        },
    }
}

/// Flag, then environment, then the host CPU count.
pub fn resolve_workers(flag: Option<usize>, env: Option<String>) -> Result<usize, AppError> {
    let workers = match (flag, env) {
        (Some(n), _) => n,
        (None, Some(raw)) => raw.trim().parse::<usize>().map_err(|e| {
            AppError::new(2, format!("Invalid {WORKERS_ENV} value '{raw}': {e}"))
        })?,
        (None, None) => std::thread::available_parallelism().map_or(1, |n| n.get()),
    };
    if workers == 0 {
        return Err(AppError::new(2, "Worker pool size must be >= 1."));
    }
    Ok(workers)
}

/// Flag, then environment, then `./Results/results.csv`.
pub fn resolve_output(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|s| !s.trim().is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
}

fn validate_difference_bound(bound: f64) -> Result<(), AppError> {
    if !(bound.is_finite() && bound > 0.0) {
        return Err(AppError::new(
            2,
            format!("--difference-bound must be finite and > 0, got {bound}."),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn sweep_args(argv: &[&str]) -> SweepArgs {
        let mut full = vec!["lbs", "sweep"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Sweep(args) => args,
            other => panic!("expected sweep, got {other:?}"),
        }
    }

    #[test]
    fn workers_flag_beats_env() {
        assert_eq!(resolve_workers(Some(3), Some("8".into())).unwrap(), 3);
        assert_eq!(resolve_workers(None, Some(" 8 ".into())).unwrap(), 8);
        assert!(resolve_workers(None, None).unwrap() >= 1);
    }

    #[test]
    fn bad_worker_values_are_config_errors() {
        assert_eq!(resolve_workers(None, Some("many".into())).unwrap_err().exit_code(), 2);
        assert_eq!(resolve_workers(Some(0), None).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn output_falls_back_to_results_dir() {
        assert_eq!(resolve_output(None, None), PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(resolve_output(None, Some("out.csv".into())), PathBuf::from("out.csv"));
        assert_eq!(
            resolve_output(Some(PathBuf::from("flag.csv")), Some("out.csv".into())),
            PathBuf::from("flag.csv")
        );
    }

    #[test]
    fn config_from_args() {
        let args = sweep_args(&["--synthetic", "50", "--flip-step", "0.25", "--trials", "3", "--workers", "2"]);
        let config = sweep_config_from_args(&args).unwrap();
        assert_eq!(config.source, DataSource::Synthetic { rows: 50 });
        assert_eq!(config.grid.step, 0.25);
        assert_eq!(config.trial_count, 3);
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn zero_trials_and_bad_bound_are_rejected() {
        let args = sweep_args(&["--trials", "0", "--workers", "1"]);
        assert_eq!(sweep_config_from_args(&args).unwrap_err().exit_code(), 2);
        let args = sweep_args(&["--difference-bound", "0", "--workers", "1"]);
        assert_eq!(sweep_config_from_args(&args).unwrap_err().exit_code(), 2);
    }
}
