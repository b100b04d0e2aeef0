//! JSON run summary.
//!
//! A small, self-describing companion to the results CSV: when the run
//! happened, with which configuration, how each trial fared, and the
//! per-point means over trials.

use std::fs::{self, File};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{SweepConfig, SweepResult, TrialSummary};
use crate::error::AppError;
use crate::sweep::{PointMeans, point_means};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub config: SweepConfig,
    pub rows: usize,
    pub total_failures: usize,
    pub total_exhausted: usize,
    pub trials: Vec<TrialSummary>,
    pub points: Vec<PointMeans>,
}

impl RunSummary {
    pub fn new(config: &SweepConfig, sweep: &SweepResult) -> Self {
        Self {
            tool: "lbs".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            config: config.clone(),
            rows: sweep.rows.len(),
            total_failures: sweep.total_failures(),
            total_exhausted: sweep.total_exhausted(),
            trials: sweep.trials.clone(),
            points: point_means(&sweep.rows),
        }
    }
}

/// Write the summary as pretty JSON, creating parent directories as needed.
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to create output directory '{}': {e}", parent.display()),
            )
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}
