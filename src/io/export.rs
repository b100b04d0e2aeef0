//! Export the sweep table to CSV.
//!
//! One row per `(trial, flip_rate, confidence_threshold)`. Sentinel rows keep
//! the key and leave the four metric cells empty. The file is overwritten on
//! every run.

use std::fs;
use std::path::Path;

use crate::domain::SweepRow;
use crate::error::AppError;

/// Write `rows` to `path`, creating parent directories as needed.
pub fn write_results_csv(path: &Path, rows: &[SweepRow]) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to create output directory '{}': {e}", parent.display()),
            )
        })?;
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results CSV '{}': {e}", path.display())))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(2, format!("Failed to write results CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush results CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParameterPoint, PointResult};

    fn rows() -> Vec<SweepRow> {
        let ok = SweepRow::from_result(
            1,
            &PointResult {
                flip_rate: 0.0,
                confidence_threshold: 1.0,
                unconstrained_accuracy: 0.75,
                unconstrained_fairness_ratio: 0.5,
                constrained_accuracy: 0.7,
                constrained_fairness_ratio: 0.9,
            },
            2,
        );
        let point = ParameterPoint {
            flip_rate: 0.5,
            confidence_threshold: 1.0,
        };
        vec![ok, SweepRow::sentinel(1, &point, 5)]
    }

    #[test]
    fn writes_header_and_sentinel_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Results").join("results.csv");
        write_results_csv(&path, &rows()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "trial,flip_rate,confidence_threshold,unconstrained_accuracy,unconstrained_dp_ratio,\
             constrained_accuracy,constrained_dp_ratio,failures,status"
        );
        assert_eq!(lines[1], "1,0.0,1.0,0.75,0.5,0.7,0.9,2,ok");
        assert_eq!(lines[2], "1,0.5,1.0,,,,,5,exhausted");
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, "stale\nstale\nstale\nstale\n").unwrap();
        write_results_csv(&path, &rows()[..1]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
