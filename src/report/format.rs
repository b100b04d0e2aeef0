use crate::domain::{BaselineReport, DataSource, ParameterPoint, SweepConfig, SweepResult};
use crate::sweep::point_means;

/// Header block printed before a sweep starts.
pub fn format_run_header(config: &SweepConfig, grid_len: usize) -> String {
    let mut out = String::new();
    out.push_str("=== lbs - label-flip bias sweep ===\n");
    out.push_str(&format!("Data: {}\n", describe_source(&config.source)));
    out.push_str(&format!(
        "Grid: flip_rate {}..={} step {} ({grid_len} points) | confidence_threshold {}\n",
        config.grid.min, config.grid.max, config.grid.step, config.confidence_threshold
    ));
    out.push_str(&format!(
        "Trials: {} | workers: {} | max attempts: {} | difference bound: {} | seed: {}\n",
        config.trial_count, config.workers, config.max_attempts, config.difference_bound, config.seed
    ));
    out
}

/// The grid alone (`--dry-run`).
pub fn format_grid(grid: &[ParameterPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>5} {:>10} {:>10}\n", "idx", "flip_rate", "conf_thr"));
    out.push_str(&format!("{:-<5} {:-<10} {:-<10}\n", "", "", ""));
    for (i, p) in grid.iter().enumerate() {
        out.push_str(&format!("{i:>5} {:>10.4} {:>10.4}\n", p.flip_rate, p.confidence_threshold));
    }
    out
}

/// Per-point means over trials, plus failure totals.
pub fn format_sweep_summary(sweep: &SweepResult) -> String {
    let mut out = String::new();

    out.push_str(
        format!(
            "{:>9} {:>8} {:>10} {:>10} {:>10} {:>10} {:>5} {:>9}\n",
            "flip_rate", "conf_thr", "unc_acc", "unc_dp", "con_acc", "con_dp", "ok", "failures"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<9} {:-<8} {:-<10} {:-<10} {:-<10} {:-<10} {:-<5} {:-<9}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for m in point_means(&sweep.rows) {
        out.push_str(
            format!(
                "{:>9.4} {:>8.4} {:>10} {:>10} {:>10} {:>10} {:>5} {:>9}\n",
                m.flip_rate,
                m.confidence_threshold,
                fmt_opt(m.unconstrained_accuracy),
                fmt_opt(m.unconstrained_dp_ratio),
                fmt_opt(m.constrained_accuracy),
                fmt_opt(m.constrained_dp_ratio),
                format!("{}/{}", m.trials_ok, m.trials_ok + m.trials_exhausted),
                m.failures,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out.push_str(&format!(
        "\nRows: {} | trials: {} | failed attempts: {} | exhausted points: {}\n",
        sweep.rows.len(),
        sweep.trials.len(),
        sweep.total_failures(),
        sweep.total_exhausted()
    ));
    out
}

pub fn format_baseline(report: &BaselineReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Train rows: {} | test rows: {} | groups: {}\n",
        report.train_rows, report.test_rows, report.groups
    ));
    out.push_str(&format!(
        "Unconstrained: accuracy={:.4} dp_ratio={:.4}\n",
        report.unconstrained_accuracy, report.unconstrained_dp_ratio
    ));
    out.push_str(&format!(
        "Constrained:   accuracy={:.4} dp_ratio={:.4}\n",
        report.constrained_accuracy, report.constrained_dp_ratio
    ));
    out
}

fn describe_source(source: &DataSource) -> String {
    match source {
        DataSource::Csv { train, test, schema } => format!(
            "train={} test={} schema={}",
            train.display(),
            test.display(),
            schema
                .as_ref()
                .map_or_else(|| "adult".to_string(), |p| p.display().to_string())
        ),
        DataSource::Synthetic { rows } => format!("synthetic ({rows} rows)"),
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.4}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PointResult, SweepRow, TrialResult};

    #[test]
    fn summary_shows_means_and_dashes_for_exhausted_points() {
        let ok = SweepRow::from_result(
            1,
            &PointResult {
                flip_rate: 0.0,
                confidence_threshold: 1.0,
                unconstrained_accuracy: 0.85,
                unconstrained_fairness_ratio: 0.3,
                constrained_accuracy: 0.8,
                constrained_fairness_ratio: 0.9,
            },
            0,
        );
        let bad = ParameterPoint {
            flip_rate: 0.5,
            confidence_threshold: 1.0,
        };
        let mut sweep = SweepResult::default();
        sweep.push_trial(TrialResult {
            trial: 1,
            rows: vec![ok, SweepRow::sentinel(1, &bad, 5)],
            failures: 5,
            exhausted: 1,
        });

        let text = format_sweep_summary(&sweep);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("flip_rate"));
        assert!(lines[2].contains("0.8500") && lines[2].contains("1/1"));
        assert!(lines[3].contains('-') && lines[3].contains("0/1"));
        assert!(text.contains("exhausted points: 1"));
    }

    #[test]
    fn grid_lists_every_point() {
        let grid: Vec<ParameterPoint> = [0.0, 0.5, 1.0]
            .iter()
            .map(|&flip_rate| ParameterPoint {
                flip_rate,
                confidence_threshold: 1.0,
            })
            .collect();
        let text = format_grid(&grid);
        assert_eq!(text.lines().count(), 2 + 3);
        assert!(text.lines().last().unwrap().contains("1.0000"));
    }
}
