//! Progress signals.
//!
//! Workers report every attempt through a shared [`ProgressObserver`]. The
//! console observer draws one line per trial:
//!
//! ```text
//! Trial 3:  |####x######| Failures: 1
//! ```
//!
//! `#` is a successful attempt, `x` a failed one. Markers appear in completion
//! order, so the line is a live view, not a per-point map.

use std::io::Write;

use crate::domain::{ParameterPoint, TrialResult};
use crate::error::AppError;
use crate::models::FitError;

pub trait ProgressObserver: Send + Sync {
    fn trial_started(&self, _trial: usize, _points: usize) {}

    fn attempt_finished(&self, _trial: usize, _point_index: usize, _attempt: usize, _ok: bool) {}

    fn point_exhausted(&self, _trial: usize, _point: &ParameterPoint, _last_error: &FitError) {}

    fn trial_finished(&self, _trial: &TrialResult) {}

    fn trial_failed(&self, _trial: usize, _error: &AppError) {}
}

/// Discards every signal (`--quiet`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressObserver for NullProgress {}

/// Compact per-trial progress line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    fn emit(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // Progress is best effort; a closed stdout must not fail the sweep.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl ProgressObserver for ConsoleProgress {
    fn trial_started(&self, trial: usize, _points: usize) {
        self.emit(&format!("Trial {trial}:  |"));
    }

    fn attempt_finished(&self, _trial: usize, _point_index: usize, _attempt: usize, ok: bool) {
        self.emit(if ok { "#" } else { "x" });
    }

    fn trial_finished(&self, trial: &TrialResult) {
        let mut line = format!("| Failures: {}", trial.failures);
        if trial.exhausted > 0 {
            line.push_str(&format!(" (exhausted points: {})", trial.exhausted));
        }
        line.push('\n');
        self.emit(&line);
    }

    fn trial_failed(&self, _trial: usize, _error: &AppError) {
        self.emit("| failed\n");
    }
}
