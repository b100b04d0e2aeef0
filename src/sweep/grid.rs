//! Parameter grid construction.
//!
//! The flip-rate axis is enumerated from `min` to `max` in fixed steps,
//! inclusive of both ends. Step accumulation is tolerant of floating error:
//! `0..=1` by `0.1` yields 11 points with the last one exactly `1.0`.

use crate::domain::{GridSpec, ParameterPoint};
use crate::error::AppError;

/// Slack for `(max - min) / step` landing just below an integer.
const COUNT_TOLERANCE: f64 = 1e-9;

/// Largest grid a run will enumerate.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Number of points the grid will have, after validation.
pub fn grid_size(spec: &GridSpec) -> Result<usize, AppError> {
    validate(spec)?;
    let span = ((spec.max - spec.min) / spec.step + COUNT_TOLERANCE).floor();
    if !span.is_finite() || span >= MAX_GRID_POINTS as f64 {
        return Err(AppError::new(
            2,
            format!(
                "Flip-rate step {} gives more than {MAX_GRID_POINTS} grid points.",
                spec.step
            ),
        ));
    }
    (span as usize)
        .checked_add(1)
        .ok_or_else(|| AppError::new(2, "Flip-rate grid size overflows."))
}

/// Enumerate the flip-rate axis, pairing every value with `confidence_threshold`.
pub fn build_grid(spec: &GridSpec, confidence_threshold: f64) -> Result<Vec<ParameterPoint>, AppError> {
    if !confidence_threshold.is_finite() {
        return Err(AppError::new(2, "confidence_threshold must be finite."));
    }
    let n = grid_size(spec)?;

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let raw = spec.min + spec.step * i as f64;
        let flip_rate = if i == 0 {
            spec.min
        } else if (raw - spec.max).abs() <= COUNT_TOLERANCE * spec.step.max(1.0) {
            spec.max
        } else {
            tidy(raw).min(spec.max)
        };
        out.push(ParameterPoint {
            flip_rate,
            confidence_threshold,
        });
    }
    Ok(out)
}

fn validate(spec: &GridSpec) -> Result<(), AppError> {
    let GridSpec { min, max, step } = *spec;
    if !(min.is_finite() && max.is_finite() && step.is_finite()) {
        return Err(AppError::new(
            2,
            format!("Invalid flip-rate grid: min={min}, max={max}, step={step} (must be finite)."),
        ));
    }
    if step <= 0.0 {
        return Err(AppError::new(2, format!("Flip-rate step must be > 0, got {step}.")));
    }
    if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) {
        return Err(AppError::new(
            2,
            format!("Flip rates must lie in [0, 1], got min={min}, max={max}."),
        ));
    }
    if max < min {
        return Err(AppError::new(
            2,
            format!("Flip-rate max ({max}) must be >= min ({min})."),
        ));
    }
    Ok(())
}

/// Drop accumulation noise such as `0.30000000000000004`.
fn tidy(v: f64) -> f64 {
    (v * 1e12).round() / 1e12
}
