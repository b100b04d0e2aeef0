//! Accuracy and demographic-parity metrics.
//!
//! The sweep consumes these through the [`Metrics`] trait so tests can swap in
//! fixed values. Group ids are the combined sensitive-attribute codes produced
//! by the data provider.

/// Metric seam used by the point evaluator.
pub trait Metrics: Send + Sync {
    fn accuracy(&self, y_true: &[u32], y_pred: &[u32]) -> f64;

    /// Fairness ratio in `[0, 1]` (1 = perfectly fair).
    fn fairness_ratio(&self, y_true: &[u32], y_pred: &[u32], sensitive: &[u32]) -> f64;
}

/// Accuracy plus the demographic-parity ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemographicParityMetrics;

impl Metrics for DemographicParityMetrics {
    fn accuracy(&self, y_true: &[u32], y_pred: &[u32]) -> f64 {
        accuracy(y_true, y_pred)
    }

    fn fairness_ratio(&self, _y_true: &[u32], y_pred: &[u32], sensitive: &[u32]) -> f64 {
        demographic_parity_ratio(y_pred, sensitive)
    }
}

/// Fraction of matching labels. Empty input scores `0.0`.
pub fn accuracy(y_true: &[u32], y_pred: &[u32]) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    hits as f64 / n as f64
}

/// Per-group selection rates `P(ŷ=1 | A=a)` and the overall rate `P(ŷ=1)`.
///
/// Groups with no rows get a rate of `0.0`.
pub fn selection_rates(y_pred: &[u32], sensitive: &[u32], n_groups: usize) -> (Vec<f64>, f64) {
    let mut selected = vec![0usize; n_groups];
    let mut counts = vec![0usize; n_groups];
    let mut total_selected = 0usize;
    for (&y, &g) in y_pred.iter().zip(sensitive) {
        let g = g as usize;
        if g >= n_groups {
            continue;
        }
        counts[g] += 1;
        if y == 1 {
            selected[g] += 1;
            total_selected += 1;
        }
    }
    let rates = selected
        .iter()
        .zip(&counts)
        .map(|(&s, &c)| if c == 0 { 0.0 } else { s as f64 / c as f64 })
        .collect();
    let n = counts.iter().sum::<usize>();
    let overall = if n == 0 { 0.0 } else { total_selected as f64 / n as f64 };
    (rates, overall)
}

fn present_group_rates(y_pred: &[u32], sensitive: &[u32]) -> Vec<f64> {
    let n_groups = sensitive.iter().max().map_or(0, |&g| g as usize + 1);
    let (rates, _) = selection_rates(y_pred, sensitive, n_groups);
    let mut present = vec![false; n_groups];
    for &g in sensitive {
        present[g as usize] = true;
    }
    rates
        .into_iter()
        .zip(present)
        .filter_map(|(r, p)| p.then_some(r))
        .collect()
}

/// `min_a rate_a / max_a rate_a`.
///
/// When no group selects anybody the rates are identical and the ratio is `1.0`.
pub fn demographic_parity_ratio(y_pred: &[u32], sensitive: &[u32]) -> f64 {
    let rates = present_group_rates(y_pred, sensitive);
    let max = rates.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return 1.0;
    }
    let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
    min / max
}

/// `max_a rate_a - min_a rate_a`.
pub fn demographic_parity_difference(y_pred: &[u32], sensitive: &[u32]) -> f64 {
    let rates = present_group_rates(y_pred, sensitive);
    if rates.is_empty() {
        return 0.0;
    }
    let max = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = rates.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}
