//! Numerically stable logistic primitives.
//!
//! - `sigmoid(z) = 1 / (1 + exp(-z))`
//! - `softplus(z) = ln(1 + exp(z))`
//!
//! Numerical notes:
//! - For large `|z|` the naive forms overflow `exp`. We branch on the sign so
//!   the exponent is always non-positive.
//! - `softplus` uses `ln_1p` to keep precision when `exp(-|z|)` is tiny.

/// Compute `1 / (1 + exp(-z))` without overflow.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Compute `ln(1 + exp(z))` without overflow.
pub fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Binary log loss of a logit `z` against label `y ∈ {0, 1}`.
///
/// `-y ln σ(z) - (1-y) ln(1-σ(z)) = softplus(z) - y z`
pub fn log_loss(z: f64, y: f64) -> f64 {
    softplus(z) - y * z
}
