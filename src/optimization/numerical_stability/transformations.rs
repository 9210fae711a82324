//! Numerically stable scalar transforms.
//!
//! Naïve `1 / (1 + exp(-x))`, `ln σ(x)`, and `ln Σ exp(xᵢ)` overflow
//! or lose precision for large-magnitude inputs. The helpers here branch on
//! the sign of the argument or shift by the maximum so every intermediate
//! `exp` stays in `[0, 1]`.
//!
//! # Provided items
//! - [`LOGIT_EPS`]: clamp margin for inverse logistic maps.
//! - [`safe_logistic`] / [`safe_log_logistic`]: σ(x) and ln σ(x).
//! - [`log_sum_exp`]: max-shifted `ln Σ exp(xᵢ)`.
//! - [`scaled_logistic`] / [`scaled_logit`]: ℝ ↔ open interval `(lo, hi)`.

/// Clamp margin for positions in the unit interval before taking a logit.
///
/// A parameter sitting exactly on a bound maps to `LOGIT_EPS` (or
/// `1 - LOGIT_EPS`) instead of ±∞.
pub const LOGIT_EPS: f64 = 1e-8;

/// Logistic function `σ(x) = 1 / (1 + exp(-x))` without overflow.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln σ(x)`, i.e. `-softplus(-x)`, accurate in both tails.
///
/// For very negative `x` this returns ≈ `x` instead of `ln(0) = -∞`.
pub fn safe_log_logistic(x: f64) -> f64 {
    if x >= 0.0 { -(-x).exp().ln_1p() } else { x - x.exp().ln_1p() }
}

/// Max-shifted `ln Σ exp(xᵢ)`.
///
/// - Empty input, or all entries `-∞`: returns `-∞`.
/// - Any entry `+∞`: returns `+∞`.
/// - Any `NaN` propagates as `NaN`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        if values.iter().any(|v| v.is_nan()) {
            return f64::NAN;
        }
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Map `t ∈ ℝ` into `(lo, hi)` via `lo + (hi - lo)·σ(t)`.
pub fn scaled_logistic(t: f64, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * safe_logistic(t)
}

/// Derivative of [`scaled_logistic`] with respect to `t`:
/// `(hi - lo)·σ(t)·(1 - σ(t))`.
pub fn scaled_logistic_deriv(t: f64, lo: f64, hi: f64) -> f64 {
    let s = safe_logistic(t);
    (hi - lo) * s * (1.0 - s)
}

/// Inverse of [`scaled_logistic`]: map `x ∈ [lo, hi]` back to ℝ.
///
/// The relative position `(x - lo) / (hi - lo)` is clamped into
/// `[LOGIT_EPS, 1 - LOGIT_EPS]`, so values on (or outside) a bound yield a
/// large but finite `t`.
pub fn scaled_logit(x: f64, lo: f64, hi: f64) -> f64 {
    let u = ((x - lo) / (hi - lo)).clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    u.ln() - (-u).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    // Purpose
    // -------
    // Check `safe_logistic` against the naïve formula on a safe grid and
    // its behaviour in the tails.
    //
    // Given
    // -----
    // - x ∈ {-5, -1, 0, 1, 5}, plus ±800.
    //
    // Expect
    // ------
    // - Agreement with 1/(1+e^{-x}) on the grid.
    // - σ(800) = 1, σ(-800) = 0, no NaN.
    fn safe_logistic_matches_naive_formula_and_saturates() {
        for &x in &[-5.0, -1.0, 0.0, 1.0, 5.0] {
            assert_relative_eq!(safe_logistic(x), 1.0 / (1.0 + (-x as f64).exp()), epsilon = 1e-14);
        }
        assert_eq!(safe_logistic(800.0), 1.0);
        assert_eq!(safe_logistic(-800.0), 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Ensure `safe_log_logistic` stays finite where `ln(σ(x))` underflows.
    //
    // Given
    // -----
    // - x = 0 and x = -1000.
    //
    // Expect
    // ------
    // - ln σ(0) = ln 0.5.
    // - ln σ(-1000) ≈ -1000 (finite).
    fn safe_log_logistic_is_finite_in_the_lower_tail() {
        assert_relative_eq!(safe_log_logistic(0.0), 0.5_f64.ln(), epsilon = 1e-15);
        let tail = safe_log_logistic(-1000.0);
        assert!(tail.is_finite());
        assert_relative_eq!(tail, -1000.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify `log_sum_exp` on small inputs and large magnitudes.
    //
    // Given
    // -----
    // - [0, 0], [1000, 1000], [-1000, -1000], [], [-inf, -inf].
    //
    // Expect
    // ------
    // - ln 2, 1000 + ln 2, -1000 + ln 2, -inf, -inf.
    fn log_sum_exp_is_stable_for_large_magnitudes() {
        let ln2 = 2.0_f64.ln();
        assert_relative_eq!(log_sum_exp(&[0.0, 0.0]), ln2, epsilon = 1e-15);
        assert_relative_eq!(log_sum_exp(&[1000.0, 1000.0]), 1000.0 + ln2, epsilon = 1e-12);
        assert_relative_eq!(log_sum_exp(&[-1000.0, -1000.0]), -1000.0 + ln2, epsilon = 1e-12);
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    // Purpose
    // -------
    // Check that `scaled_logit` inverts `scaled_logistic` inside the
    // interval and clamps on the bounds.
    //
    // Given
    // -----
    // - Interval (0.25, 2.0) and x ∈ {0.5, 1.0, 1.75}.
    // - x = 2.0 (upper bound) and x = 0.25 (lower bound).
    //
    // Expect
    // ------
    // - Round trip recovers x.
    // - Bounds map to finite t.
    fn scaled_logit_inverts_scaled_logistic() {
        for &x in &[0.5, 1.0, 1.75] {
            let t = scaled_logit(x, 0.25, 2.0);
            assert_relative_eq!(scaled_logistic(t, 0.25, 2.0), x, epsilon = 1e-12);
        }
        assert!(scaled_logit(2.0, 0.25, 2.0).is_finite());
        assert!(scaled_logit(0.25, 0.25, 2.0).is_finite());
    }

    #[test]
    // Purpose
    // -------
    // Verify `scaled_logistic_deriv` against a central difference.
    //
    // Given
    // -----
    // - Interval (-4, 4) and t = 0.3.
    //
    // Expect
    // ------
    // - Agreement to 1e-7.
    fn scaled_logistic_deriv_matches_central_difference() {
        let h = 1e-6;
        let fd = (scaled_logistic(0.3 + h, -4.0, 4.0) - scaled_logistic(0.3 - h, -4.0, 4.0))
            / (2.0 * h);
        assert_abs_diff_eq!(scaled_logistic_deriv(0.3, -4.0, 4.0), fd, epsilon = 1e-7);
    }
}
