//! 2PL response likelihood.
//!
//! `P(right | θ, α, β) = σ(α(θ − β))`. Log-probabilities are evaluated with
//! [`safe_log_logistic`] so that extreme logits never produce `ln 0`.
use crate::{
    irt::core::records::is_correct,
    optimization::numerical_stability::{safe_log_logistic, safe_logistic},
};

/// Logit `z = α(θ − β)`.
#[inline]
pub fn logit_2pl(theta: f64, alpha: f64, beta: f64) -> f64 {
    alpha * (theta - beta)
}

/// Probability of a correct answer at ability `theta`.
#[inline]
pub fn probability_2pl(theta: f64, alpha: f64, beta: f64) -> f64 {
    safe_logistic(logit_2pl(theta, alpha, beta))
}

/// Log-probability of the observed `answer` at ability `theta`.
///
/// `answer` is correct when within `1e-3` of `1.0`; every other value is
/// scored as incorrect.
#[inline]
pub fn log_likelihood_2pl(answer: f64, theta: f64, alpha: f64, beta: f64) -> f64 {
    let z = logit_2pl(theta, alpha, beta);
    if is_correct(answer) { safe_log_logistic(z) } else { safe_log_logistic(-z) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // Check the 2PL log-likelihood at the symmetric point.
    //
    // Given
    // -----
    // - theta = 0, alpha = 1, beta = 0; answers 1.0 and 0.0.
    //
    // Expect
    // ------
    // - Both equal ln 0.5.
    fn log_likelihood_at_symmetric_point_is_log_half() {
        assert_relative_eq!(log_likelihood_2pl(1.0, 0.0, 1.0, 0.0), 0.5_f64.ln(), epsilon = 1e-15);
        assert_relative_eq!(log_likelihood_2pl(0.0, 0.0, 1.0, 0.0), 0.5_f64.ln(), epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // Ensure right and wrong probabilities are complementary and the log
    // form stays finite for extreme logits.
    //
    // Given
    // -----
    // - theta = 1.3, alpha = 0.7, beta = -0.4; and theta = -4, alpha = 400.
    //
    // Expect
    // ------
    // - exp(ll_right) + exp(ll_wrong) = 1.
    // - Extreme case is finite and ≈ z for a correct answer.
    fn right_and_wrong_are_complementary() {
        let lr = log_likelihood_2pl(1.0, 1.3, 0.7, -0.4);
        let lw = log_likelihood_2pl(0.0, 1.3, 0.7, -0.4);
        assert_relative_eq!(lr.exp() + lw.exp(), 1.0, epsilon = 1e-14);
        assert_relative_eq!(probability_2pl(1.3, 0.7, -0.4), lr.exp(), epsilon = 1e-14);

        let extreme = log_likelihood_2pl(1.0, -4.0, 400.0, 0.0);
        assert!(extreme.is_finite());
        assert_relative_eq!(extreme, -1600.0, epsilon = 1e-9);
    }
}
