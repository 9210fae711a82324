//! Validation helpers for log-likelihood optimization.
//!
//! - [`verify_tol_grad`], [`verify_tol_cost`]: optional tolerances must be
//!   finite and strictly positive.
//! - [`validate_grad`]: correct dimension and finite entries.
//! - [`validate_theta_hat`]: a present, finite estimate.
//! - [`validate_value`]: finite log-likelihood values.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta},
};

/// Validate the optional gradient‐norm tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolGrad { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional cost‐change tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] for the first non-finite element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate and unwrap an estimated parameter vector (`theta_hat`).
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let t = theta_hat.ok_or(OptError::MissingThetaHat)?;
    for (index, &value) in t.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidThetaHat {
                index,
                value,
                reason: "Parameter estimates must be finite.",
            });
        }
    }
    Ok(t)
}

/// Validate that a scalar log-likelihood value is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Ensure tolerance checks accept `None` and positive values but reject
    // zero, negative, and non-finite ones.
    //
    // Given
    // -----
    // - A range of tolerance inputs.
    //
    // Expect
    // ------
    // - `Ok` for `None` and `1e-6`, matching errors otherwise.
    fn tolerance_checks_enforce_positive_finite_values() {
        assert!(verify_tol_grad(None).is_ok());
        assert!(verify_tol_grad(Some(1e-6)).is_ok());
        assert!(matches!(verify_tol_grad(Some(0.0)), Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(
            verify_tol_cost(Some(f64::INFINITY)),
            Err(OptError::InvalidTolCost { .. })
        ));
        assert!(matches!(verify_tol_cost(Some(-1.0)), Err(OptError::InvalidTolCost { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Check that gradient validation reports dimension mismatches before
    // scanning entries, and the index of the first non-finite entry.
    //
    // Given
    // -----
    // - A length-2 gradient validated against `dim = 3`.
    // - A gradient `[1.0, NaN]` validated against `dim = 2`.
    //
    // Expect
    // ------
    // - `GradientDimMismatch { expected: 3, found: 2 }`.
    // - `InvalidGradient { index: 1, .. }`.
    fn validate_grad_reports_dimension_then_entries() {
        let short = array![1.0, 2.0];
        assert_eq!(
            validate_grad(&short, 3).unwrap_err(),
            OptError::GradientDimMismatch { expected: 3, found: 2 }
        );

        let bad = array![1.0, f64::NAN];
        assert!(matches!(validate_grad(&bad, 2), Err(OptError::InvalidGradient { index: 1, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Ensure a missing or non-finite estimate is rejected.
    //
    // Given
    // -----
    // - `None`, and `Some([0.0, inf])`.
    //
    // Expect
    // ------
    // - `MissingThetaHat` and `InvalidThetaHat { index: 1, .. }`.
    fn validate_theta_hat_rejects_missing_and_non_finite() {
        assert_eq!(validate_theta_hat(None).unwrap_err(), OptError::MissingThetaHat);
        assert!(matches!(
            validate_theta_hat(Some(array![0.0, f64::INFINITY])),
            Err(OptError::InvalidThetaHat { index: 1, .. })
        ));
        assert!(validate_value(-3.5).is_ok());
        assert!(validate_value(f64::NAN).is_err());
    }
}
