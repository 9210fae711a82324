//! Errors for the 2PL IRT stack (configuration, record parsing, posterior
//! consistency, and per-item optimizer failures).
//!
//! [`IrtError`] is the single error type returned by the response index,
//! the ability grid, and the EM engine. It implements `Display`/`Error` and,
//! behind the `python-bindings` feature, converts to a Python `ValueError`.
//!
//! ## Conventions
//! - Record indices are **0-based** positions in the caller's input.
//! - Ids carried inside errors are rendered with `Debug`, so any hashable id
//!   type can be reported without extra trait bounds on the error.
//! - Optimizer-layer failures are normalized into
//!   [`IrtError::ItemOptimizationFailed`] when the offending item is known,
//!   and into [`IrtError::Optimizer`] otherwise.
#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*};

use crate::optimization::errors::OptError;

/// Result alias for IRT operations that may produce [`IrtError`].
pub type IrtResult<T> = Result<T, IrtError>;

#[derive(Debug, Clone, PartialEq)]
pub enum IrtError {
    // ---- Configuration ----
    /// Grid bounds must be finite with `min < max` (when `count > 1`) and
    /// `count >= 1`.
    InvalidGridSpec { min: f64, max: f64, count: usize, reason: &'static str },

    /// The produced grid does not have the requested number of points.
    GridLengthMismatch { expected: usize, actual: usize },

    /// Item parameter bounds must be finite with `lo < hi`.
    InvalidBounds { name: &'static str, lo: f64, hi: f64, reason: &'static str },

    /// Jump probability must lie in `[0, 1]`.
    InvalidJumpProb { value: f64 },

    /// The EM loop needs at least one iteration.
    InvalidIterations { iterations: usize },

    /// Early-stop tolerance must be finite and positive.
    InvalidTolerance { tol: f64 },

    // ---- Format ----
    /// A response row has fewer than the three required fields.
    MalformedRecord { index: usize, fields: usize },

    /// A numeric id field is not finite or not integral.
    NonIntegralId { index: usize, field: &'static str, value: f64 },

    // ---- Data ----
    /// Solve was requested on an empty response set.
    NoResponses,

    // ---- Consistency ----
    /// A user's posterior row does not sum to one after normalization.
    ImproperPosterior { user: String, sum: f64 },

    /// A count vector handed to the density update differs in length from
    /// the density.
    DensityLengthMismatch { which: &'static str, expected: usize, actual: usize },

    // ---- Optimizer ----
    /// The item optimizer failed for the given item.
    ItemOptimizationFailed { item: String, reason: String },

    /// Optimizer-layer error not tied to a specific item.
    Optimizer(OptError),

    // ---- Model state ----
    /// Results were requested before `solve` completed.
    ModelNotSolved,

    /// `solve` was called before any responses were loaded.
    ResponsesNotLoaded,
}

impl std::error::Error for IrtError {}

impl std::fmt::Display for IrtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            IrtError::InvalidGridSpec { min, max, count, reason } => {
                write!(f, "Invalid ability grid (min={min}, max={max}, count={count}): {reason}")
            }
            IrtError::GridLengthMismatch { expected, actual } => {
                write!(f, "Ability grid has {actual} points, expected {expected}")
            }
            IrtError::InvalidBounds { name, lo, hi, reason } => {
                write!(f, "Invalid {name} bounds [{lo}, {hi}]: {reason}")
            }
            IrtError::InvalidJumpProb { value } => {
                write!(f, "Invalid jump probability {value}: must lie in [0, 1]")
            }
            IrtError::InvalidIterations { iterations } => {
                write!(f, "Invalid iteration count {iterations}: must be at least 1")
            }
            IrtError::InvalidTolerance { tol } => {
                write!(f, "Invalid convergence tolerance {tol}: must be finite and > 0")
            }

            // ---- Format ----
            IrtError::MalformedRecord { index, fields } => {
                write!(
                    f,
                    "Malformed response record at index {index}: {fields} fields, expected (user, item, answer)"
                )
            }
            IrtError::NonIntegralId { index, field, value } => {
                write!(f, "Response record at index {index}: {field} id {value} is not an integer")
            }

            // ---- Data ----
            IrtError::NoResponses => write!(f, "No responses to estimate from"),

            // ---- Consistency ----
            IrtError::ImproperPosterior { user, sum } => {
                write!(f, "Posterior for user {user} sums to {sum}, expected 1")
            }
            IrtError::DensityLengthMismatch { which, expected, actual } => {
                write!(f, "Density update got {actual} {which} counts, grid has {expected} points")
            }

            // ---- Optimizer ----
            IrtError::ItemOptimizationFailed { item, reason } => {
                write!(f, "Optimization failed for item {item}: {reason}")
            }
            IrtError::Optimizer(err) => write!(f, "Optimizer error: {err}"),

            // ---- Model state ----
            IrtError::ModelNotSolved => write!(f, "Model has not been solved yet"),
            IrtError::ResponsesNotLoaded => {
                write!(f, "No responses loaded; call load_responses first")
            }
        }
    }
}

impl From<OptError> for IrtError {
    fn from(err: OptError) -> Self {
        IrtError::Optimizer(err)
    }
}

#[cfg(feature = "python-bindings")]
impl From<IrtError> for PyErr {
    fn from(err: IrtError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Ensure optimizer errors lift into `IrtError::Optimizer` unchanged.
    //
    // Given
    // -----
    // - `OptError::DegenerateCounts`.
    //
    // Expect
    // ------
    // - `IrtError::Optimizer(OptError::DegenerateCounts)`.
    fn opt_error_converts_into_optimizer_variant() {
        let err: IrtError = OptError::DegenerateCounts.into();

        assert_eq!(err, IrtError::Optimizer(OptError::DegenerateCounts));
    }

    #[test]
    // Purpose
    // -------
    // Check that the consistency error names the user and the offending sum.
    //
    // Given
    // -----
    // - `ImproperPosterior { user: "42", sum: 0.5 }`.
    //
    // Expect
    // ------
    // - Message contains "42" and "0.5".
    fn improper_posterior_display_names_user_and_sum() {
        let msg = IrtError::ImproperPosterior { user: "42".to_string(), sum: 0.5 }.to_string();

        assert!(msg.contains("42"));
        assert!(msg.contains("0.5"));
    }
}
