//! numerical_stability — overflow-safe transforms shared by the optimizer
//! and the IRT likelihoods.
//!
//! Purpose
//! -------
//! Keep the small, hot numerical primitives in one place: the logistic and
//! log-logistic functions used by every 2PL likelihood evaluation, the
//! max-shifted log-sum-exp used to normalize posteriors, and the bounded
//! reparameterization that lets an unconstrained L-BFGS respect item
//! parameter bounds.
//!
//! Conventions
//! -----------
//! - Pure functions on `f64`; no allocation beyond the caller's slices, no
//!   logging, no global state.
//! - Inputs are assumed finite unless a function documents its handling of
//!   infinities (`log_sum_exp`).
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] compare against naïve formulas on safe
//!   grids and check tail behaviour at magnitudes around 1000.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    LOGIT_EPS, log_sum_exp, safe_log_logistic, safe_logistic, scaled_logistic,
    scaled_logistic_deriv, scaled_logit,
};

pub mod prelude {
    pub use super::transformations::{
        LOGIT_EPS, log_sum_exp, safe_log_logistic, safe_logistic, scaled_logistic, scaled_logit,
    };
}
