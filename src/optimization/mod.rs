//! optimization — MLE stack, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer the IRT engine builds on: an
//! Argmin-backed log-likelihood maximizer, numerically stable transforms,
//! and a single error/result surface.
//!
//! Key behaviors
//! -------------
//! - `loglik_optimizer`: maximize `ℓ(θ)` with L-BFGS, configurable line
//!   search and tolerances.
//! - `numerical_stability`: logistic, log-logistic, log-sum-exp, and the
//!   scaled logistic maps between ℝ and bounded parameter intervals.
//! - `errors`: configuration issues, numerical failures, and backend solver
//!   errors normalized into [`errors::OptError`] / [`errors::OptResult`].
//!
//! Conventions
//! -----------
//! - Solvers maximize `ℓ(θ)` by minimizing `c(θ) = -ℓ(θ)`; user-facing
//!   values are always log-likelihoods.
//! - This module and its submodules do not log; the EM engine reports
//!   progress.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
