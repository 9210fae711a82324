//! loglik_optimizer — argmin-powered log-likelihood maximizer.
//!
//! Purpose
//! -------
//! Maximize log-likelihoods `ℓ(θ)` with L-BFGS. Callers implement
//! [`LogLikelihood`] and call [`maximize`]; this layer handles the sign flip
//! to a cost, solver construction, finite-difference fallbacks, and result
//! validation.
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] turns `ℓ(θ)` into the Argmin cost
//!   `c(θ) = -ℓ(θ)`.
//! - [`maximize`] validates the initial guess, builds the solver selected in
//!   [`MLEOptions`], runs it via [`run::run_lbfgs`], and returns an
//!   [`OptimOutcome`].
//! - [`validation`] keeps tolerance, gradient, and estimate checks in one
//!   place.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameters live in an unconstrained space as [`Theta`]; any mapping to
//!   a bounded model space is the model's job (the 2PL item objective uses
//!   scaled logistic transforms from `numerical_stability`).
//! - `value`/`grad` report invalid inputs as [`OptError`] values, never
//!   panics.
//!
//! Testing notes
//! -------------
//! - Unit tests cover sign conventions and the FD fallback ([`adapter`]),
//!   builder wiring ([`builders`]), configuration and outcome invariants
//!   ([`traits`]), and the validators.
//! - The item objective in `irt::models::item` exercises [`maximize`] end to
//!   end on real expected counts.
//!
//! [`OptError`]: crate::optimization::errors::OptError

pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
