//! High-level entry point for maximizing a user-provided `LogLikelihood`.
//!
//! Selects an L-BFGS solver with either Hager–Zhang or More–Thuente line
//! search, wraps the model in an `ArgMinAdapter` (which *minimizes* `-ℓ(θ)`),
//! and delegates the run to `run_lbfgs`.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
    },
};

/// Maximize a log-likelihood `ℓ(θ)` using L-BFGS with the chosen line search.
///
/// # Behavior
/// - Validates the initial guess via `f.check(&theta0, data)`.
/// - Wraps `(f, data)` in an `ArgMinAdapter` exposing `c(θ) = -ℓ(θ)`.
/// - Builds the solver selected by `opts.line_searcher` and runs it.
///
/// # Errors
/// - Propagates any error from `f.check`.
/// - Propagates builder errors (invalid tolerances).
/// - Propagates runtime errors from `run_lbfgs` (e.g., line search failures,
///   errors raised by `f.value`/`f.grad`).
///
/// # Example
/// ```
/// use ndarray::array;
/// use rust_irt::optimization::{
///     errors::OptResult,
///     loglik_optimizer::{maximize, Grad, LogLikelihood, MLEOptions, Theta},
/// };
///
/// struct Quadratic;
/// impl LogLikelihood for Quadratic {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(-theta.dot(theta))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
///     fn grad(&self, theta: &Theta, _: &()) -> OptResult<Grad> {
///         Ok(theta * -2.0)
///     }
/// }
///
/// let out = maximize(&Quadratic, array![0.5, -0.3], &(), &MLEOptions::default())?;
/// assert!(out.theta_hat.iter().all(|v| v.abs() < 1e-4));
/// # Ok::<(), rust_irt::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}
