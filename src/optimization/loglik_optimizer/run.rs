//! Runs one L-BFGS solve over a [`LogLikelihood`] and reports it as an
//! [`OptimOutcome`] in log-likelihood terms.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta, adapter::ArgMinAdapter,
    },
};
use argmin::core::{Executor, IterState, Solver, State};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient, observers::ObserverMode};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;

/// Solver state shared by both line-search variants.
type LbfgsState = IterState<Theta, Grad, (), (), (), f64>;

/// Solve the problem wrapped in `problem` starting at `theta0`.
///
/// The iteration cap comes from `opts.tols.max_iter`. With the `obs_slog`
/// feature and `opts.verbose`, the starting point is traced and a terminal
/// observer is attached. The final state is turned into an [`OptimOutcome`]
/// with `value = -best_cost`.
///
/// # Errors
/// - Failures raised by argmin or by the wrapped log-likelihood, converted
///   through `From<argmin::core::Error> for OptError`.
/// - Outcome validation errors from [`OptimOutcome::new`].
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, LbfgsState> + Send + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        trace_start(&theta0, &problem)?;
    }

    let max_iters = opts.tols.max_iter.map(|n| n as u64);
    let executor = Executor::new(problem, solver).configure(|state| {
        let state = state.param(theta0);
        match max_iters {
            Some(n) => state.max_iters(n),
            None => state,
        }
    });
    #[cfg(feature = "obs_slog")]
    let executor = if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        executor.add_observer(observer, ObserverMode::Always)
    } else {
        executor
    };

    let result = executor.run()?;
    into_outcome(result.state().clone())
}

fn into_outcome(mut state: LbfgsState) -> OptResult<OptimOutcome> {
    let value = -state.get_best_cost();
    let iterations = state.get_iter();
    let termination = state.get_termination_status().clone();
    let fn_evals = state.get_func_counts().clone();
    let grad = state.take_gradient();
    OptimOutcome::new(state.take_best_param(), value, termination, iterations, fn_evals, grad)
}

#[cfg(feature = "obs_slog")]
fn trace_start<F>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()>
where
    F: LogLikelihood,
{
    let loglik = -problem.cost(theta0)?;
    let grad_norm = problem.gradient(theta0).ok().map(|g| g.l2_norm());
    tracing::debug!(loglik, ?grad_norm, "starting L-BFGS");
    Ok(())
}
