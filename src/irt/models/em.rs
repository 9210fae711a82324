//! EM engine — marginal maximum likelihood for the 2PL model.
//!
//! Purpose
//! -------
//! Drive the E/M fixed-point iteration over a [`ResponseIndex`]: posterior
//! abilities on the grid, expected counts, per-item re-estimation, and
//! density re-estimation, then report item parameters and EAP abilities.
//!
//! Key behaviors
//! -------------
//! - Items start at `(alpha = 1, beta = 0)`; the density starts uniform.
//! - Each iteration runs the E-step (posterior rows + expected counts), then
//!   the M-step: every item is re-optimized from its current estimate, or
//!   with probability `jump_prob` from `(beta = 0, alpha = 1)`, and the
//!   density is reset to `r_k / (r_k + w_k)`.
//! - Exactly `iterations` rounds run unless `tol` is set and the largest
//!   item-parameter change of an M-step falls below it.
//! - Final abilities are `posterior · grid` using the last E-step.
//!
//! Invariants & assumptions
//! ------------------------
//! - All per-solve state lives in a `SolveContext` created by `solve`;
//!   independent solves never share state.
//! - Jump decisions are drawn sequentially in item order before the
//!   per-item optimizations run, so a seed gives the same fit with and
//!   without `parallel`.
//! - Iteration `n + 1` reads the item parameters and density written by the
//!   M-step of iteration `n`; only work inside a step is parallel.
//! - A failing item optimization aborts the solve with the item id; stale
//!   parameters are never kept silently.
//!
//! Downstream usage
//! ----------------
//! - One-shot: [`fit_2pl`] or [`EmSolver::solve`].
//! - Stepwise: [`Irt2plMmle`] (`load_responses` → `set_theta_prior` →
//!   `solve` → `results`).
//! - Tests and custom optimizers: [`EmSolver::with_optimizer`] and
//!   [`EmSolver::solve_with_rng`].
use crate::irt::{
    core::{
        grid::{AbilityDensity, AbilityGrid},
        index::ResponseIndex,
        options::{EmOptions, GridSpec},
        params::ItemParam,
        posterior::{ExpectedCounts, Posterior, compute_posterior, expected_counts},
        records::{ResponseId, ResponseRecord},
    },
    errors::{IrtError, IrtResult},
    models::item::{ItemOptimizer, LbfgsItemOptimizer},
};
use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Diagnostics of one E/M round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationSummary {
    /// 1-based iteration number.
    pub iteration: usize,
    /// `Σ_i ln p(responses_i)` at the E-step of this round.
    pub marginal_log_likelihood: f64,
    /// Largest absolute change of any item's `alpha` or `beta` in the M-step.
    pub max_param_change: f64,
    /// Items whose optimizer started from `(beta = 0, alpha = 1)`.
    pub restarts: usize,
}

/// Result of a solve.
///
/// Items and users are kept in first-seen input order; `item_params[j]`
/// belongs to `items[j]` and `abilities[i]` to `users[i]`.
#[derive(Debug, Clone)]
pub struct EmFit<U, I> {
    pub items: Vec<I>,
    pub item_params: Vec<ItemParam>,
    pub users: Vec<U>,
    pub abilities: Array1<f64>,
    pub grid: AbilityGrid,
    pub density: AbilityDensity,
    pub posterior: Posterior,
    pub history: Vec<IterationSummary>,
    pub stopped_early: bool,
    item_lookup: HashMap<I, usize>,
    user_lookup: HashMap<U, usize>,
}

impl<U: ResponseId, I: ResponseId> EmFit<U, I> {
    pub fn item_param(&self, item: &I) -> Option<ItemParam> {
        self.item_lookup.get(item).map(|&j| self.item_params[j])
    }

    pub fn ability(&self, user: &U) -> Option<f64> {
        self.user_lookup.get(user).map(|&i| self.abilities[i])
    }

    /// Number of E/M rounds that ran.
    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    /// `(item id, parameters)` pairs in first-seen order.
    pub fn item_params_iter(&self) -> impl Iterator<Item = (&I, &ItemParam)> + '_ {
        self.items.iter().zip(&self.item_params)
    }

    /// `(user id, ability)` pairs in first-seen order.
    pub fn abilities_iter(&self) -> impl Iterator<Item = (&U, f64)> + '_ {
        self.users.iter().zip(self.abilities.iter().copied())
    }
}

/// Mutable state of a single solve.
struct SolveContext<'a, U, I> {
    index: &'a ResponseIndex<U, I>,
    grid: AbilityGrid,
    density: AbilityDensity,
    params: Vec<ItemParam>,
}

impl<'a, U: ResponseId, I: ResponseId> SolveContext<'a, U, I> {
    fn new(index: &'a ResponseIndex<U, I>, grid: AbilityGrid) -> Self {
        let density = AbilityDensity::uniform(&grid);
        Self { index, grid, density, params: vec![ItemParam::default(); index.n_items()] }
    }

    fn e_step(&self, parallel: bool) -> IrtResult<(Posterior, ExpectedCounts)> {
        let posterior =
            compute_posterior(self.index, &self.grid, &self.density, &self.params, parallel)?;
        let counts = expected_counts(self.index, &posterior);
        Ok((posterior, counts))
    }

    /// Re-estimate every item; returns the largest parameter change.
    fn update_items<O: ItemOptimizer>(
        &mut self, optimizer: &O, options: &EmOptions, counts: &ExpectedCounts, restarts: &[bool],
    ) -> IrtResult<f64> {
        let update = |j: usize| {
            let initial = if restarts[j] { ItemParam::default() } else { self.params[j] };
            optimizer
                .optimize(
                    &self.grid,
                    &options.bounds,
                    initial,
                    counts.right_column(j),
                    counts.wrong_column(j),
                )
                .map_err(|err| IrtError::ItemOptimizationFailed {
                    item: format!("{:?}", self.index.items()[j]),
                    reason: err.to_string(),
                })
        };
        let n_items = self.index.n_items();
        let results: Vec<IrtResult<ItemParam>> = if options.parallel {
            (0..n_items).into_par_iter().map(update).collect()
        } else {
            (0..n_items).map(update).collect()
        };

        let mut max_change = 0.0_f64;
        for (j, result) in results.into_iter().enumerate() {
            let updated = result?;
            max_change = max_change.max(updated.max_abs_diff(&self.params[j]));
            self.params[j] = updated;
        }
        Ok(max_change)
    }

    fn update_density(&mut self, counts: &ExpectedCounts, iteration: usize) -> IrtResult<()> {
        let (right, wrong) = counts.grid_totals();
        let retained = self.density.update_from_counts(right.view(), wrong.view())?;
        if !retained.is_empty() {
            warn!(
                iteration,
                grid_points = ?retained,
                "no expected responses at some ability points; keeping previous density"
            );
        }
        Ok(())
    }
}

/// EM solver over a response index.
#[derive(Debug, Clone, PartialEq)]
pub struct EmSolver<O = LbfgsItemOptimizer> {
    pub options: EmOptions,
    pub optimizer: O,
}

impl EmSolver<LbfgsItemOptimizer> {
    /// Solver with the L-BFGS item optimizer configured from
    /// `options.mle_opts`.
    pub fn new(options: EmOptions) -> Self {
        let optimizer = LbfgsItemOptimizer::new(options.mle_opts.clone());
        Self { options, optimizer }
    }
}

impl<O: ItemOptimizer> EmSolver<O> {
    pub fn with_optimizer(options: EmOptions, optimizer: O) -> Self {
        Self { options, optimizer }
    }

    /// Solve with the RNG seeded from `options.seed`, or from the thread
    /// RNG when no seed is set.
    pub fn solve<U: ResponseId, I: ResponseId>(
        &self, index: &ResponseIndex<U, I>,
    ) -> IrtResult<EmFit<U, I>> {
        let mut rng = match self.options.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_rng(&mut rand::rng()),
        };
        self.solve_with_rng(index, &mut rng)
    }

    /// Solve drawing jump decisions from `rng`.
    ///
    /// # Errors
    /// - Invalid options (see [`EmOptions::validate`]).
    /// - [`IrtError::NoResponses`] for an empty index.
    /// - [`IrtError::ImproperPosterior`] from any E-step.
    /// - [`IrtError::ItemOptimizationFailed`] from any M-step.
    pub fn solve_with_rng<U: ResponseId, I: ResponseId, R: Rng + ?Sized>(
        &self, index: &ResponseIndex<U, I>, rng: &mut R,
    ) -> IrtResult<EmFit<U, I>> {
        let opts = &self.options;
        opts.validate()?;
        if index.is_empty() {
            return Err(IrtError::NoResponses);
        }
        let mut ctx = SolveContext::new(index, opts.grid.build()?);
        let mut history = Vec::with_capacity(opts.iterations);
        let mut stopped_early = false;
        let mut last_posterior = None;

        for iteration in 1..=opts.iterations {
            let (posterior, counts) = ctx.e_step(opts.parallel)?;

            let restarts: Vec<bool> =
                (0..index.n_items()).map(|_| rng.random::<f64>() < opts.jump_prob).collect();
            let max_param_change = ctx.update_items(&self.optimizer, opts, &counts, &restarts)?;
            ctx.update_density(&counts, iteration)?;

            let summary = IterationSummary {
                iteration,
                marginal_log_likelihood: posterior.marginal_log_likelihood(),
                max_param_change,
                restarts: restarts.iter().filter(|&&r| r).count(),
            };
            debug!(
                iteration,
                marginal_log_likelihood = summary.marginal_log_likelihood,
                max_param_change,
                restarts = summary.restarts,
                "EM iteration"
            );
            history.push(summary);
            last_posterior = Some(posterior);

            if opts.tol.is_some_and(|tol| max_param_change < tol) {
                stopped_early = true;
                break;
            }
        }

        // `iterations >= 1` is validated above, so the loop ran at least once.
        let posterior = last_posterior.ok_or(IrtError::InvalidIterations { iterations: 0 })?;
        let abilities = posterior.eap(&ctx.grid);
        info!(
            users = index.n_users(),
            items = index.n_items(),
            grid_points = ctx.grid.len(),
            iterations = history.len(),
            stopped_early,
            "2PL EM solve finished"
        );

        Ok(EmFit {
            items: index.items().to_vec(),
            item_params: ctx.params,
            users: index.users().to_vec(),
            abilities,
            grid: ctx.grid,
            density: ctx.density,
            posterior,
            history,
            stopped_early,
            item_lookup: lookup(index.items()),
            user_lookup: lookup(index.users()),
        })
    }
}

fn lookup<T: ResponseId>(ids: &[T]) -> HashMap<T, usize> {
    ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect()
}

/// Build the index from `records` and solve with `options`.
pub fn fit_2pl<U, I, R>(records: R, options: EmOptions) -> IrtResult<EmFit<U, I>>
where
    U: ResponseId,
    I: ResponseId,
    R: IntoIterator<Item = ResponseRecord<U, I>>,
{
    let index = ResponseIndex::build(records);
    EmSolver::new(options).solve(&index)
}

/// Stateful 2PL model: load responses, optionally set the ability grid,
/// solve, then read results.
#[derive(Debug, Clone)]
pub struct Irt2plMmle<U, I> {
    pub options: EmOptions,
    index: Option<ResponseIndex<U, I>>,
    fit: Option<EmFit<U, I>>,
}

impl<U: ResponseId, I: ResponseId> Irt2plMmle<U, I> {
    pub fn new(options: EmOptions) -> Self {
        Self { options, index: None, fit: None }
    }

    /// Index `records`, replacing any previously loaded responses and
    /// clearing cached results.
    pub fn load_responses<R>(&mut self, records: R)
    where
        R: IntoIterator<Item = ResponseRecord<U, I>>,
    {
        self.index = Some(ResponseIndex::build(records));
        self.fit = None;
    }

    /// Replace the ability grid.
    pub fn set_theta_prior(&mut self, min: f64, max: f64, count: usize) -> IrtResult<()> {
        self.options.grid = GridSpec::new(min, max, count)?;
        self.fit = None;
        Ok(())
    }

    pub fn index(&self) -> Option<&ResponseIndex<U, I>> {
        self.index.as_ref()
    }

    pub fn solve(&mut self) -> IrtResult<&EmFit<U, I>> {
        let index = self.index.as_ref().ok_or(IrtError::ResponsesNotLoaded)?;
        let fit = EmSolver::new(self.options.clone()).solve(index)?;
        Ok(&*self.fit.insert(fit))
    }

    pub fn results(&self) -> IrtResult<&EmFit<U, I>> {
        self.fit.as_ref().ok_or(IrtError::ModelNotSolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        irt::core::{grid::AbilityGrid, params::ItemBounds},
        optimization::errors::{OptError, OptResult},
    };
    use ndarray::ArrayView1;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns its starting point and counts how often it started cold.
    #[derive(Default)]
    struct EchoOptimizer {
        cold_starts: AtomicUsize,
    }

    impl ItemOptimizer for EchoOptimizer {
        fn optimize(
            &self, _: &AbilityGrid, _: &ItemBounds, initial: ItemParam, _: ArrayView1<'_, f64>,
            _: ArrayView1<'_, f64>,
        ) -> OptResult<ItemParam> {
            if initial == ItemParam::default() {
                self.cold_starts.fetch_add(1, Ordering::Relaxed);
            }
            Ok(ItemParam::new(initial.alpha * 0.5 + 0.5, initial.beta + 0.1))
        }
    }

    /// Fails for every item.
    struct FailingOptimizer;

    impl ItemOptimizer for FailingOptimizer {
        fn optimize(
            &self, _: &AbilityGrid, _: &ItemBounds, _: ItemParam, _: ArrayView1<'_, f64>,
            _: ArrayView1<'_, f64>,
        ) -> OptResult<ItemParam> {
            Err(OptError::NotConverged { status: "MaxItersReached".to_string() })
        }
    }

    fn records() -> Vec<ResponseRecord<i64, i64>> {
        vec![
            ResponseRecord::new(1, 1, 1.0),
            ResponseRecord::new(1, 2, 0.0),
            ResponseRecord::new(2, 1, 0.0),
            ResponseRecord::new(2, 2, 1.0),
        ]
    }

    fn serial_options(jump_prob: f64) -> EmOptions {
        EmOptions { jump_prob, parallel: false, seed: Some(7), ..EmOptions::default() }
    }

    #[test]
    // Purpose
    // -------
    // Ensure the loop runs exactly the configured number of iterations and
    // that jump_prob = 1 restarts every item every round.
    //
    // Given
    // -----
    // - The 2×2 response set, the echo optimizer, jump_prob = 1.
    //
    // Expect
    // ------
    // - 5 history entries, 2 restarts each, 10 cold starts in total.
    fn runs_fixed_iterations_and_honours_jump_one() {
        let index = ResponseIndex::build(records());
        let solver = EmSolver::with_optimizer(serial_options(1.0), EchoOptimizer::default());

        let fit = solver.solve(&index).unwrap();

        assert_eq!(fit.iterations(), 5);
        assert!(!fit.stopped_early);
        assert!(fit.history.iter().all(|h| h.restarts == 2));
        assert_eq!(solver.optimizer.cold_starts.load(Ordering::Relaxed), 10);
        assert_eq!(fit.item_param(&1), Some(ItemParam::new(1.0, 0.1)));
    }

    #[test]
    // Purpose
    // -------
    // Verify warm starts chain parameters across iterations when
    // jump_prob = 0.
    //
    // Given
    // -----
    // - Echo optimizer mapping (alpha, beta) → (alpha/2 + 1/2, beta + 0.1).
    //
    // Expect
    // ------
    // - After 5 rounds beta = 0.5; alpha stays 1; no restarts recorded.
    fn warm_starts_chain_across_iterations() {
        let index = ResponseIndex::build(records());
        let solver = EmSolver::with_optimizer(serial_options(0.0), EchoOptimizer::default());

        let fit = solver.solve(&index).unwrap();

        let p = fit.item_param(&2).unwrap();
        assert!((p.beta - 0.5).abs() < 1e-12);
        assert_eq!(p.alpha, 1.0);
        assert!(fit.history.iter().all(|h| h.restarts == 0));
    }

    #[test]
    // Purpose
    // -------
    // Ensure an optimizer failure aborts the solve and names the item.
    //
    // Given
    // -----
    // - The failing optimizer.
    //
    // Expect
    // ------
    // - `ItemOptimizationFailed` for item "1".
    fn optimizer_failure_names_the_item() {
        let index = ResponseIndex::build(records());
        let solver = EmSolver::with_optimizer(serial_options(0.2), FailingOptimizer);

        let err = solver.solve(&index).unwrap_err();

        assert!(matches!(err, IrtError::ItemOptimizationFailed { ref item, .. } if item == "1"));
    }

    #[test]
    // Purpose
    // -------
    // Check early stopping on a small parameter change.
    //
    // Given
    // -----
    // - Echo optimizer (beta moves 0.1 per round) and tol = 0.5.
    //
    // Expect
    // ------
    // - Stops after the first round with `stopped_early`.
    fn early_stop_when_change_below_tolerance() {
        let index = ResponseIndex::build(records());
        let opts = EmOptions { tol: Some(0.5), ..serial_options(0.0) };
        let solver = EmSolver::with_optimizer(opts, EchoOptimizer::default());

        let fit = solver.solve(&index).unwrap();

        assert_eq!(fit.iterations(), 1);
        assert!(fit.stopped_early);
    }

    #[test]
    // Purpose
    // -------
    // Ensure an empty response set and invalid options are rejected before
    // any work happens.
    //
    // Given
    // -----
    // - An empty index; then jump_prob = 2.
    //
    // Expect
    // ------
    // - `NoResponses`, then `InvalidJumpProb`.
    fn empty_index_and_bad_options_are_rejected() {
        let empty: ResponseIndex<i64, i64> = ResponseIndex::build(Vec::new());
        let err = EmSolver::new(EmOptions::default()).solve(&empty).unwrap_err();
        assert_eq!(err, IrtError::NoResponses);

        let index = ResponseIndex::build(records());
        let opts = EmOptions { jump_prob: 2.0, ..EmOptions::default() };
        let err = EmSolver::new(opts).solve(&index).unwrap_err();
        assert_eq!(err, IrtError::InvalidJumpProb { value: 2.0 });
    }

    #[test]
    // Purpose
    // -------
    // Walk the stepwise facade and its state errors.
    //
    // Given
    // -----
    // - A fresh `Irt2plMmle` with echo-free default options on a 5-point
    //   grid.
    //
    // Expect
    // ------
    // - `solve` before loading fails with `ResponsesNotLoaded`.
    // - `results` before solving fails with `ModelNotSolved`.
    // - After solving, results expose both items and both users.
    fn facade_tracks_state() {
        let mut model: Irt2plMmle<i64, i64> = Irt2plMmle::new(EmOptions::seeded(3));
        assert_eq!(model.solve().unwrap_err(), IrtError::ResponsesNotLoaded);

        model.load_responses(records());
        model.set_theta_prior(-4.0, 4.0, 5).unwrap();
        assert_eq!(model.results().unwrap_err(), IrtError::ModelNotSolved);

        model.solve().unwrap();
        let fit = model.results().unwrap();
        assert_eq!(fit.grid.len(), 5);
        assert!(fit.item_param(&1).is_some() && fit.item_param(&2).is_some());
        assert!(fit.ability(&1).is_some() && fit.ability(&2).is_some());
        assert!(fit.ability(&3).is_none());
    }
}
