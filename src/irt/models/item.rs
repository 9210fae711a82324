//! Item M-step — expected complete-data log-likelihood of one item and the
//! optimizer that maximizes it under box constraints.
//!
//! Purpose
//! -------
//! For one item, given expected right counts `r_k` and wrong counts `w_k`
//! at each grid point `θ_k`, maximize
//!
//! ```text
//! ℓ(β, α) = Σ_k r_k · ln σ(z_k) + w_k · ln σ(−z_k),   z_k = α(θ_k − β)
//! ```
//!
//! subject to `α ∈ [α_lo, α_hi]`, `β ∈ [β_lo, β_hi]`.
//!
//! Key behaviors
//! -------------
//! - [`ItemLogLikelihood`] implements [`LogLikelihood`] in the unconstrained
//!   space `t = (t_β, t_α)`, with `β = β_lo + (β_hi − β_lo)·σ(t_β)` and the
//!   same map for `α`, so L-BFGS never leaves the box.
//! - The objective is scaled by `1 / Σ_k (r_k + w_k)`. The maximizer is
//!   unchanged and gradients stay O(1) whatever the sample size.
//! - The analytic gradient uses `∂ℓ/∂z_k = r_k − (r_k + w_k)·σ(z_k)` chained
//!   through `∂z/∂α = θ_k − β`, `∂z/∂β = −α`, and the scaled-logistic
//!   derivative.
//! - [`ItemOptimizer`] is the seam the EM engine calls; [`LbfgsItemOptimizer`]
//!   is the default implementation.
//!
//! Invariants & assumptions
//! ------------------------
//! - `check` rejects count vectors whose length differs from the grid,
//!   negative or non-finite counts, and all-zero counts. Degenerate counts
//!   are an error, not a silent default.
//! - Start points are pulled [`START_MARGIN`] of the range inside the box.
//!   A start on a bound would sit where `σ'(t) ≈ 0` and stall the solver.
//! - The logistic map flattens near the bounds, so a small gradient in `t`
//!   does not imply optimality in `(β, α)`. A result is accepted only when
//!   its projected gradient ([`ItemLogLikelihood::kkt_violation`]) is below
//!   [`KKT_TOL`]. Otherwise the optimizer restarts from the re-centered best
//!   point and finally from the default `(1, 0)`, keeping the highest `ℓ`.
//! - A run whose best point is neither solver-converged nor KKT-optimal is
//!   an [`OptError::NotConverged`]; a converged run that still violates the
//!   bound conditions is an [`OptError::KktViolation`].
use crate::{
    irt::core::{
        grid::AbilityGrid,
        params::{ItemBounds, ItemParam},
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{Cost, Grad, LogLikelihood, MLEOptions, Theta, maximize},
        numerical_stability::{
            safe_log_logistic, safe_logistic, scaled_logistic, scaled_logistic_deriv,
            scaled_logit,
        },
    },
};
use ndarray::{Array1, ArrayView1, array};

/// Fraction of each bound's range kept between a start point and the bound.
pub const START_MARGIN: f64 = 1e-2;

/// Largest projected gradient (per unit of expected count) accepted as an
/// optimum.
pub const KKT_TOL: f64 = 1e-3;

/// Fraction of each bound's range within which the bound counts as active.
pub const ACTIVE_BOUND_FRAC: f64 = 1e-2;

/// Re-centered restarts tried before the cold `(1, 0)` restart.
const MAX_RECENTERS: usize = 2;

/// Expected counts for one item, owned so they can be handed to the
/// optimizer as `LogLikelihood::Data`.
///
/// `weight` is `1 / Σ_k (r_k + w_k)`, or 1 when the total is not positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCounts {
    pub theta: Array1<f64>,
    pub right: Array1<f64>,
    pub wrong: Array1<f64>,
    pub weight: f64,
}

impl ItemCounts {
    pub fn new(grid: &AbilityGrid, right: ArrayView1<'_, f64>, wrong: ArrayView1<'_, f64>) -> Self {
        let total = right.sum() + wrong.sum();
        let weight = if total > 0.0 && total.is_finite() { total.recip() } else { 1.0 };
        Self {
            theta: grid.points().to_owned(),
            right: right.to_owned(),
            wrong: wrong.to_owned(),
            weight,
        }
    }
}

/// Objective of one item's M-step in unconstrained coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemLogLikelihood {
    pub bounds: ItemBounds,
}

impl ItemLogLikelihood {
    pub fn new(bounds: ItemBounds) -> Self {
        Self { bounds }
    }

    /// Map `(β, α)` into `t = (t_β, t_α)`, first pulling each coordinate
    /// [`START_MARGIN`] of its range inside the box.
    pub fn to_theta(&self, param: &ItemParam) -> Theta {
        let (beta_lo, beta_hi) = self.bounds.beta;
        let (alpha_lo, alpha_hi) = self.bounds.alpha;
        array![
            scaled_logit(inset(param.beta, self.bounds.beta), beta_lo, beta_hi),
            scaled_logit(inset(param.alpha, self.bounds.alpha), alpha_lo, alpha_hi),
        ]
    }

    /// Map `t = (t_β, t_α)` back into the box.
    pub fn to_param(&self, theta: &Theta) -> OptResult<ItemParam> {
        let (t_beta, t_alpha) = split_theta(theta)?;
        Ok(ItemParam {
            alpha: scaled_logistic(t_alpha, self.bounds.alpha.0, self.bounds.alpha.1),
            beta: scaled_logistic(t_beta, self.bounds.beta.0, self.bounds.beta.1),
        })
    }

    /// Weighted gradient `(∂ℓ/∂β, ∂ℓ/∂α)` in parameter space.
    pub fn param_gradient(&self, param: &ItemParam, data: &ItemCounts) -> (f64, f64) {
        let (mut d_beta, mut d_alpha) = (0.0, 0.0);
        for ((&t, &r), &w) in data.theta.iter().zip(&data.right).zip(&data.wrong) {
            let z = param.alpha * (t - param.beta);
            let dz = r - (r + w) * safe_logistic(z);
            d_alpha += dz * (t - param.beta);
            d_beta -= dz * param.alpha;
        }
        (d_beta * data.weight, d_alpha * data.weight)
    }

    /// Largest violation of the first-order conditions for a maximum on the
    /// box, measured in `(β, α)` space.
    ///
    /// Near a lower bound only an upward gradient counts, near an upper
    /// bound only a downward one, and in the interior the full magnitude.
    pub fn kkt_violation(&self, param: &ItemParam, data: &ItemCounts) -> f64 {
        let (g_beta, g_alpha) = self.param_gradient(param, data);
        projected(g_beta, param.beta, self.bounds.beta)
            .max(projected(g_alpha, param.alpha, self.bounds.alpha))
    }
}

fn inset(x: f64, (lo, hi): (f64, f64)) -> f64 {
    let margin = START_MARGIN * (hi - lo);
    x.clamp(lo + margin, hi - margin)
}

fn projected(g: f64, x: f64, (lo, hi): (f64, f64)) -> f64 {
    let zone = ACTIVE_BOUND_FRAC * (hi - lo);
    if x - lo <= zone {
        g.max(0.0)
    } else if hi - x <= zone {
        (-g).max(0.0)
    } else {
        g.abs()
    }
}

impl LogLikelihood for ItemLogLikelihood {
    type Data = ItemCounts;

    fn value(&self, theta: &Theta, data: &ItemCounts) -> OptResult<Cost> {
        let p = self.to_param(theta)?;
        let mut ll = 0.0;
        for ((&t, &r), &w) in data.theta.iter().zip(&data.right).zip(&data.wrong) {
            let z = p.alpha * (t - p.beta);
            ll += r * safe_log_logistic(z) + w * safe_log_logistic(-z);
        }
        Ok(ll * data.weight)
    }

    fn check(&self, theta: &Theta, data: &ItemCounts) -> OptResult<()> {
        let (t_beta, t_alpha) = split_theta(theta)?;
        for (index, value) in [t_beta, t_alpha].into_iter().enumerate() {
            if !value.is_finite() {
                return Err(OptError::InvalidThetaInput { index, value });
            }
        }
        let k = data.theta.len();
        for counts in [&data.right, &data.wrong] {
            if counts.len() != k {
                return Err(OptError::CountLengthMismatch { expected: k, actual: counts.len() });
            }
            if let Some((index, &value)) =
                counts.iter().enumerate().find(|(_, c)| !c.is_finite() || **c < 0.0)
            {
                return Err(OptError::InvalidCount { index, value });
            }
        }
        if data.right.iter().chain(&data.wrong).all(|&c| c == 0.0) {
            return Err(OptError::DegenerateCounts);
        }
        Ok(())
    }

    fn grad(&self, theta: &Theta, data: &ItemCounts) -> OptResult<Grad> {
        let (t_beta, t_alpha) = split_theta(theta)?;
        let (d_beta, d_alpha) = self.param_gradient(&self.to_param(theta)?, data);
        let (beta_lo, beta_hi) = self.bounds.beta;
        let (alpha_lo, alpha_hi) = self.bounds.alpha;
        Ok(array![
            d_beta * scaled_logistic_deriv(t_beta, beta_lo, beta_hi),
            d_alpha * scaled_logistic_deriv(t_alpha, alpha_lo, alpha_hi),
        ])
    }
}

fn split_theta(theta: &Theta) -> OptResult<(f64, f64)> {
    match theta.as_slice() {
        Some(&[t_beta, t_alpha]) => Ok((t_beta, t_alpha)),
        _ => Err(OptError::ThetaLengthMismatch { expected: 2, actual: theta.len() }),
    }
}

/// Re-estimates one item's parameters from its expected counts.
///
/// Implementations are shared across rayon workers during the M-step.
pub trait ItemOptimizer: Sync {
    /// Return the `(alpha, beta)` in `bounds` maximizing the item's expected
    /// log-likelihood, starting from `initial`.
    ///
    /// # Errors
    /// - Degenerate or malformed counts, backend failures, and
    ///   non-convergence, as [`OptError`].
    fn optimize(
        &self, grid: &AbilityGrid, bounds: &ItemBounds, initial: ItemParam,
        right: ArrayView1<'_, f64>, wrong: ArrayView1<'_, f64>,
    ) -> OptResult<ItemParam>;
}

/// L-BFGS item optimizer driven by [`maximize`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LbfgsItemOptimizer {
    pub mle_opts: MLEOptions,
}

/// Result of one L-BFGS run.
#[derive(Debug, Clone)]
struct Candidate {
    param: ItemParam,
    value: f64,
    converged: bool,
    status: String,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        let tie_break = self.value == other.value && self.converged && !other.converged;
        self.value > other.value || tie_break
    }
}

impl LbfgsItemOptimizer {
    pub fn new(mle_opts: MLEOptions) -> Self {
        Self { mle_opts }
    }

    fn run_from(
        &self, objective: &ItemLogLikelihood, counts: &ItemCounts, start: ItemParam,
    ) -> OptResult<Candidate> {
        let theta0 = objective.to_theta(&objective.bounds.clamp(start));
        let outcome = maximize(objective, theta0, counts, &self.mle_opts)?;
        Ok(Candidate {
            param: objective.to_param(&outcome.theta_hat)?,
            value: outcome.value,
            converged: outcome.converged,
            status: outcome.status,
        })
    }
}

impl ItemOptimizer for LbfgsItemOptimizer {
    fn optimize(
        &self, grid: &AbilityGrid, bounds: &ItemBounds, initial: ItemParam,
        right: ArrayView1<'_, f64>, wrong: ArrayView1<'_, f64>,
    ) -> OptResult<ItemParam> {
        let objective = ItemLogLikelihood::new(*bounds);
        let counts = ItemCounts::new(grid, right, wrong);
        let mut best = self.run_from(&objective, &counts, initial)?;
        let restarts = std::iter::repeat(None)
            .take(MAX_RECENTERS)
            .chain(std::iter::once(Some(ItemParam::default())));
        for fixed_start in restarts {
            if objective.kkt_violation(&best.param, &counts) <= KKT_TOL {
                return Ok(best.param);
            }
            let start = fixed_start.unwrap_or(best.param);
            let candidate = self.run_from(&objective, &counts, start)?;
            if candidate.beats(&best) {
                best = candidate;
            }
        }
        let violation = objective.kkt_violation(&best.param, &counts);
        if violation <= KKT_TOL {
            Ok(best.param)
        } else if !best.converged {
            Err(OptError::NotConverged { status: best.status })
        } else {
            Err(OptError::KktViolation { violation })
        }
    }
}
