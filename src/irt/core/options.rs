//! EM options — configuration for the ability grid, item bounds, and the
//! EM loop.
//!
//! Purpose
//! -------
//! Collect every knob of a solve in one validated value so the engine never
//! sees ad-hoc arguments.
//!
//! Key behaviors
//! -------------
//! - [`GridSpec`] describes the ability grid (`min`, `max`, `count`) and
//!   builds it.
//! - [`EmOptions`] bundles the grid spec, [`ItemBounds`], the jump
//!   probability, the iteration budget, an optional early-stop tolerance,
//!   an optional RNG seed, the parallelism switch, and the item optimizer's
//!   [`MLEOptions`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Constructors validate their own fields and return `IrtResult`; the
//!   `Default` impls produce valid values (grid −4..4 with 25 points, jump
//!   probability 0.2, 5 iterations, no early stop).
//! - `tol = None` reproduces the fixed-iteration behavior: exactly
//!   `iterations` E/M rounds.
//!
//! Testing notes
//! -------------
//! - Unit tests check defaults and each validation branch.
use crate::{
    irt::{
        core::{grid::AbilityGrid, params::ItemBounds},
        errors::{IrtError, IrtResult},
    },
    optimization::loglik_optimizer::MLEOptions,
};

/// Default number of E/M rounds.
pub const DEFAULT_ITERATIONS: usize = 5;

/// Default probability of cold-restarting an item's optimizer.
pub const DEFAULT_JUMP_PROB: f64 = 0.2;

/// Ability grid description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl GridSpec {
    /// # Errors
    /// - [`IrtError::InvalidGridSpec`] for non-finite bounds, `count == 0`,
    ///   or `min >= max` when `count > 1`.
    pub fn new(min: f64, max: f64, count: usize) -> IrtResult<Self> {
        let invalid = |reason: &'static str| IrtError::InvalidGridSpec { min, max, count, reason };
        if !min.is_finite() || !max.is_finite() {
            return Err(invalid("grid bounds must be finite"));
        }
        if count == 0 {
            return Err(invalid("grid needs at least one point"));
        }
        if count > 1 && min >= max {
            return Err(invalid("min must be < max"));
        }
        Ok(Self { min, max, count })
    }

    pub fn build(&self) -> IrtResult<AbilityGrid> {
        AbilityGrid::from_spec(self)
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self { min: -4.0, max: 4.0, count: 25 }
    }
}

/// EmOptions — configuration of one EM solve.
///
/// Fields
/// ------
/// - `grid`: ability grid spec.
/// - `bounds`: item parameter box.
/// - `jump_prob`: probability that an item's M-step starts from
///   `(beta = 0, alpha = 1)` instead of its current estimate.
/// - `iterations`: maximum number of E/M rounds.
/// - `tol`: optional early stop on the largest absolute item-parameter change
///   in an M-step.
/// - `seed`: seed for the jump decisions; `None` draws from OS entropy.
/// - `parallel`: run per-user posteriors and per-item optimizations on the
///   rayon pool.
/// - `mle_opts`: L-BFGS options for each item optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct EmOptions {
    pub grid: GridSpec,
    pub bounds: ItemBounds,
    pub jump_prob: f64,
    pub iterations: usize,
    pub tol: Option<f64>,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub mle_opts: MLEOptions,
}

impl EmOptions {
    /// Validate and build options.
    ///
    /// # Errors
    /// - [`IrtError::InvalidJumpProb`] unless `0 <= jump_prob <= 1`.
    /// - [`IrtError::InvalidIterations`] if `iterations == 0`.
    /// - [`IrtError::InvalidTolerance`] if `tol` is non-finite or `<= 0`.
    pub fn new(
        grid: GridSpec, bounds: ItemBounds, jump_prob: f64, iterations: usize, tol: Option<f64>,
        seed: Option<u64>, parallel: bool, mle_opts: MLEOptions,
    ) -> IrtResult<Self> {
        let opts = Self { grid, bounds, jump_prob, iterations, tol, seed, parallel, mle_opts };
        opts.validate()?;
        Ok(opts)
    }

    /// Re-check fields that callers may have set directly.
    ///
    /// Grid and bounds are re-validated through their own constructors.
    pub fn validate(&self) -> IrtResult<()> {
        GridSpec::new(self.grid.min, self.grid.max, self.grid.count)?;
        ItemBounds::new(self.bounds.alpha, self.bounds.beta)?;
        if !(0.0..=1.0).contains(&self.jump_prob) {
            return Err(IrtError::InvalidJumpProb { value: self.jump_prob });
        }
        if self.iterations == 0 {
            return Err(IrtError::InvalidIterations { iterations: self.iterations });
        }
        if let Some(tol) = self.tol {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(IrtError::InvalidTolerance { tol });
            }
        }
        Ok(())
    }

    /// Defaults with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed), ..Self::default() }
    }
}

impl Default for EmOptions {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            bounds: ItemBounds::default(),
            jump_prob: DEFAULT_JUMP_PROB,
            iterations: DEFAULT_ITERATIONS,
            tol: None,
            seed: None,
            parallel: true,
            mle_opts: MLEOptions::default(),
        }
    }
}
