//! irt::models — item M-step and the EM engine.
//!
//! - [`item`]: per-item expected log-likelihood ([`ItemLogLikelihood`]), the
//!   [`ItemOptimizer`] seam, and the default [`LbfgsItemOptimizer`].
//! - [`em`]: [`EmSolver`], [`EmFit`], [`IterationSummary`], the stepwise
//!   [`Irt2plMmle`] model, and [`fit_2pl`].

pub mod em;
pub mod item;

pub use self::em::{EmFit, EmSolver, Irt2plMmle, IterationSummary, fit_2pl};
pub use self::item::{ItemCounts, ItemLogLikelihood, ItemOptimizer, LbfgsItemOptimizer};
