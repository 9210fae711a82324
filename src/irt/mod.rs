//! irt — 2PL item response theory by marginal maximum likelihood (EM).
//!
//! Purpose
//! -------
//! Estimate per-item discrimination/difficulty `(alpha, beta)` and per-user
//! abilities from sparse binary `(user, item, answer)` responses, by
//! integrating abilities over a fixed grid and alternating posterior
//! inference (E-step) with parameter re-estimation (M-step).
//!
//! Key behaviors
//! -------------
//! - [`core`] holds the data side: records and row parsing, the sparse
//!   [`ResponseIndex`], the [`AbilityGrid`] and [`AbilityDensity`], item
//!   parameters and bounds, the 2PL likelihood, options, and the E-step
//!   (posterior rows and expected counts).
//! - [`models`] holds the M-step item optimizer and the EM engine.
//! - [`errors`] defines [`IrtError`] / [`IrtResult`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Every posterior row sums to one within `1e-4`; anything else aborts
//!   the solve with [`IrtError::ImproperPosterior`].
//! - Item estimates always lie inside their [`ItemBounds`].
//! - Grid points where no expected responses fall keep their previous
//!   density value.
//!
//! Conventions
//! -----------
//! - Ids are generic ([`ResponseId`]); results keep first-seen input order.
//! - An answer is correct iff it is within `1e-3` of `1.0`.
//! - Logging goes through `tracing`: one `debug` event per iteration, a
//!   `warn` when the density update finds no information at a grid point,
//!   and one `info` event per solve.
//!
//! Downstream usage
//! ----------------
//! ```no_run
//! use rust_irt::irt::prelude::*;
//!
//! let records = vec![
//!     ResponseRecord::new(1, "q1", 1.0),
//!     ResponseRecord::new(1, "q2", 0.0),
//!     ResponseRecord::new(2, "q1", 0.0),
//!     ResponseRecord::new(2, "q2", 1.0),
//! ];
//! let fit = fit_2pl(records, EmOptions::seeded(42))?;
//! for (item, p) in fit.item_params_iter() {
//!     println!("{item}: alpha={:.3} beta={:.3}", p.alpha, p.beta);
//! }
//! # Ok::<(), IrtError>(())
//! ```
//!
//! Testing notes
//! -------------
//! - Unit tests sit beside each module; `tests/integration_em_pipeline.rs`
//!   runs full solves through the public API.

pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    AbilityDensity, AbilityGrid, EmOptions, ExpectedCounts, GridSpec, ItemBounds, ItemParam,
    Posterior, ResponseId, ResponseIndex, ResponseRecord,
};
pub use self::errors::{IrtError, IrtResult};
pub use self::models::{
    EmFit, EmSolver, Irt2plMmle, ItemOptimizer, IterationSummary, LbfgsItemOptimizer, fit_2pl,
};

pub mod prelude {
    pub use super::{
        AbilityDensity, AbilityGrid, EmFit, EmOptions, EmSolver, GridSpec, Irt2plMmle, IrtError,
        IrtResult, ItemBounds, ItemOptimizer, ItemParam, IterationSummary, LbfgsItemOptimizer,
        ResponseIndex, ResponseRecord, fit_2pl,
    };
}
