//! rust_irt — 2PL item response theory estimation with optional Python
//! bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the EM estimator to Python via the `_rust_irt` extension module.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules: [`irt`] (response index, ability grid,
//!   E-step, item optimizer, EM engine) and [`optimization`] (L-BFGS
//!   log-likelihood maximizer and numerically stable transforms).
//! - With `python-bindings`, define the `Irt2PL` class and register it under
//!   the `rust_irt.irt_models` submodule.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file only converts
//!   inputs, builds options, and maps errors.
//! - Python ids are integral floats; they are parsed into `i64` and
//!   non-integral values are rejected.
//!
//! Conventions
//! -----------
//! - Errors from the core are `IrtError` / `OptError` and become
//!   `ValueError` at the PyO3 boundary.
//! - Item parameters are reported as `(alpha, beta)` tuples.
//!
//! Downstream usage
//! ----------------
//! - Rust code should depend on [`irt::prelude`] and ignore the PyO3 items.
//! - Python code constructs `Irt2PL(...)`, calls `load_responses(data)`,
//!   optionally `set_theta_prior(min, max, count)`, then `solve()`, and
//!   reads `item_params` / `abilities`.

pub mod irt;
pub mod optimization;
pub mod utils;

#[cfg(feature = "python-bindings")]
use std::collections::HashMap;

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    irt::{
        core::{
            options::{EmOptions, GridSpec},
            params::ItemBounds,
        },
        models::em::Irt2plMmle,
    },
    utils::{build_mle_options, extract_response_records},
};

/// Python wrapper around [`Irt2plMmle`] with integer ids.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_irt.irt_models")]
pub struct Irt2PL {
    inner: Irt2plMmle<i64, i64>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl Irt2PL {
    #[new]
    #[pyo3(
        signature = (
            theta_min = -4.0,
            theta_max = 4.0,
            num_theta = 25,
            alpha_bounds = (0.25, 2.0),
            beta_bounds = (-4.0, 4.0),
            jump_prob = 0.2,
            iterations = 5,
            tol = None,
            seed = None,
            parallel = true,
            tol_grad = None,
            tol_cost = None,
            max_iter = None,
            line_searcher = None,
            lbfgs_mem = None,
        ),
        text_signature = "(theta_min=-4.0, theta_max=4.0, num_theta=25, alpha_bounds=(0.25, 2.0), \
                          beta_bounds=(-4.0, 4.0), jump_prob=0.2, iterations=5, tol=None, \
                          seed=None, parallel=True, tol_grad=None, tol_cost=None, \
                          max_iter=None, line_searcher=None, lbfgs_mem=None)"
    )]
    pub fn new(
        theta_min: f64, theta_max: f64, num_theta: usize, alpha_bounds: (f64, f64),
        beta_bounds: (f64, f64), jump_prob: f64, iterations: usize, tol: Option<f64>,
        seed: Option<u64>, parallel: bool, tol_grad: Option<f64>, tol_cost: Option<f64>,
        max_iter: Option<usize>, line_searcher: Option<&str>, lbfgs_mem: Option<usize>,
    ) -> PyResult<Self> {
        let mle_opts = build_mle_options(tol_grad, tol_cost, max_iter, line_searcher, lbfgs_mem)?;
        let options = EmOptions::new(
            GridSpec::new(theta_min, theta_max, num_theta)?,
            ItemBounds::new(alpha_bounds, beta_bounds)?,
            jump_prob,
            iterations,
            tol,
            seed,
            parallel,
            mle_opts,
        )?;
        Ok(Irt2PL { inner: Irt2plMmle::new(options) })
    }

    /// Load an `N × 3` array of `(user, item, answer)` rows.
    pub fn load_responses<'py>(&mut self, raw_data: &Bound<'py, PyAny>) -> PyResult<()> {
        let records = extract_response_records(raw_data)?;
        self.inner.load_responses(records);
        Ok(())
    }

    pub fn set_theta_prior(
        &mut self, theta_min: f64, theta_max: f64, num_theta: usize,
    ) -> PyResult<()> {
        Ok(self.inner.set_theta_prior(theta_min, theta_max, num_theta)?)
    }

    /// Run EM; releases the GIL while solving.
    pub fn solve(&mut self, py: Python<'_>) -> PyResult<()> {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.solve().map(|_| ()))?;
        Ok(())
    }

    #[getter]
    pub fn item_params(&self) -> PyResult<HashMap<i64, (f64, f64)>> {
        let fit = self.inner.results()?;
        Ok(fit.item_params_iter().map(|(&item, p)| (item, (p.alpha, p.beta))).collect())
    }

    #[getter]
    pub fn abilities(&self) -> PyResult<HashMap<i64, f64>> {
        let fit = self.inner.results()?;
        Ok(fit.abilities_iter().map(|(&user, a)| (user, a)).collect())
    }

    /// Per-iteration `(marginal_log_likelihood, max_param_change, restarts)`.
    #[getter]
    pub fn history(&self) -> PyResult<Vec<(f64, f64, usize)>> {
        let fit = self.inner.results()?;
        Ok(fit
            .history
            .iter()
            .map(|h| (h.marginal_log_likelihood, h.max_param_change, h.restarts))
            .collect())
    }
}

#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_irt<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let irt_models_mod = PyModule::new(_py, "irt_models")?;
    irt_models(_py, m, &irt_models_mod)?;

    // Manually add the submodule into sys.modules to allow for dot notation.
    _py.import("sys")?.getattr("modules")?.set_item("rust_irt.irt_models", irt_models_mod)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn irt_models<'py>(
    _py: Python, rust_irt: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_class::<Irt2PL>()?;
    rust_irt.add_submodule(m)?;
    Ok(())
}
