//! Python-side input helpers for the bindings in `lib.rs`.
//!
//! Responses arrive as an `N × 3` float array (numpy array, pandas
//! DataFrame, or nested sequence) of `(user, item, answer)` rows; optimizer
//! settings arrive as optional scalars.
#[cfg(feature = "python-bindings")]
use numpy::PyReadonlyArray2;

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    irt::{
        core::records::{ResponseRecord, records_from_row_major},
        errors::IrtResult,
    },
    optimization::loglik_optimizer::{LineSearcher, MLEOptions, Tolerances},
};

/// Extract `(user, item, answer)` records from a Python object.
///
/// Accepts, in order: a 2-D float64 numpy array, any object with a
/// `to_numpy()` method returning one, or a sequence of float sequences.
/// Ragged sequences are parsed row by row so short rows are reported with
/// their index.
#[cfg(feature = "python-bindings")]
pub fn extract_response_records<'py>(
    raw_data: &Bound<'py, PyAny>,
) -> PyResult<Vec<ResponseRecord<i64, i64>>> {
    if let Ok(arr) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return records_from_numpy(&arr);
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(arr) = obj.extract::<PyReadonlyArray2<f64>>() {
            return records_from_numpy(&arr);
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err(
            "expected a 2-D numpy.ndarray, pandas.DataFrame, or sequence of (user, item, answer) rows",
        )
    })?;
    let records = rows
        .iter()
        .enumerate()
        .map(|(index, row)| ResponseRecord::from_row(index, row))
        .collect::<IrtResult<Vec<_>>>()?;
    Ok(records)
}

/// Parse a numpy matrix through a row-major copy, so numpy's own `ndarray`
/// version never meets this crate's.
#[cfg(feature = "python-bindings")]
fn records_from_numpy(arr: &PyReadonlyArray2<'_, f64>) -> PyResult<Vec<ResponseRecord<i64, i64>>> {
    let view = arr.as_array();
    let (rows, cols) = view.dim();
    let values: Vec<f64> = view.iter().copied().collect();
    Ok(records_from_row_major(rows, cols, &values)?)
}

/// Build item-optimizer options, falling back to the defaults for every
/// argument left as `None`.
#[cfg(feature = "python-bindings")]
pub fn build_mle_options(
    tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    line_searcher: Option<&str>, lbfgs_mem: Option<usize>,
) -> PyResult<MLEOptions> {
    let defaults = MLEOptions::default();
    let tols = Tolerances::new(
        tol_grad.or(defaults.tols.tol_grad),
        tol_cost.or(defaults.tols.tol_cost),
        max_iter.or(defaults.tols.max_iter),
    )?;
    let line_searcher = match line_searcher {
        Some(name) => name.parse::<LineSearcher>()?,
        None => defaults.line_searcher,
    };
    Ok(MLEOptions::new(tols, line_searcher, lbfgs_mem)?)
}
