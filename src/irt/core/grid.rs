//! Ability grid and density — the discretized ability scale and the
//! empirical prior carried over it between EM iterations.
//!
//! Purpose
//! -------
//! Provide the fixed quadrature points `θ_0 < … < θ_{K-1}` and the length-K
//! density vector that plays the role of the prior in the E-step.
//!
//! Key behaviors
//! -------------
//! - [`AbilityGrid::new`] produces `count` evenly spaced points from `min` to
//!   `max` inclusive and fails if the produced length is not `count`.
//! - [`AbilityDensity::uniform`] starts at `1/K` everywhere.
//! - [`AbilityDensity::update_from_counts`] sets `d_k = r_k / (r_k + w_k)`
//!   and keeps the previous `d_k` where the ratio is undefined.
//!
//! Invariants & assumptions
//! ------------------------
//! - The grid never changes after construction.
//! - The density is non-negative but need not sum to one; the E-step
//!   normalizes posteriors itself.
use crate::irt::{
    core::options::GridSpec,
    errors::{IrtError, IrtResult},
};
use ndarray::{Array1, ArrayView1};

/// Fixed, strictly increasing ability quadrature points.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityGrid {
    points: Array1<f64>,
}

impl AbilityGrid {
    /// Build `count` evenly spaced points on `[min, max]`.
    ///
    /// A single point sits at `min`.
    ///
    /// # Errors
    /// - [`IrtError::InvalidGridSpec`] for non-finite bounds, `count == 0`, or
    ///   `min >= max` with more than one point.
    /// - [`IrtError::GridLengthMismatch`] if the produced sequence does not
    ///   have exactly `count` points.
    pub fn new(min: f64, max: f64, count: usize) -> IrtResult<Self> {
        GridSpec::new(min, max, count)?.build()
    }

    pub(crate) fn from_spec(spec: &GridSpec) -> IrtResult<Self> {
        let points = if spec.count == 1 {
            Array1::from_elem(1, spec.min)
        } else {
            Array1::linspace(spec.min, spec.max, spec.count)
        };
        if points.len() != spec.count {
            return Err(IrtError::GridLengthMismatch {
                expected: spec.count,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> ArrayView1<'_, f64> {
        self.points.view()
    }

    pub fn as_slice(&self) -> &[f64] {
        self.points.as_slice().unwrap_or(&[])
    }
}

/// Unnormalized density over the ability grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityDensity {
    values: Array1<f64>,
}

impl AbilityDensity {
    /// `1/K` at each of the `K` grid points.
    pub fn uniform(grid: &AbilityGrid) -> Self {
        let k = grid.len();
        Self { values: Array1::from_elem(k, 1.0 / k as f64) }
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Re-estimate from per-grid-point totals of expected right and wrong
    /// counts.
    ///
    /// Where `r_k + w_k` is zero or non-finite the previous value is kept.
    /// Returns the grid indices that were kept this way.
    ///
    /// # Errors
    /// - [`IrtError::DensityLengthMismatch`] if `right` or `wrong` differ in
    ///   length from the density. The density is left untouched.
    pub fn update_from_counts(
        &mut self, right: ArrayView1<'_, f64>, wrong: ArrayView1<'_, f64>,
    ) -> IrtResult<Vec<usize>> {
        let expected = self.values.len();
        for (which, len) in [("right", right.len()), ("wrong", wrong.len())] {
            if len != expected {
                let actual = len;
                return Err(IrtError::DensityLengthMismatch { which, expected, actual });
            }
        }
        let mut retained = Vec::new();
        for (k, value) in self.values.iter_mut().enumerate() {
            let total = right[k] + wrong[k];
            if total > 0.0 && total.is_finite() {
                *value = right[k] / total;
            } else {
                retained.push(k);
            }
        }
        Ok(retained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Verify the default grid is strictly increasing with exact endpoints.
    //
    // Given
    // -----
    // - `AbilityGrid::new(-4, 4, 25)`.
    //
    // Expect
    // ------
    // - 25 points, first -4, last 4, strictly increasing.
    fn default_grid_is_monotone_with_exact_endpoints() {
        let grid = AbilityGrid::new(-4.0, 4.0, 25).unwrap();
        let pts = grid.as_slice();

        assert_eq!(pts.len(), 25);
        assert_relative_eq!(pts[0], -4.0);
        assert_relative_eq!(pts[24], 4.0);
        assert!(pts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    // Purpose
    // -------
    // Ensure invalid grid specs are rejected.
    //
    // Given
    // -----
    // - count = 0; min = max with count 3; NaN bound.
    //
    // Expect
    // ------
    // - `InvalidGridSpec` in every case.
    fn invalid_grid_specs_are_rejected() {
        for (min, max, count) in [(-4.0, 4.0, 0), (1.0, 1.0, 3), (f64::NAN, 4.0, 5)] {
            assert!(matches!(
                AbilityGrid::new(min, max, count),
                Err(IrtError::InvalidGridSpec { .. })
            ));
        }
    }

    #[test]
    // Purpose
    // -------
    // Check the uniform initialization.
    //
    // Given
    // -----
    // - A 5-point grid.
    //
    // Expect
    // ------
    // - Every value equals 0.2.
    fn density_starts_uniform() {
        let grid = AbilityGrid::new(-4.0, 4.0, 5).unwrap();

        let density = AbilityDensity::uniform(&grid);

        assert!(density.values().iter().all(|&d| (d - 0.2).abs() < 1e-15));
    }

    #[test]
    // Purpose
    // -------
    // Verify the r/(r+w) update and the 0/0 retention policy.
    //
    // Given
    // -----
    // - Uniform density on 3 points.
    // - right = [1, 0, 3], wrong = [1, 0, 1].
    //
    // Expect
    // ------
    // - Density [0.5, 1/3 (kept), 0.75].
    // - Retained indices = [1].
    fn density_update_keeps_previous_value_on_zero_information() {
        let grid = AbilityGrid::new(-1.0, 1.0, 3).unwrap();
        let mut density = AbilityDensity::uniform(&grid);

        let right = array![1.0, 0.0, 3.0];
        let wrong = array![1.0, 0.0, 1.0];

        let retained = density.update_from_counts(right.view(), wrong.view()).unwrap();

        assert_eq!(retained, vec![1]);
        assert_relative_eq!(density.values()[0], 0.5);
        assert_relative_eq!(density.values()[1], 1.0 / 3.0);
        assert_relative_eq!(density.values()[2], 0.75);
    }

    #[test]
    // Purpose
    // -------
    // Ensure count vectors of the wrong length are reported, not panicked on.
    //
    // Given
    // -----
    // - Uniform density on 3 points.
    // - A 2-long right vector, then a 4-long wrong vector.
    //
    // Expect
    // ------
    // - `DensityLengthMismatch` naming the offending side and its length.
    // - The density is unchanged.
    fn density_update_rejects_mismatched_lengths() {
        let grid = AbilityGrid::new(-1.0, 1.0, 3).unwrap();
        let mut density = AbilityDensity::uniform(&grid);
        let before = density.clone();

        let short = array![1.0, 1.0];
        let ok = array![1.0, 1.0, 1.0];
        let long = array![1.0, 1.0, 1.0, 1.0];

        assert_eq!(
            density.update_from_counts(short.view(), ok.view()),
            Err(IrtError::DensityLengthMismatch { which: "right", expected: 3, actual: 2 })
        );
        assert_eq!(
            density.update_from_counts(ok.view(), long.view()),
            Err(IrtError::DensityLengthMismatch { which: "wrong", expected: 3, actual: 4 })
        );
        assert_eq!(density, before);
    }
}
