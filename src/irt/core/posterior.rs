//! E-step — posterior ability distributions and expected response counts.
//!
//! Purpose
//! -------
//! Given the current item parameters and ability density, compute for every
//! user the posterior probability of each grid point, then aggregate those
//! posteriors into expected right/wrong counts per (grid point, item).
//!
//! Key behaviors
//! -------------
//! - Per-user log-likelihood on the grid is the sum of 2PL log-probabilities
//!   of that user's responses; the log density is added and the row is
//!   normalized with max-shifted log-sum-exp.
//! - Every posterior row must sum to one within [`POSTERIOR_SUM_TOL`];
//!   otherwise the E-step fails with [`IrtError::ImproperPosterior`].
//! - Expected counts sum posterior rows over each item's right users and
//!   wrong users. Users who never answered an item contribute nothing, so
//!   `right + wrong` at a grid point is generally below the user count.
//!
//! Invariants & assumptions
//! ------------------------
//! - Item parameters and density are read-only snapshots during the E-step;
//!   each user writes only its own row, so rows can be computed in parallel.
//! - Posterior matrix is `U × K`; count matrices are `K × N`.
use crate::{
    irt::{
        core::{
            grid::{AbilityDensity, AbilityGrid},
            index::ResponseIndex,
            likelihood::log_likelihood_2pl,
            params::ItemParam,
            records::ResponseId,
        },
        errors::{IrtError, IrtResult},
    },
    optimization::numerical_stability::log_sum_exp,
};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;

/// Allowed deviation of a posterior row sum from one.
pub const POSTERIOR_SUM_TOL: f64 = 1e-4;

/// Per-user posterior over the ability grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    /// `U × K`, row `i` is user `i`'s posterior.
    pub probs: Array2<f64>,
    /// `ln p(responses_i)` under the current parameters and density.
    pub log_marginals: Array1<f64>,
}

impl Posterior {
    /// Sum of the per-user log marginals.
    pub fn marginal_log_likelihood(&self) -> f64 {
        self.log_marginals.sum()
    }

    /// Expected-a-posteriori ability of every user: `probs · grid`.
    pub fn eap(&self, grid: &AbilityGrid) -> Array1<f64> {
        self.probs.dot(&grid.points())
    }
}

/// Expected right/wrong counts, both `K × N`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedCounts {
    pub right: Array2<f64>,
    pub wrong: Array2<f64>,
}

impl ExpectedCounts {
    pub fn right_column(&self, item: usize) -> ArrayView1<'_, f64> {
        self.right.column(item)
    }

    pub fn wrong_column(&self, item: usize) -> ArrayView1<'_, f64> {
        self.wrong.column(item)
    }

    /// Per-grid-point totals `(r_k, w_k)` over all items.
    pub fn grid_totals(&self) -> (Array1<f64>, Array1<f64>) {
        (self.right.sum_axis(Axis(1)), self.wrong.sum_axis(Axis(1)))
    }
}

/// Log-likelihood of `user`'s responses at each grid point.
pub fn user_log_likelihood<U: ResponseId, I: ResponseId>(
    index: &ResponseIndex<U, I>, user: usize, grid: &AbilityGrid, params: &[ItemParam],
) -> Array1<f64> {
    let mut ll = Array1::<f64>::zeros(grid.len());
    for response in index.user_responses(user) {
        let p = params[response.item];
        for (acc, &theta) in ll.iter_mut().zip(grid.points()) {
            *acc += log_likelihood_2pl(response.tag, theta, p.alpha, p.beta);
        }
    }
    ll
}

/// Posterior row of one user and its log marginal.
///
/// # Errors
/// - [`IrtError::ImproperPosterior`] if the normalized row does not sum to
///   one within [`POSTERIOR_SUM_TOL`] (including NaN sums).
pub fn user_posterior<U: ResponseId, I: ResponseId>(
    index: &ResponseIndex<U, I>, user: usize, grid: &AbilityGrid, density: &AbilityDensity,
    params: &[ItemParam],
) -> IrtResult<(Array1<f64>, f64)> {
    let mut log_joint = user_log_likelihood(index, user, grid, params);
    log_joint.zip_mut_with(&density.values(), |lj, &d| *lj += d.ln());

    let log_marginal = log_sum_exp(log_joint.as_slice().unwrap_or(&[]));
    let row = log_joint.mapv(|lj| (lj - log_marginal).exp());

    let sum = row.sum();
    if !((sum - 1.0).abs() <= POSTERIOR_SUM_TOL) {
        return Err(IrtError::ImproperPosterior {
            user: format!("{:?}", index.users()[user]),
            sum,
        });
    }
    Ok((row, log_marginal))
}

/// E-step: posterior rows for every user.
///
/// # Errors
/// - The first [`IrtError::ImproperPosterior`] encountered.
pub fn compute_posterior<U: ResponseId, I: ResponseId>(
    index: &ResponseIndex<U, I>, grid: &AbilityGrid, density: &AbilityDensity,
    params: &[ItemParam], parallel: bool,
) -> IrtResult<Posterior> {
    let row_of = |user| user_posterior(index, user, grid, density, params);
    let rows: Vec<(Array1<f64>, f64)> = if parallel {
        (0..index.n_users()).into_par_iter().map(row_of).collect::<IrtResult<_>>()?
    } else {
        (0..index.n_users()).map(row_of).collect::<IrtResult<_>>()?
    };

    let mut probs = Array2::zeros((index.n_users(), grid.len()));
    let mut log_marginals = Array1::zeros(index.n_users());
    for (user, (row, log_marginal)) in rows.into_iter().enumerate() {
        probs.row_mut(user).assign(&row);
        log_marginals[user] = log_marginal;
    }
    Ok(Posterior { probs, log_marginals })
}

/// E-step: aggregate posterior rows into expected counts per item.
pub fn expected_counts<U: ResponseId, I: ResponseId>(
    index: &ResponseIndex<U, I>, posterior: &Posterior,
) -> ExpectedCounts {
    let k = posterior.probs.ncols();
    let mut right = Array2::zeros((k, index.n_items()));
    let mut wrong = Array2::zeros((k, index.n_items()));
    for item in 0..index.n_items() {
        let mut col = right.column_mut(item);
        for &user in index.right_users(item) {
            col += &posterior.probs.row(user);
        }
        let mut col = wrong.column_mut(item);
        for &user in index.wrong_users(item) {
            col += &posterior.probs.row(user);
        }
    }
    ExpectedCounts { right, wrong }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irt::core::records::ResponseRecord;
    use approx::assert_relative_eq;

    fn two_by_two() -> ResponseIndex<i64, i64> {
        ResponseIndex::build(vec![
            ResponseRecord::new(1, 1, 1.0),
            ResponseRecord::new(1, 2, 0.0),
            ResponseRecord::new(2, 1, 0.0),
            ResponseRecord::new(2, 2, 1.0),
        ])
    }

    #[test]
    // Purpose
    // -------
    // Ensure every posterior row sums to one under uniform and skewed
    // densities, in serial and parallel mode.
    //
    // Given
    // -----
    // - The 2×2 response set on a 5-point grid.
    // - Uniform density, then a density with a zero entry.
    //
    // Expect
    // ------
    // - Row sums within 1e-4 of one; serial and parallel results agree.
    fn posterior_rows_sum_to_one() {
        let index = two_by_two();
        let grid = AbilityGrid::new(-4.0, 4.0, 5).unwrap();
        let params = vec![ItemParam::new(1.3, 0.5), ItemParam::new(0.6, -1.0)];
        let mut density = AbilityDensity::uniform(&grid);

        for _ in 0..2 {
            let serial = compute_posterior(&index, &grid, &density, &params, false).unwrap();
            let par = compute_posterior(&index, &grid, &density, &params, true).unwrap();
            assert_eq!(serial, par);
            for row in serial.probs.rows() {
                assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-10);
            }
            let right = Array1::from(vec![0.0, 1.0, 2.0, 1.0, 1.0]);
            let wrong = Array1::from(vec![0.0, 1.0, 1.0, 1.0, 0.0]);
            density.update_from_counts(right.view(), wrong.view()).unwrap();
        }
    }

    #[test]
    // Purpose
    // -------
    // Check the posterior against a direct Bayes computation.
    //
    // Given
    // -----
    // - One user answering one item correctly, alpha 1, beta 0.
    // - Uniform density on a 3-point grid (-1, 0, 1).
    //
    // Expect
    // ------
    // - posterior_k ∝ σ(θ_k).
    fn posterior_matches_direct_bayes() {
        let index = ResponseIndex::build(vec![ResponseRecord::new(7, 3, 1.0)]);
        let grid = AbilityGrid::new(-1.0, 1.0, 3).unwrap();
        let density = AbilityDensity::uniform(&grid);

        let post =
            compute_posterior(&index, &grid, &density, &[ItemParam::default()], false).unwrap();

        let raw: Vec<f64> = [-1.0_f64, 0.0, 1.0].iter().map(|t| 1.0 / (1.0 + (-t).exp())).collect();
        let total: f64 = raw.iter().sum();
        for (k, r) in raw.iter().enumerate() {
            assert_relative_eq!(post.probs[[0, k]], r / total, epsilon = 1e-12);
        }
        assert_relative_eq!(post.marginal_log_likelihood(), (total / 3.0).ln(), epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Ensure an all-zero density is reported as an improper posterior.
    //
    // Given
    // -----
    // - A density whose every value is zero after an update with zero
    //   right counts.
    //
    // Expect
    // ------
    // - `IrtError::ImproperPosterior` naming user 1.
    fn zero_density_is_a_consistency_error() {
        let index = two_by_two();
        let grid = AbilityGrid::new(-4.0, 4.0, 5).unwrap();
        let mut density = AbilityDensity::uniform(&grid);
        density
            .update_from_counts(Array1::<f64>::zeros(5).view(), Array1::<f64>::ones(5).view())
            .unwrap();

        let err = compute_posterior(&index, &grid, &density, &[ItemParam::default(); 2], false)
            .unwrap_err();

        assert!(matches!(err, IrtError::ImproperPosterior { ref user, .. } if user == "1"));
    }

    #[test]
    // Purpose
    // -------
    // Verify expected-count aggregation, including an item column with no
    // responses of one kind.
    //
    // Given
    // -----
    // - Users 1 and 2 both answer item 1 correctly; user 2 answers item 2
    //   correctly. Uniform density, default parameters.
    //
    // Expect
    // ------
    // - Right column of item 1 = row(user 1) + row(user 2).
    // - Wrong columns are all zeros.
    fn expected_counts_sum_rows_per_partition() {
        let index = ResponseIndex::build(vec![
            ResponseRecord::new(1, 1, 1.0),
            ResponseRecord::new(2, 1, 1.0),
            ResponseRecord::new(2, 2, 1.0),
        ]);
        let grid = AbilityGrid::new(-2.0, 2.0, 5).unwrap();
        let density = AbilityDensity::uniform(&grid);
        let post =
            compute_posterior(&index, &grid, &density, &[ItemParam::default(); 2], false).unwrap();

        let counts = expected_counts(&index, &post);

        let expect = &post.probs.row(0) + &post.probs.row(1);
        for k in 0..5 {
            assert_relative_eq!(counts.right[[k, 0]], expect[k], epsilon = 1e-14);
            assert_relative_eq!(counts.right[[k, 1]], post.probs[[1, k]], epsilon = 1e-14);
        }
        assert!(counts.wrong.iter().all(|&w| w == 0.0));
        let (r, w) = counts.grid_totals();
        assert_relative_eq!(r.sum(), 3.0, epsilon = 1e-12);
        assert_eq!(w.sum(), 0.0);
    }
}
