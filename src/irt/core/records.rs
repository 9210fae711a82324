//! Response records — the raw `(user, item, answer)` triples fed to the
//! estimator, plus parsers from numeric rows.
//!
//! Answers are binary-valued tags compared against `1.0` with an absolute
//! tolerance of [`ANSWER_TOL`]; anything else counts as incorrect. Ids are
//! generic: any `Clone + Eq + Hash + Debug + Send + Sync` type works, so
//! string ids and integer ids go through the same engine.
use crate::irt::errors::{IrtError, IrtResult};
use ndarray::ArrayView2;
use std::{fmt::Debug, hash::Hash};

/// Absolute tolerance used to classify an answer tag as correct.
pub const ANSWER_TOL: f64 = 1e-3;

/// Bounds required of user and item identifiers.
///
/// Blanket-implemented; never implement it by hand.
pub trait ResponseId: Clone + Eq + Hash + Debug + Send + Sync {}

impl<T: Clone + Eq + Hash + Debug + Send + Sync> ResponseId for T {}

/// `true` when `tag` is within [`ANSWER_TOL`] of `1.0`.
#[inline]
pub fn is_correct(tag: f64) -> bool {
    (tag - 1.0).abs() < ANSWER_TOL
}

/// One observed response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord<U, I> {
    pub user: U,
    pub item: I,
    pub tag: f64,
}

impl<U, I> ResponseRecord<U, I> {
    pub fn new(user: U, item: I, tag: f64) -> Self {
        Self { user, item, tag }
    }

    pub fn is_correct(&self) -> bool {
        is_correct(self.tag)
    }
}

impl ResponseRecord<i64, i64> {
    /// Parse a numeric row `(user, item, answer, ..)`.
    ///
    /// Fields past the third are ignored. `index` is only used for error
    /// reporting.
    ///
    /// # Errors
    /// - [`IrtError::MalformedRecord`] if the row has fewer than three fields.
    /// - [`IrtError::NonIntegralId`] if a user or item id is non-finite or
    ///   has a fractional part.
    pub fn from_row(index: usize, row: &[f64]) -> IrtResult<Self> {
        match row {
            [user, item, tag, ..] => Ok(Self {
                user: integral_id(index, "user", *user)?,
                item: integral_id(index, "item", *item)?,
                tag: *tag,
            }),
            _ => Err(IrtError::MalformedRecord { index, fields: row.len() }),
        }
    }
}

/// Parse every row of an `N × C` matrix (`C >= 3`) into records.
///
/// # Errors
/// - [`IrtError::MalformedRecord`] (reported for row 0) if `C < 3` and the
///   matrix is non-empty.
/// - Any error from [`ResponseRecord::from_row`].
pub fn records_from_matrix(rows: ArrayView2<'_, f64>) -> IrtResult<Vec<ResponseRecord<i64, i64>>> {
    rows.outer_iter()
        .enumerate()
        .map(|(index, row)| {
            let fields = [row.get(0), row.get(1), row.get(2)];
            match fields {
                [Some(&user), Some(&item), Some(&tag)] => {
                    ResponseRecord::from_row(index, &[user, item, tag])
                }
                _ => Err(IrtError::MalformedRecord { index, fields: row.len() }),
            }
        })
        .collect()
}

/// Parse a row-major buffer of `rows` records, `cols` values each.
///
/// Used at array boundaries where the caller's matrix type is not this
/// crate's `ndarray`. A buffer shorter than `rows × cols` yields truncated
/// rows, which fail as malformed.
///
/// # Errors
/// - Any error from [`ResponseRecord::from_row`].
pub fn records_from_row_major(
    rows: usize, cols: usize, values: &[f64],
) -> IrtResult<Vec<ResponseRecord<i64, i64>>> {
    (0..rows)
        .map(|index| {
            let start = (index * cols).min(values.len());
            let end = (start + cols).min(values.len());
            ResponseRecord::from_row(index, &values[start..end])
        })
        .collect()
}

fn integral_id(index: usize, field: &'static str, value: f64) -> IrtResult<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(IrtError::NonIntegralId { index, field, value });
    }
    Ok(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Verify the 0.001 tolerance rule for answer tags.
    //
    // Given
    // -----
    // - Tags 1.0, 0.9995, 0.998, 0.0, and 2.0.
    //
    // Expect
    // ------
    // - Only 1.0 and 0.9995 are correct.
    fn answer_tolerance_rule() {
        assert!(is_correct(1.0));
        assert!(is_correct(0.9995));
        assert!(!is_correct(0.998));
        assert!(!is_correct(0.0));
        assert!(!is_correct(2.0));
    }

    #[test]
    // Purpose
    // -------
    // Parse well-formed rows and reject short or fractional ones.
    //
    // Given
    // -----
    // - `[3, 7, 1, 99]`, `[3, 7]`, and `[3.5, 7, 1]`.
    //
    // Expect
    // ------
    // - First parses to (3, 7, 1.0) with the extra field ignored.
    // - Second is `MalformedRecord { fields: 2 }`.
    // - Third is `NonIntegralId` on the user field.
    fn from_row_parses_and_rejects() {
        let rec = ResponseRecord::from_row(0, &[3.0, 7.0, 1.0, 99.0]).unwrap();
        assert_eq!(rec, ResponseRecord::new(3, 7, 1.0));

        let short = ResponseRecord::from_row(4, &[3.0, 7.0]);
        assert_eq!(short, Err(IrtError::MalformedRecord { index: 4, fields: 2 }));

        let frac = ResponseRecord::from_row(1, &[3.5, 7.0, 1.0]);
        assert!(matches!(frac, Err(IrtError::NonIntegralId { index: 1, field: "user", .. })));
    }

    #[test]
    // Purpose
    // -------
    // Ensure matrix parsing reports narrow matrices as malformed.
    //
    // Given
    // -----
    // - A 2 × 3 matrix and a 1 × 2 matrix.
    //
    // Expect
    // ------
    // - Two records from the first, `MalformedRecord` from the second.
    fn records_from_matrix_checks_width() {
        let ok = records_from_matrix(array![[1.0, 1.0, 1.0], [2.0, 1.0, 0.0]].view()).unwrap();
        assert_eq!(ok.len(), 2);
        assert!(!ok[1].is_correct());

        let narrow = records_from_matrix(array![[1.0, 1.0]].view());
        assert_eq!(narrow, Err(IrtError::MalformedRecord { index: 0, fields: 2 }));
    }

    #[test]
    // Purpose
    // -------
    // Check row-major parsing agrees with matrix parsing and reports narrow
    // or truncated buffers by row.
    //
    // Given
    // -----
    // - A 2 × 3 buffer, a 1 × 2 buffer, and a 2 × 3 shape over 4 values.
    //
    // Expect
    // ------
    // - Same records as `records_from_matrix` for the first.
    // - `MalformedRecord` at row 0 with 2 fields for the second.
    // - `MalformedRecord` at row 1 with 1 field for the third.
    fn records_from_row_major_matches_matrix_parsing() {
        let values = [1.0, 1.0, 1.0, 2.0, 1.0, 0.0];
        let flat = records_from_row_major(2, 3, &values).unwrap();
        let matrix = records_from_matrix(array![[1.0, 1.0, 1.0], [2.0, 1.0, 0.0]].view()).unwrap();
        assert_eq!(flat, matrix);

        assert_eq!(
            records_from_row_major(1, 2, &[1.0, 1.0]),
            Err(IrtError::MalformedRecord { index: 0, fields: 2 })
        );
        assert_eq!(
            records_from_row_major(2, 3, &[1.0, 1.0, 1.0, 2.0]),
            Err(IrtError::MalformedRecord { index: 1, fields: 1 })
        );
    }
}
