//! Least-squares solution of the global equilibrium system.

use crate::errors::{CalphadError, CalphadResult};
use crate::Verbosity;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Cutoff for singular values relative to the largest one. The value is
/// extremely permissive: the global system is nominally square, and the
/// pseudo-inverse only has to absorb the near-singularity of degenerate
/// phase configurations.
const LSTSQ_RCOND: f64 = 1e-21;

/// Minimum-norm least-squares solve through an SVD pseudo-inverse.
///
/// Rank deficiency is reported at iteration verbosity and otherwise absorbed;
/// it is not an error.
pub(crate) fn solve_least_squares(
    matrix: &Array2<f64>,
    rhs: &Array1<f64>,
    verbosity: Verbosity,
) -> CalphadResult<Array1<f64>> {
    let (rows, cols) = matrix.dim();
    let a = DMatrix::from_row_iterator(rows, cols, matrix.iter().copied());
    let b = DVector::from_iterator(rows, rhs.iter().copied());

    let svd = a.svd(true, true);
    let cutoff = LSTSQ_RCOND * svd.singular_values.max();
    let rank = svd.rank(cutoff);
    if rank < rows.min(cols) {
        log_iter!(
            verbosity,
            "Equilibrium system is rank deficient: rank {} for {} unknowns",
            rank,
            cols
        );
    }
    let x = svd
        .solve(&b, cutoff)
        .map_err(CalphadError::LinearSolveFailed)?;
    Ok(x.iter().copied().collect())
}
