//! Linear algebra utilities.

use crate::errors::{RadTransError, RadTransResult};
use nalgebra as na;
use ndarray::{Array1, Array2};

/// Solve the dense system Ax = b by LU decomposition with partial pivoting.
///
/// Rate-equation matrices span many orders of magnitude, so the pivoting of
/// the decomposition is needed to keep the solution accurate.
///
/// # Arguments
/// * `a` - Square coefficient matrix (n x n)
/// * `b` - Right-hand side vector (length n)
///
/// # Errors
/// Returns an error if the shapes are inconsistent or the matrix is singular.
///
/// # Example
/// ```
/// use radtrans_core::utils::linear_algebra::solve_dense;
/// use ndarray::array;
///
/// let a = array![[2.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 2.0]];
/// let b = array![1.0, 0.0, 1.0];
///
/// let x = solve_dense(&a, &b).unwrap();
/// assert!((x[0] - 1.0).abs() < 1e-10);
/// assert!((x[1] - 1.0).abs() < 1e-10);
/// assert!((x[2] - 1.0).abs() < 1e-10);
/// ```
pub fn solve_dense(a: &Array2<f64>, b: &Array1<f64>) -> RadTransResult<Array1<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(RadTransError::Error(format!(
            "cannot solve a {}x{} system with a right-hand side of length {}",
            a.nrows(),
            a.ncols(),
            n
        )));
    }

    let matrix = na::DMatrix::from_fn(n, n, |row, col| a[[row, col]]);
    let rhs = na::DVector::from_iterator(n, b.iter().copied());
    let solution = matrix
        .lu()
        .solve(&rhs)
        .filter(|x| x.iter().all(|v| v.is_finite()))
        .ok_or_else(|| RadTransError::Error("singular matrix".to_string()))?;

    Ok(solution.iter().copied().collect())
}
