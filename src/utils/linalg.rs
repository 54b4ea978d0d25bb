//! Dense linear algebra helpers over `nalgebra` used by the assembler and solvers.

use nalgebra::{DMatrix, DVector, SVD};

/// Singular values below this (relative to the largest) are treated as zero.
const SVD_RELATIVE_TOLERANCE: f64 = 1e-10;

/// Least-squares solver for a possibly rank deficient square system.
///
/// Factors once through a singular value decomposition and then solves any
/// number of right-hand sides with the pseudo-inverse.
pub struct LeastSquares {
    svd: SVD<f64, nalgebra::Dyn, nalgebra::Dyn>,
    tolerance: f64,
}

impl LeastSquares {
    pub fn new(matrix: DMatrix<f64>) -> Self {
        let svd = matrix.svd(true, true);
        let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
        Self {
            svd,
            tolerance: (largest * SVD_RELATIVE_TOLERANCE).max(f64::MIN_POSITIVE),
        }
    }

    /// Numerical rank of the factored matrix.
    pub fn rank(&self) -> usize {
        self.svd.rank(self.tolerance)
    }

    pub fn solve_vector(&self, rhs: &DVector<f64>) -> DVector<f64> {
        self.svd
            .solve(rhs, self.tolerance)
            .unwrap_or_else(|_| DVector::zeros(self.svd.singular_values.len()))
    }

    pub fn solve_matrix(&self, rhs: &DMatrix<f64>) -> DMatrix<f64> {
        self.svd
            .solve(rhs, self.tolerance)
            .unwrap_or_else(|_| DMatrix::zeros(self.svd.singular_values.len(), rhs.ncols()))
    }
}

/// Largest absolute asymmetry `|m_ij - m_ji|` of a square matrix.
pub fn asymmetry(matrix: &DMatrix<f64>) -> f64 {
    let n = matrix.nrows().min(matrix.ncols());
    let mut worst = 0.0_f64;
    for i in 0..n {
        for j in (i + 1)..n {
            worst = worst.max((matrix[(i, j)] - matrix[(j, i)]).abs());
        }
    }
    worst
}

/// Copies the upper triangle of a square matrix onto its lower triangle.
pub fn mirror_upper(matrix: &mut DMatrix<f64>) {
    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            matrix[(j, i)] = matrix[(i, j)];
        }
    }
}

/// Selects rows and columns of a square matrix by index.
pub fn select_square(matrix: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(indices.len(), indices.len(), |r, c| {
        matrix[(indices[r], indices[c])]
    })
}

/// Selects `rows × cols` from a matrix by index lists.
pub fn select(matrix: &DMatrix<f64>, rows: &[usize], cols: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), cols.len(), |r, c| matrix[(rows[r], cols[c])])
}

/// Selects entries of a vector by index.
pub fn select_vector(vector: &DVector<f64>, indices: &[usize]) -> DVector<f64> {
    DVector::from_fn(indices.len(), |r, _| vector[indices[r]])
}
