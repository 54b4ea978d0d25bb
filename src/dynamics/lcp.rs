//! Linear complementarity solves in standard form:
//! find `z ≥ 0` with `w = Mz + q ≥ 0` and `zᵀw = 0`.

use nalgebra::{DMatrix, DVector};

use crate::{
    config::LcpConfig,
    error::{ResolutionError, Result},
    utils::linalg::{select_square, select_vector},
};

const PIVOT_TOLERANCE: f64 = 1e-12;
const RATIO_TIE: f64 = 1e-12;

/// Fast principal pivoting with a regularized Lemke fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct LcpSolver {
    pub config: LcpConfig,
}

impl LcpSolver {
    pub fn new(config: LcpConfig) -> Self {
        Self { config }
    }

    /// Tries the fast solver first and escalates to the regularized one.
    pub fn solve(&self, m: &DMatrix<f64>, q: &DVector<f64>, problem: &'static str) -> Result<DVector<f64>> {
        if let Some(z) = self.solve_fast(m, q) {
            return Ok(z);
        }
        log::debug!("{problem}: fast solve declined (n = {}), falling back to Lemke", q.len());
        self.solve_regularized(m, q, problem)
    }

    /// Least-index principal pivoting. Declines (`None`) on singular blocks or
    /// when the pivot budget runs out.
    pub fn solve_fast(&self, m: &DMatrix<f64>, q: &DVector<f64>) -> Option<DVector<f64>> {
        let n = q.len();
        if q.iter().all(|&x| x >= 0.0) {
            return Some(DVector::zeros(n));
        }
        let tol = self.tolerance(q);
        let mut basis = vec![false; n];
        let max_pivots = (self.config.fast_pivots_per_variable * n).max(1);

        for _ in 0..max_pivots {
            let active: Vec<usize> = (0..n).filter(|&i| basis[i]).collect();
            let mut z = DVector::zeros(n);
            if !active.is_empty() {
                let lu = select_square(m, &active).full_piv_lu();
                if !lu.is_invertible() {
                    return None;
                }
                let z_b = lu.solve(&-select_vector(q, &active))?;
                if z_b.iter().any(|x| !x.is_finite()) {
                    return None;
                }
                for (k, &i) in active.iter().enumerate() {
                    z[i] = z_b[k];
                }
            }
            let w = m * &z + q;
            let violated = (0..n).find(|&i| if basis[i] { z[i] < -tol } else { w[i] < -tol });
            match violated {
                Some(i) => basis[i] = !basis[i],
                None => {
                    let z = z.map(|x| x.max(0.0));
                    return self.is_solution(m, q, &z).then_some(z);
                }
            }
        }
        None
    }

    /// Lemke's method, retried with growing diagonal regularization
    /// (none, then `10^min_exp`, `10^(min_exp+2)`, … `10^max_exp`).
    pub fn solve_regularized(
        &self,
        m: &DMatrix<f64>,
        q: &DVector<f64>,
        problem: &'static str,
    ) -> Result<DVector<f64>> {
        let n = q.len();
        let max_pivots = (self.config.lemke_pivots_per_variable * n).max(1);

        let mut levels = vec![0.0];
        let mut exp = self.config.min_regularization_exp;
        while exp <= self.config.max_regularization_exp {
            levels.push(10f64.powi(exp));
            exp += 2;
        }

        for lambda in levels {
            let mut regularized = m.clone();
            for i in 0..n {
                regularized[(i, i)] += lambda;
            }
            let Some(z) = lemke(&regularized, q, max_pivots) else {
                continue;
            };
            if self.is_solution(&regularized, q, &z) {
                if lambda > 0.0 {
                    log::warn!("{problem}: Lemke needed regularization {lambda:e} (n = {n})");
                }
                return Ok(z);
            }
        }
        Err(ResolutionError::SolverExhausted { problem, size: n })
    }

    fn tolerance(&self, q: &DVector<f64>) -> f64 {
        self.config.tolerance * (1.0 + q.amax())
    }

    /// Checks feasibility and complementarity of a candidate.
    pub fn is_solution(&self, m: &DMatrix<f64>, q: &DVector<f64>, z: &DVector<f64>) -> bool {
        let tol = self.tolerance(q);
        let w = m * z + q;
        z.iter().all(|&x| x >= -tol)
            && w.iter().all(|&x| x >= -tol)
            && z.dot(&w).abs() <= tol * (q.len().max(1) as f64)
    }
}

fn pivot(tableau: &mut DMatrix<f64>, row: usize, col: usize) {
    let p = tableau[(row, col)];
    for j in 0..tableau.ncols() {
        tableau[(row, j)] /= p;
    }
    let pivot_row = tableau.row(row).into_owned();
    for i in 0..tableau.nrows() {
        if i == row {
            continue;
        }
        let factor = tableau[(i, col)];
        if factor != 0.0 {
            for j in 0..tableau.ncols() {
                tableau[(i, j)] -= factor * pivot_row[j];
            }
        }
    }
}

/// Complementary pivoting on the tableau `[I | -M | -e | q]`.
///
/// Columns `0..n` are `w`, `n..2n` are `z`, `2n` is the artificial `z0`.
fn lemke(m: &DMatrix<f64>, q: &DVector<f64>, max_pivots: usize) -> Option<DVector<f64>> {
    let n = q.len();
    if q.iter().all(|&x| x >= 0.0) {
        return Some(DVector::zeros(n));
    }
    let z0 = 2 * n;
    let rhs = 2 * n + 1;
    let complement = |j: usize| if j < n { j + n } else { j - n };

    let mut tableau = DMatrix::zeros(n, 2 * n + 2);
    for i in 0..n {
        tableau[(i, i)] = 1.0;
        for j in 0..n {
            tableau[(i, n + j)] = -m[(i, j)];
        }
        tableau[(i, z0)] = -1.0;
        tableau[(i, rhs)] = q[i];
    }
    let mut basis: Vec<usize> = (0..n).collect();

    let row = q.imin();
    pivot(&mut tableau, row, z0);
    let mut entering = complement(basis[row]);
    basis[row] = z0;

    for _ in 0..max_pivots {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..n {
            let a = tableau[(i, entering)];
            if a <= PIVOT_TOLERANCE {
                continue;
            }
            let ratio = tableau[(i, rhs)].max(0.0) / a;
            best = match best {
                None => Some((i, ratio)),
                Some((_, r)) if ratio < r - RATIO_TIE => Some((i, ratio)),
                // Prefer letting z0 leave on ties so the path terminates.
                Some((b, r)) if ratio <= r + RATIO_TIE && basis[i] == z0 && basis[b] != z0 => {
                    Some((i, ratio))
                }
                keep => keep,
            };
        }
        let (row, _) = best?;
        pivot(&mut tableau, row, entering);
        let leaving = basis[row];
        basis[row] = entering;

        if leaving == z0 {
            let mut z = DVector::zeros(n);
            for (i, &var) in basis.iter().enumerate() {
                if (n..2 * n).contains(&var) {
                    z[var - n] = tableau[(i, rhs)].max(0.0);
                }
            }
            return Some(z);
        }
        entering = complement(leaving);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interior_solution_of_p_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let q = DVector::from_vec(vec![-5.0, -6.0]);
        let solver = LcpSolver::default();

        let fast = solver.solve_fast(&m, &q).unwrap();
        assert_relative_eq!(fast[0], 4.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(fast[1], 7.0 / 3.0, epsilon = 1e-10);

        let lemke = solver.solve_regularized(&m, &q, "test").unwrap();
        assert_relative_eq!(lemke, fast, epsilon = 1e-10);
    }

    #[test]
    fn nonnegative_q_gives_zero() {
        let m = DMatrix::identity(3, 3);
        let q = DVector::from_vec(vec![0.0, 1.0, 2.0]);
        assert_eq!(LcpSolver::default().solve(&m, &q, "test").unwrap(), DVector::zeros(3));
    }

    #[test]
    fn active_bound_leaves_variable_at_zero() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let q = DVector::from_vec(vec![-2.0, 3.0]);
        let z = LcpSolver::default().solve_regularized(&m, &q, "test").unwrap();
        assert_relative_eq!(z[0], 2.0, epsilon = 1e-12);
        assert_eq!(z[1], 0.0);
    }

    #[test]
    fn singular_psd_problem_is_solved() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let q = DVector::from_vec(vec![-1.0, -1.0]);
        let solver = LcpSolver::default();
        let z = solver.solve(&m, &q, "test").unwrap();
        assert!(solver.is_solution(&m, &q, &z));
        assert_relative_eq!(z[0] + z[1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn infeasible_problem_exhausts_solver() {
        let m = DMatrix::from_row_slice(1, 1, &[-1.0]);
        let q = DVector::from_vec(vec![-1.0]);
        let solver = LcpSolver::default();
        assert!(solver.solve_fast(&m, &q).is_none());
        let err = solver.solve(&m, &q, "test").unwrap_err();
        assert!(matches!(err, ResolutionError::SolverExhausted { size: 1, .. }));
    }
}
