//! LU and SVD decompositions with an explicit fallback path.

use nalgebra::linalg::{LU, SVD};
use nalgebra::{DMatrix, DVector, Dyn};

use crate::error::{MathError, MathResult};

/// Relative pivot size below which an LU factorisation is treated as singular.
pub const LU_PIVOT_TOLERANCE: f64 = 1e-13;

/// Singular values below this fraction of the largest one are treated as zero.
pub const SVD_TOLERANCE: f64 = 1e-12;

/// Matrix decomposition used to solve linear systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecompositionMethod {
    /// LU with partial pivoting. Fast; fails on singular matrices.
    #[default]
    Lu,
    /// Singular value decomposition. Minimum-norm solution on singular matrices.
    Svd,
}

impl std::fmt::Display for DecompositionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecompositionMethod::Lu => write!(f, "LU"),
            DecompositionMethod::Svd => write!(f, "SVD"),
        }
    }
}

#[derive(Debug, Clone)]
enum Factors {
    Lu(LU<f64, Dyn, Dyn>),
    Svd { svd: SVD<f64, Dyn, Dyn>, cutoff: f64 },
}

/// A factorised square matrix, ready to solve systems.
#[derive(Debug, Clone)]
pub struct DecompositionResult {
    size: usize,
    factors: Factors,
}

/// Outcome of [`solve_with_fallback`]: the solution and the method that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSolve {
    /// Solution vector.
    pub solution: DVector<f64>,
    /// Decomposition that was actually used.
    pub method_used: DecompositionMethod,
}

/// Factorises a square matrix.
///
/// # Errors
///
/// - [`MathError::InvalidInput`] for non-square or empty matrices
/// - [`MathError::NumericalFailure`] for non-finite entries or an all-zero matrix (SVD)
/// - [`MathError::SingularMatrix`] when LU meets a vanishing pivot
pub fn decompose(
    matrix: &DMatrix<f64>,
    method: DecompositionMethod,
) -> MathResult<DecompositionResult> {
    let (rows, cols) = matrix.shape();
    if rows != cols {
        return Err(MathError::invalid_input(format!(
            "decomposition needs a square matrix, got {rows}x{cols}"
        )));
    }
    if rows == 0 {
        return Err(MathError::invalid_input("cannot decompose an empty matrix"));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(MathError::numerical_failure("matrix has non-finite entries"));
    }

    let factors = match method {
        DecompositionMethod::Lu => {
            let lu = matrix.clone().lu();
            let pivots = lu.u().diagonal().map(f64::abs);
            let largest = pivots.max();
            if largest == 0.0 || pivots.min() <= LU_PIVOT_TOLERANCE * largest {
                return Err(MathError::SingularMatrix);
            }
            Factors::Lu(lu)
        }
        DecompositionMethod::Svd => {
            let svd = matrix.clone().svd(true, true);
            let largest = svd.singular_values.max();
            if largest == 0.0 || !largest.is_finite() {
                return Err(MathError::numerical_failure(
                    "SVD of a zero matrix has no usable singular values",
                ));
            }
            Factors::Svd {
                svd,
                cutoff: SVD_TOLERANCE * largest,
            }
        }
    };

    Ok(DecompositionResult {
        size: rows,
        factors,
    })
}

impl DecompositionResult {
    /// Method used to build this factorisation.
    pub fn method(&self) -> DecompositionMethod {
        match self.factors {
            Factors::Lu(_) => DecompositionMethod::Lu,
            Factors::Svd { .. } => DecompositionMethod::Svd,
        }
    }

    /// Dimension of the factorised matrix.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Solves `A x = rhs`.
    pub fn solve(&self, rhs: &DVector<f64>) -> MathResult<DVector<f64>> {
        if rhs.len() != self.size {
            return Err(MathError::vector_mismatch(self.size, self.size, rhs.len()));
        }
        let solution = match &self.factors {
            Factors::Lu(lu) => lu.solve(rhs).ok_or(MathError::SingularMatrix)?,
            Factors::Svd { svd, cutoff } => svd
                .solve(rhs, *cutoff)
                .map_err(MathError::numerical_failure)?,
        };
        check_finite(solution)
    }

    /// Solves `A X = rhs` for a matrix right-hand side.
    pub fn solve_matrix(&self, rhs: &DMatrix<f64>) -> MathResult<DMatrix<f64>> {
        if rhs.nrows() != self.size {
            return Err(MathError::DimensionMismatch {
                rows1: self.size,
                cols1: self.size,
                rows2: rhs.nrows(),
                cols2: rhs.ncols(),
            });
        }
        let solution = match &self.factors {
            Factors::Lu(lu) => lu.solve(rhs).ok_or(MathError::SingularMatrix)?,
            Factors::Svd { svd, cutoff } => svd
                .solve(rhs, *cutoff)
                .map_err(MathError::numerical_failure)?,
        };
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(MathError::numerical_failure("solution has non-finite entries"));
        }
        Ok(solution)
    }

    /// Inverse (LU) or Moore-Penrose pseudo-inverse (SVD).
    pub fn inverse(&self) -> MathResult<DMatrix<f64>> {
        match &self.factors {
            Factors::Lu(lu) => lu.try_inverse().ok_or(MathError::SingularMatrix),
            Factors::Svd { svd, cutoff } => svd
                .clone()
                .pseudo_inverse(*cutoff)
                .map_err(MathError::numerical_failure),
        }
    }
}

fn check_finite(solution: DVector<f64>) -> MathResult<DVector<f64>> {
    if solution.iter().any(|v| !v.is_finite()) {
        Err(MathError::numerical_failure("solution has non-finite entries"))
    } else {
        Ok(solution)
    }
}

/// Solves `A x = rhs`, retrying with SVD when LU reports a singular matrix.
///
/// With `fallback` disabled, or when `method` is already SVD, the first
/// failure is returned as is.
pub fn solve_with_fallback(
    matrix: &DMatrix<f64>,
    rhs: &DVector<f64>,
    method: DecompositionMethod,
    fallback: bool,
) -> MathResult<LinearSolve> {
    match decompose(matrix, method).and_then(|d| d.solve(rhs)) {
        Ok(solution) => Ok(LinearSolve {
            solution,
            method_used: method,
        }),
        Err(MathError::SingularMatrix) if fallback && method == DecompositionMethod::Lu => {
            log::warn!("LU reported a singular matrix, retrying with SVD");
            let solution = decompose(matrix, DecompositionMethod::Svd)?.solve(rhs)?;
            Ok(LinearSolve {
                solution,
                method_used: DecompositionMethod::Svd,
            })
        }
        Err(e) => Err(e),
    }
}
