//! Finite-difference derivatives and Jacobians.
//!
//! [`Differentiator`] turns a vector function into a Jacobian function by
//! bumping one coordinate at a time. It is used by the vector root finders
//! whenever no analytic Jacobian is supplied.
//!
//! The bump for coordinate `i` is `max(relative_step * |x_i|, min_step)`,
//! so coordinates near zero still get a usable step.

use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};

/// Default relative bump size.
pub const DEFAULT_RELATIVE_STEP: f64 = 1e-6;

/// Default minimum absolute bump size.
pub const DEFAULT_MIN_STEP: f64 = 1e-6;

/// Difference scheme used by a [`Differentiator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FiniteDifferenceScheme {
    /// `(f(x + h) - f(x)) / h`
    Forward,
    /// `(f(x + h) - f(x - h)) / 2h`
    #[default]
    Central,
    /// `(f(x) - f(x - h)) / h`
    Backward,
}

/// Finite-difference differentiator.
///
/// # Example
///
/// ```rust
/// use curvefit_math::differentiation::Differentiator;
/// use curvefit_math::MathError;
/// use nalgebra::DVector;
///
/// let f = |x: &DVector<f64>| -> Result<DVector<f64>, MathError> {
///     Ok(DVector::from_vec(vec![x[0] * x[1], x[0] + x[1]]))
/// };
///
/// let jacobian = Differentiator::default()
///     .jacobian(&f, &DVector::from_vec(vec![2.0, 3.0]))
///     .unwrap();
/// assert!((jacobian[(0, 0)] - 3.0).abs() < 1e-8);
/// assert!((jacobian[(0, 1)] - 2.0).abs() < 1e-8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Differentiator {
    /// Difference scheme.
    pub scheme: FiniteDifferenceScheme,
    /// Bump as a fraction of `|x_i|`.
    pub relative_step: f64,
    /// Lower bound on the bump.
    pub min_step: f64,
}

impl Default for Differentiator {
    fn default() -> Self {
        Self {
            scheme: FiniteDifferenceScheme::Central,
            relative_step: DEFAULT_RELATIVE_STEP,
            min_step: DEFAULT_MIN_STEP,
        }
    }
}

impl Differentiator {
    /// Creates a differentiator with the given scheme and default steps.
    #[must_use]
    pub fn new(scheme: FiniteDifferenceScheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }

    /// Sets the relative step.
    #[must_use]
    pub fn with_relative_step(mut self, relative_step: f64) -> Self {
        self.relative_step = relative_step;
        self
    }

    /// Sets the minimum absolute step.
    #[must_use]
    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = min_step;
        self
    }

    /// Bump size for a coordinate with value `x`.
    pub fn step(&self, x: f64) -> f64 {
        (self.relative_step * x.abs()).max(self.min_step)
    }

    /// Derivative of a scalar function at `x`.
    pub fn derivative<F>(&self, f: F, x: f64) -> MathResult<f64>
    where
        F: Fn(f64) -> f64,
    {
        let h = self.step(x);
        let d = match self.scheme {
            FiniteDifferenceScheme::Forward => (f(x + h) - f(x)) / h,
            FiniteDifferenceScheme::Central => (f(x + h) - f(x - h)) / (2.0 * h),
            FiniteDifferenceScheme::Backward => (f(x) - f(x - h)) / h,
        };
        if d.is_finite() {
            Ok(d)
        } else {
            Err(MathError::numerical_failure(format!(
                "finite difference at x = {x} is not finite"
            )))
        }
    }

    /// Jacobian of `f` at `x`; column `i` holds the derivatives with respect to `x_i`.
    ///
    /// The function may return a vector of any length `m`; the result is `m x n`.
    pub fn jacobian<F, E>(&self, f: F, x: &DVector<f64>) -> Result<DMatrix<f64>, E>
    where
        F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
        E: From<MathError>,
    {
        let n = x.len();
        if n == 0 {
            return Err(MathError::invalid_input("cannot differentiate at an empty point").into());
        }

        // One-sided schemes share the unbumped value across columns.
        let base = match self.scheme {
            FiniteDifferenceScheme::Central => None,
            FiniteDifferenceScheme::Forward | FiniteDifferenceScheme::Backward => Some(f(x)?),
        };

        let mut jacobian: Option<DMatrix<f64>> = None;
        let mut bumped = x.clone();

        for i in 0..n {
            let h = self.step(x[i]);
            let (upper, lower, width) = match (self.scheme, &base) {
                (FiniteDifferenceScheme::Forward, Some(f0)) => {
                    bumped[i] = x[i] + h;
                    (f(&bumped)?, f0.clone(), h)
                }
                (FiniteDifferenceScheme::Backward, Some(f0)) => {
                    bumped[i] = x[i] - h;
                    (f0.clone(), f(&bumped)?, h)
                }
                _ => {
                    bumped[i] = x[i] + h;
                    let up = f(&bumped)?;
                    bumped[i] = x[i] - h;
                    (up, f(&bumped)?, 2.0 * h)
                }
            };
            bumped[i] = x[i];

            if upper.len() != lower.len() {
                return Err(MathError::vector_mismatch(upper.len(), 1, lower.len()).into());
            }
            let column = (upper - lower) / width;

            if column.iter().any(|v| !v.is_finite()) {
                return Err(MathError::numerical_failure(format!(
                    "finite-difference column {i} is not finite"
                ))
                .into());
            }

            let matrix = jacobian.get_or_insert_with(|| DMatrix::zeros(column.len(), n));
            if matrix.nrows() != column.len() {
                return Err(MathError::vector_mismatch(matrix.nrows(), n, column.len()).into());
            }
            matrix.set_column(i, &column);
        }

        Ok(jacobian.unwrap_or_else(|| DMatrix::zeros(0, n)))
    }

    /// Turns `f` into a Jacobian function.
    pub fn differentiate<F, E>(self, f: F) -> impl Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>
    where
        F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
        E: From<MathError>,
    {
        move |x: &DVector<f64>| self.jacobian(&f, x)
    }
}
