//! Natural cubic spline interpolation.

use crate::error::{MathError, MathResult};
use crate::interpolation::{find_segment, validate_nodes, Interpolator};
use crate::linear_algebra::solve_tridiagonal;

/// Natural cubic spline interpolation.
///
/// Piecewise cubic with continuous first and second derivatives and zero
/// second derivative at both ends.
///
/// The second derivatives depend linearly on the node values. The spline
/// keeps the second derivatives of each unit node vector so that node
/// sensitivities cost one segment evaluation per node.
///
/// # Example
///
/// ```rust
/// use curvefit_math::interpolation::{CubicSpline, Interpolator};
///
/// let spline = CubicSpline::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 4.0, 9.0]).unwrap();
/// let y = spline.interpolate(1.5).unwrap();
/// assert!(y > 1.0 && y < 4.0);
/// ```
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot
    y2s: Vec<f64>,
    /// `basis[j]`: second derivatives of the spline through the unit vector `e_j`
    basis: Vec<Vec<f64>>,
    allow_extrapolation: bool,
}

impl CubicSpline {
    /// Creates a natural cubic spline interpolator.
    ///
    /// # Errors
    ///
    /// Returns an error for fewer than 3 points, mismatched lengths, or x
    /// values that are not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> MathResult<Self> {
        validate_nodes(&xs, &ys, 3)?;

        let y2s = second_derivatives(&xs, &ys)?;
        let n = xs.len();
        let basis = (0..n)
            .map(|j| {
                let mut unit = vec![0.0; n];
                unit[j] = 1.0;
                second_derivatives(&xs, &unit)
            })
            .collect::<MathResult<Vec<_>>>()?;

        Ok(Self {
            xs,
            ys,
            y2s,
            basis,
            allow_extrapolation: false,
        })
    }

    /// Enables extrapolation with the end segments' cubics.
    #[must_use]
    pub fn with_extrapolation(mut self) -> Self {
        self.allow_extrapolation = true;
        self
    }

    fn check_range(&self, x: f64) -> MathResult<()> {
        if !self.allow_extrapolation && !self.in_range(x) {
            return Err(MathError::ExtrapolationNotAllowed {
                x,
                min: self.min_x(),
                max: self.max_x(),
            });
        }
        Ok(())
    }

    /// Segment index, width, and the two Lagrange weights `(a, b)` at `x`.
    fn locate(&self, x: f64) -> (usize, f64, f64, f64) {
        let i = find_segment(&self.xs, x);
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;
        (i, h, a, b)
    }
}

impl Interpolator for CubicSpline {
    fn interpolate(&self, x: f64) -> MathResult<f64> {
        self.check_range(x)?;
        let (i, h, a, b) = self.locate(x);

        Ok(a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.y2s[i] + (b * b * b - b) * self.y2s[i + 1]) * (h * h)
                / 6.0)
    }

    fn derivative(&self, x: f64) -> MathResult<f64> {
        self.check_range(x)?;
        let (i, h, a, b) = self.locate(x);

        Ok((self.ys[i + 1] - self.ys[i]) / h
            - (3.0 * a * a - 1.0) / 6.0 * h * self.y2s[i]
            + (3.0 * b * b - 1.0) / 6.0 * h * self.y2s[i + 1])
    }

    fn node_sensitivities(&self, x: f64) -> MathResult<Vec<f64>> {
        self.check_range(x)?;
        let (i, h, a, b) = self.locate(x);
        let curvature_lo = (a * a * a - a) * h * h / 6.0;
        let curvature_hi = (b * b * b - b) * h * h / 6.0;

        let mut weights: Vec<f64> = self
            .basis
            .iter()
            .map(|m| curvature_lo * m[i] + curvature_hi * m[i + 1])
            .collect();
        weights[i] += a;
        weights[i + 1] += b;
        Ok(weights)
    }

    fn allows_extrapolation(&self) -> bool {
        self.allow_extrapolation
    }

    fn min_x(&self) -> f64 {
        self.xs[0]
    }

    fn max_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}

/// Second derivatives of the natural spline through `(xs, ys)`.
fn second_derivatives(xs: &[f64], ys: &[f64]) -> MathResult<Vec<f64>> {
    let n = xs.len();
    let interior = n - 2;
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();

    let lower: Vec<f64> = (1..interior).map(|k| h[k]).collect();
    let diagonal: Vec<f64> = (0..interior).map(|k| 2.0 * (h[k] + h[k + 1])).collect();
    let upper: Vec<f64> = (0..interior.saturating_sub(1)).map(|k| h[k + 1]).collect();
    let rhs: Vec<f64> = (0..interior)
        .map(|k| 6.0 * ((ys[k + 2] - ys[k + 1]) / h[k + 1] - (ys[k + 1] - ys[k]) / h[k]))
        .collect();

    let inner = solve_tridiagonal(&lower, &diagonal, &upper, &rhs)?;

    let mut y2s = Vec::with_capacity(n);
    y2s.push(0.0);
    y2s.extend(inner);
    y2s.push(0.0);
    Ok(y2s)
}
