//! Roots of real polynomials.
//!
//! [`QuadraticRootFinder`] handles the degree-2 case in closed form;
//! [`EigenvalueRootFinder`] returns every root of a polynomial of any degree
//! as the eigenvalues of its companion matrix.

use nalgebra::{Complex, DMatrix};

use crate::error::{MathError, MathResult};

/// A polynomial with real coefficients, stored lowest power first.
///
/// `RealPolynomial::new(vec![12.0, 7.0, 1.0])` is `12 + 7x + x^2`.
#[derive(Debug, Clone, PartialEq)]
pub struct RealPolynomial {
    coefficients: Vec<f64>,
}

impl RealPolynomial {
    /// Creates a polynomial from coefficients in ascending powers.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no coefficients or any is non-finite.
    pub fn new(coefficients: Vec<f64>) -> MathResult<Self> {
        if coefficients.is_empty() {
            return Err(MathError::invalid_input(
                "polynomial needs at least one coefficient",
            ));
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(MathError::invalid_input(
                "polynomial coefficients must be finite",
            ));
        }
        Ok(Self { coefficients })
    }

    /// Builds the monic polynomial `(x - r_0)(x - r_1)...` with the given real roots.
    pub fn from_roots(roots: &[f64]) -> Self {
        let mut coefficients = vec![1.0];
        for &root in roots {
            let mut next = vec![0.0; coefficients.len() + 1];
            for (i, &c) in coefficients.iter().enumerate() {
                next[i + 1] += c;
                next[i] -= root * c;
            }
            coefficients = next;
        }
        Self { coefficients }
    }

    /// Coefficients in ascending powers.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Nominal degree (number of coefficients minus one).
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Coefficient of the highest power.
    pub fn leading_coefficient(&self) -> f64 {
        self.coefficients[self.degree()]
    }

    /// Evaluates the polynomial at `x` (Horner's scheme).
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }

    /// Evaluates the polynomial at a complex point.
    pub fn evaluate_complex(&self, z: Complex<f64>) -> Complex<f64> {
        self.coefficients
            .iter()
            .rev()
            .fold(Complex::new(0.0, 0.0), |acc, &c| acc * z + c)
    }

    /// Returns the derivative polynomial.
    #[must_use]
    pub fn derivative(&self) -> Self {
        if self.coefficients.len() == 1 {
            return Self {
                coefficients: vec![0.0],
            };
        }
        let coefficients = self
            .coefficients
            .iter()
            .enumerate()
            .skip(1)
            .map(|(power, &c)| power as f64 * c)
            .collect();
        Self { coefficients }
    }
}

/// Closed-form roots of `a x^2 + b x + c`.
///
/// Uses the cancellation-free form `q = -(b + sign(b) sqrt(b^2 - 4ac)) / 2`,
/// `x_1 = q / a`, `x_2 = c / q`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadraticRootFinder;

impl QuadraticRootFinder {
    /// Returns both real roots in ascending order (repeated roots appear twice).
    ///
    /// # Errors
    ///
    /// - [`MathError::InvalidInput`] unless the polynomial is exactly quadratic
    /// - [`MathError::Domain`] when the roots are complex
    ///
    /// # Example
    ///
    /// ```rust
    /// use curvefit_math::solvers::{QuadraticRootFinder, RealPolynomial};
    ///
    /// let p = RealPolynomial::new(vec![12.0, 7.0, 1.0]).unwrap();
    /// let [x1, x2] = QuadraticRootFinder.roots(&p).unwrap();
    /// assert_eq!((x1, x2), (-4.0, -3.0));
    /// ```
    pub fn roots(&self, polynomial: &RealPolynomial) -> MathResult<[f64; 2]> {
        if polynomial.degree() != 2 {
            return Err(MathError::invalid_input(format!(
                "quadratic root finder needs a degree 2 polynomial, got degree {}",
                polynomial.degree()
            )));
        }
        let [c, b, a] = [
            polynomial.coefficients[0],
            polynomial.coefficients[1],
            polynomial.coefficients[2],
        ];
        if a == 0.0 {
            return Err(MathError::invalid_input(
                "leading coefficient of a quadratic must be non-zero",
            ));
        }

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Err(MathError::domain(format!(
                "negative discriminant {discriminant}: no real roots"
            )));
        }

        let q = -0.5 * (b + b.signum() * discriminant.sqrt());
        let (x1, x2) = if q == 0.0 {
            // b = 0 and c = 0: double root at the origin.
            (0.0, 0.0)
        } else {
            (q / a, c / q)
        };

        Ok(if x1 <= x2 { [x1, x2] } else { [x2, x1] })
    }
}

/// All roots of a real polynomial from the eigenvalues of its companion matrix.
///
/// Each eigenvalue is refined with a couple of Newton steps on the
/// polynomial itself, which removes most of the backward error the QR
/// iteration introduces for well-separated roots.
#[derive(Debug, Clone, Copy)]
pub struct EigenvalueRootFinder {
    /// Newton refinement steps applied to each eigenvalue.
    pub polish_steps: u32,
}

impl Default for EigenvalueRootFinder {
    fn default() -> Self {
        Self { polish_steps: 2 }
    }
}

impl EigenvalueRootFinder {
    /// Returns every (complex) root, ordered by real part then imaginary part.
    ///
    /// # Errors
    ///
    /// Returns [`MathError::InvalidInput`] when the leading coefficient is zero.
    pub fn roots(&self, polynomial: &RealPolynomial) -> MathResult<Vec<Complex<f64>>> {
        let leading = polynomial.leading_coefficient();
        if leading == 0.0 {
            return Err(MathError::invalid_input(
                "leading coefficient must be non-zero",
            ));
        }
        let n = polynomial.degree();
        if n == 0 {
            return Ok(Vec::new());
        }

        let companion = companion_matrix(polynomial.coefficients(), leading);
        let derivative = polynomial.derivative();

        let mut roots: Vec<Complex<f64>> = companion
            .complex_eigenvalues()
            .iter()
            .map(|&z| self.polish(polynomial, &derivative, z))
            .collect();

        if roots.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
            return Err(MathError::numerical_failure(
                "companion matrix eigenvalues are not finite",
            ));
        }

        roots.sort_by(|a, b| a.re.total_cmp(&b.re).then(a.im.total_cmp(&b.im)));
        Ok(roots)
    }

    /// Returns the real roots only, in ascending order.
    ///
    /// A root counts as real when its imaginary part is below
    /// `imaginary_tolerance` times `max(1, |root|)`.
    pub fn real_roots(
        &self,
        polynomial: &RealPolynomial,
        imaginary_tolerance: f64,
    ) -> MathResult<Vec<f64>> {
        Ok(self
            .roots(polynomial)?
            .into_iter()
            .filter(|z| z.im.abs() <= imaginary_tolerance * z.norm().max(1.0))
            .map(|z| z.re)
            .collect())
    }

    fn polish(
        &self,
        polynomial: &RealPolynomial,
        derivative: &RealPolynomial,
        mut z: Complex<f64>,
    ) -> Complex<f64> {
        for _ in 0..self.polish_steps {
            let value = polynomial.evaluate_complex(z);
            let slope = derivative.evaluate_complex(z);
            if slope.norm() == 0.0 {
                break;
            }
            let candidate = z - value / slope;
            if polynomial.evaluate_complex(candidate).norm() < value.norm() {
                z = candidate;
            } else {
                break;
            }
        }
        z
    }
}

/// Companion matrix of the monic polynomial `p / leading`.
fn companion_matrix(coefficients: &[f64], leading: f64) -> DMatrix<f64> {
    let n = coefficients.len() - 1;
    let mut companion = DMatrix::zeros(n, n);
    for i in 1..n {
        companion[(i, i - 1)] = 1.0;
    }
    for (i, &c) in coefficients.iter().take(n).enumerate() {
        companion[(i, n - 1)] = -c / leading;
    }
    companion
}
