//! One-dimensional root-finding algorithms.
//!
//! - [`bisection`]: Simple and reliable bracketing method
//! - [`ridder`]: Exponential correction of false position on a bracket
//! - [`brent`]: Robust method combining bisection, secant, and inverse quadratic
//! - [`newton_raphson`]: Fast quadratic convergence when derivative is available
//! - [`QuadraticRootFinder`] and [`EigenvalueRootFinder`]: roots of real polynomials
//!
//! # Choosing a Solver
//!
//! | Solver | Speed | Reliability | Requires |
//! |--------|-------|-------------|----------|
//! | Newton-Raphson | Fastest (quadratic) | May diverge | Derivative |
//! | Brent | Fast (superlinear) | Guaranteed | Bracket |
//! | Ridder | Fast (quadratic order, 2 evals/step) | Guaranteed | Bracket |
//! | Bisection | Slow (linear) | Guaranteed | Bracket |
//!
//! All bracketing solvers accept the bracket in either order and fail with
//! [`MathError::InvalidBracket`](crate::MathError::InvalidBracket) when the
//! function has the same sign at both ends.
//!
//! # Example
//!
//! ```rust
//! use curvefit_math::solvers::{ridder, SolverConfig};
//!
//! // x^3 - 4x^2 + x + 6 = (x + 1)(x - 2)(x - 3)
//! let f = |x: f64| x * x * x - 4.0 * x * x + x + 6.0;
//!
//! let result = ridder(f, 2.5, 3.5, &SolverConfig::default()).unwrap();
//! assert!((result.root - 3.0).abs() < 1e-9);
//! ```

mod bisection;
mod brent;
mod newton;
mod polynomial;
mod ridder;

pub use bisection::bisection;
pub use brent::brent;
pub use newton::{newton_raphson, newton_raphson_numerical};
pub use polynomial::{EigenvalueRootFinder, QuadraticRootFinder, RealPolynomial};
pub use ridder::ridder;

use crate::error::MathResult;

/// Default tolerance for root-finding algorithms.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default maximum iterations for root-finding algorithms.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Tolerance for convergence.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Result of a root-finding iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// The root found.
    pub root: f64,
    /// Number of iterations used.
    pub iterations: u32,
    /// Final residual (function value at root).
    pub residual: f64,
}

/// Trait for root-finding solvers with optional derivative.
///
/// Bracketing solvers use `bounds` when given and fall back to
/// `initial_guess ± 1`. Newton uses the derivative when supplied and a
/// central difference otherwise.
///
/// # Example
///
/// ```rust
/// use curvefit_math::solvers::{Solver, NewtonSolver, SolverConfig};
///
/// let solver = NewtonSolver;
/// let f = |x: f64| x * x - 2.0;
/// let df = |x: f64| 2.0 * x;
///
/// let result = solver.solve(f, Some(df), 1.5, None, &SolverConfig::default()).unwrap();
/// assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-10);
/// ```
pub trait Solver: Send + Sync {
    /// Solves for a root of the given function.
    fn solve<F, D>(
        &self,
        f: F,
        derivative: Option<D>,
        initial_guess: f64,
        bounds: Option<(f64, f64)>,
        config: &SolverConfig,
    ) -> MathResult<SolverResult>
    where
        F: Fn(f64) -> f64,
        D: Fn(f64) -> f64;

    /// Returns the name of the solver.
    fn name(&self) -> &'static str;
}

/// Newton-Raphson solver implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonSolver;

impl Solver for NewtonSolver {
    fn solve<F, D>(
        &self,
        f: F,
        derivative: Option<D>,
        initial_guess: f64,
        _bounds: Option<(f64, f64)>,
        config: &SolverConfig,
    ) -> MathResult<SolverResult>
    where
        F: Fn(f64) -> f64,
        D: Fn(f64) -> f64,
    {
        match derivative {
            Some(df) => newton_raphson(f, df, initial_guess, config),
            None => newton_raphson_numerical(f, initial_guess, config),
        }
    }

    fn name(&self) -> &'static str {
        "Newton-Raphson"
    }
}

/// Brent-Dekker solver implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrentSolver;

impl Solver for BrentSolver {
    fn solve<F, D>(
        &self,
        f: F,
        _derivative: Option<D>,
        initial_guess: f64,
        bounds: Option<(f64, f64)>,
        config: &SolverConfig,
    ) -> MathResult<SolverResult>
    where
        F: Fn(f64) -> f64,
        D: Fn(f64) -> f64,
    {
        let (a, b) = bounds.unwrap_or((initial_guess - 1.0, initial_guess + 1.0));
        brent(f, a, b, config)
    }

    fn name(&self) -> &'static str {
        "Brent"
    }
}

/// Ridder solver implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RidderSolver;

impl Solver for RidderSolver {
    fn solve<F, D>(
        &self,
        f: F,
        _derivative: Option<D>,
        initial_guess: f64,
        bounds: Option<(f64, f64)>,
        config: &SolverConfig,
    ) -> MathResult<SolverResult>
    where
        F: Fn(f64) -> f64,
        D: Fn(f64) -> f64,
    {
        let (a, b) = bounds.unwrap_or((initial_guess - 1.0, initial_guess + 1.0));
        ridder(f, a, b, config)
    }

    fn name(&self) -> &'static str {
        "Ridder"
    }
}

/// Bisection solver implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BisectionSolver;

impl Solver for BisectionSolver {
    fn solve<F, D>(
        &self,
        f: F,
        _derivative: Option<D>,
        initial_guess: f64,
        bounds: Option<(f64, f64)>,
        config: &SolverConfig,
    ) -> MathResult<SolverResult>
    where
        F: Fn(f64) -> f64,
        D: Fn(f64) -> f64,
    {
        let (a, b) = bounds.unwrap_or((initial_guess - 1.0, initial_guess + 1.0));
        bisection(f, a, b, config)
    }

    fn name(&self) -> &'static str {
        "Bisection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MathError;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    /// (x + 1)(x - 2)(x - 3)
    fn cubic(x: f64) -> f64 {
        x * x * x - 4.0 * x * x + x + 6.0
    }

    const NO_DERIV: Option<fn(f64) -> f64> = None;

    type BracketSolve = Box<dyn Fn(f64, f64) -> MathResult<SolverResult>>;

    fn bracketing_solvers() -> Vec<(&'static str, BracketSolve)> {
        let config = SolverConfig::default();
        let bisect: BracketSolve =
            Box::new(move |a, b| BisectionSolver.solve(cubic, NO_DERIV, a, Some((a, b)), &config));
        let ridder: BracketSolve =
            Box::new(move |a, b| RidderSolver.solve(cubic, NO_DERIV, a, Some((a, b)), &config));
        let brent: BracketSolve =
            Box::new(move |a, b| BrentSolver.solve(cubic, NO_DERIV, a, Some((a, b)), &config));
        vec![("bisection", bisect), ("ridder", ridder), ("brent", brent)]
    }

    #[test]
    fn test_solver_config() {
        let config = SolverConfig::default()
            .with_tolerance(1e-8)
            .with_max_iterations(50);

        assert!((config.tolerance - 1e-8).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, 50);
    }

    #[test]
    fn test_bracketing_solvers_find_each_cubic_root() {
        for (name, solve) in bracketing_solvers() {
            let root = solve(2.5, 3.5).unwrap().root;
            assert!((root - 3.0).abs() < 1e-9, "{name}: {root}");

            let root = solve(1.5, 2.5).unwrap().root;
            assert!((root - 2.0).abs() < 1e-9, "{name}: {root}");

            // Reversed bracket.
            let root = solve(0.5, -1.5).unwrap().root;
            assert!((root + 1.0).abs() < 1e-9, "{name}: {root}");
        }
    }

    #[test]
    fn test_bracketing_solvers_reject_same_sign() {
        for (name, solve) in bracketing_solvers() {
            let result = solve(3.5, 4.5);
            assert!(
                matches!(result, Err(MathError::InvalidBracket { .. })),
                "{name}"
            );
        }
    }

    #[test]
    fn test_newton_cubic_from_two_starts() {
        let f = |x: f64| x * x * x - 6.0 * x * x + 11.0 * x - 106.0;
        let df = |x: f64| 3.0 * x * x - 12.0 * x + 11.0;
        let config = SolverConfig::default();

        for start in [4.0, 10.0] {
            let result = NewtonSolver
                .solve(f, Some(df), start, None, &config)
                .unwrap();
            assert_relative_eq!(result.root, 6.713_397_681_556, epsilon = 1e-9);

            let numerical = NewtonSolver
                .solve(f, NO_DERIV, start, None, &config)
                .unwrap();
            assert_relative_eq!(numerical.root, 6.713_397_681_556, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_solver_names() {
        assert_eq!(NewtonSolver.name(), "Newton-Raphson");
        assert_eq!(BrentSolver.name(), "Brent");
        assert_eq!(RidderSolver.name(), "Ridder");
        assert_eq!(BisectionSolver.name(), "Bisection");
    }

    #[test]
    fn test_solvers_agree_on_discount_rate() {
        // Continuously compounded rate implied by a 5y discount factor of 0.8.
        let f = |r: f64| (-r * 5.0).exp() - 0.8;
        let config = SolverConfig::default();
        let expected = -(0.8f64).ln() / 5.0;

        assert_relative_eq!(bisection(f, 0.0, 0.2, &config).unwrap().root, expected, epsilon = 1e-9);
        assert_relative_eq!(ridder(f, 0.0, 0.2, &config).unwrap().root, expected, epsilon = 1e-9);
        assert_relative_eq!(brent(f, 0.0, 0.2, &config).unwrap().root, expected, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn prop_bracketed_root_lies_in_bracket(
            root in -5.0f64..5.0,
            slope in 0.1f64..10.0,
            left in 0.01f64..3.0,
            right in 0.01f64..3.0,
        ) {
            // Monotone, continuous, sign change guaranteed on [root - left, root + right].
            let f = move |x: f64| slope * (x - root) + 0.1 * (x - root).powi(3);
            let (a, b) = (root - left, root + right);
            let config = SolverConfig::default();

            for result in [
                bisection(f, a, b, &config),
                ridder(f, a, b, &config),
                brent(f, a, b, &config),
            ] {
                let found = result.unwrap().root;
                prop_assert!(found >= a - 1e-12 && found <= b + 1e-12);
                prop_assert!((found - root).abs() < 1e-8);
            }
        }
    }
}
