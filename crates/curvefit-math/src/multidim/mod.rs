//! Root finders for square systems `f(x) = 0`, `f: R^n -> R^n`.
//!
//! | Finder | Jacobian work per iteration | Linear algebra per iteration |
//! |--------|-----------------------------|------------------------------|
//! | [`NewtonVectorRootFinder`] | full Jacobian | one solve |
//! | [`BroydenVectorRootFinder`] | none after the first | rank-one update + one solve |
//! | [`ShermanMorrisonVectorRootFinder`] | none after the first | rank-one update of the inverse |
//!
//! All three share one driver loop and differ only in how they produce the
//! step direction and what they carry between iterations. Functions and
//! Jacobians are fallible: they return `Result<_, E>` for any caller error
//! type `E: From<MathError>`, so a pricing failure inside `f` surfaces
//! unchanged.
//!
//! # Convergence
//!
//! An iterate is accepted when `‖f(x)‖∞ < abs_tolerance`, or when the last
//! step satisfies `‖Δx‖₂ ≤ rel_tolerance · ‖x‖₂`. A start point that
//! already satisfies the absolute test returns after zero iterations.
//!
//! The finders converge to *a* root near the start point. Systems with
//! several roots need a start point close to the wanted one.
//!
//! # Example
//!
//! ```rust
//! use curvefit_math::multidim::{NewtonVectorRootFinder, VectorRootFinder, VectorSolverConfig};
//! use curvefit_math::MathError;
//! use nalgebra::DVector;
//!
//! // x^2 + y^2 = 4, x = y
//! let f = |v: &DVector<f64>| -> Result<DVector<f64>, MathError> {
//!     Ok(DVector::from_vec(vec![v[0] * v[0] + v[1] * v[1] - 4.0, v[0] - v[1]]))
//! };
//!
//! let start = DVector::from_vec(vec![1.0, 2.0]);
//! let result = NewtonVectorRootFinder
//!     .find_root(f, &start, &VectorSolverConfig::default())
//!     .unwrap();
//! assert!((result.root[0] - 2f64.sqrt()).abs() < 1e-8);
//! ```

mod broyden;
mod newton;
mod sherman_morrison;

pub use broyden::BroydenVectorRootFinder;
pub use newton::NewtonVectorRootFinder;
pub use sherman_morrison::ShermanMorrisonVectorRootFinder;

use nalgebra::{DMatrix, DVector};

use crate::differentiation::Differentiator;
use crate::error::MathError;
use crate::linear_algebra::{solve_with_fallback, DecompositionMethod};

/// Default absolute tolerance on `‖f(x)‖∞`.
pub const DEFAULT_ABS_TOLERANCE: f64 = 1e-8;

/// Default relative tolerance on the step size.
pub const DEFAULT_REL_TOLERANCE: f64 = 1e-8;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for the vector root finders.
#[derive(Debug, Clone, Copy)]
pub struct VectorSolverConfig {
    /// Convergence threshold on the max-norm of the function value.
    pub abs_tolerance: f64,
    /// Convergence threshold on the step size relative to the iterate.
    pub rel_tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
    /// Decomposition used for linear solves.
    pub decomposition: DecompositionMethod,
    /// Retry a singular LU solve with SVD.
    pub svd_fallback: bool,
    /// Step halvings allowed when the residual grows; 0 takes full steps.
    pub max_backtracks: u32,
    /// Differentiator used when no Jacobian is supplied.
    pub differentiator: Differentiator,
}

impl Default for VectorSolverConfig {
    fn default() -> Self {
        Self {
            abs_tolerance: DEFAULT_ABS_TOLERANCE,
            rel_tolerance: DEFAULT_REL_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            decomposition: DecompositionMethod::Lu,
            svd_fallback: true,
            max_backtracks: 0,
            differentiator: Differentiator::default(),
        }
    }
}

impl VectorSolverConfig {
    /// Sets the absolute tolerance.
    #[must_use]
    pub fn with_abs_tolerance(mut self, abs_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self
    }

    /// Sets the relative tolerance.
    #[must_use]
    pub fn with_rel_tolerance(mut self, rel_tolerance: f64) -> Self {
        self.rel_tolerance = rel_tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the decomposition method.
    #[must_use]
    pub fn with_decomposition(mut self, decomposition: DecompositionMethod) -> Self {
        self.decomposition = decomposition;
        self
    }

    /// Enables or disables the SVD fallback.
    #[must_use]
    pub fn with_svd_fallback(mut self, svd_fallback: bool) -> Self {
        self.svd_fallback = svd_fallback;
        self
    }

    /// Sets the number of allowed step halvings.
    #[must_use]
    pub fn with_max_backtracks(mut self, max_backtracks: u32) -> Self {
        self.max_backtracks = max_backtracks;
        self
    }

    /// Sets the differentiator.
    #[must_use]
    pub fn with_differentiator(mut self, differentiator: Differentiator) -> Self {
        self.differentiator = differentiator;
        self
    }
}

/// Result of a vector root search.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSolverResult {
    /// The root found.
    pub root: DVector<f64>,
    /// Number of iterations used.
    pub iterations: u32,
    /// `‖f(root)‖∞`.
    pub residual: f64,
}

/// Trait for root finders on square nonlinear systems.
pub trait VectorRootFinder {
    /// Finds a root using the supplied Jacobian function.
    ///
    /// # Errors
    ///
    /// - [`MathError::InvalidInput`] for an empty or non-finite start point
    /// - [`MathError::DimensionMismatch`] when `f` or the Jacobian has the wrong shape
    /// - [`MathError::NumericalFailure`] when `f` produces non-finite values
    /// - [`MathError::ConvergenceFailed`] when the iteration cap is reached
    ///
    /// Errors returned by `f` or `jacobian` are passed through.
    fn find_root_with_jacobian<F, J, E>(
        &self,
        f: F,
        jacobian: J,
        start: &DVector<f64>,
        config: &VectorSolverConfig,
    ) -> Result<VectorSolverResult, E>
    where
        F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>;

    /// Finds a root with a finite-difference Jacobian from `config.differentiator`.
    fn find_root<F, E>(
        &self,
        f: F,
        start: &DVector<f64>,
        config: &VectorSolverConfig,
    ) -> Result<VectorSolverResult, E>
    where
        F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
        E: From<MathError>,
    {
        let jacobian = config.differentiator.differentiate(&f);
        self.find_root_with_jacobian(&f, jacobian, start, config)
    }

    /// Returns the name of the finder.
    fn name(&self) -> &'static str;
}

/// How a finder turns the current state into a step, and what it remembers.
pub(crate) trait StepStrategy {
    /// Called once with the start point before the first step.
    fn initialize<J, E>(
        &mut self,
        x: &DVector<f64>,
        jacobian: &J,
        config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>;

    /// Full step `Δx` from `x` with value `fx`.
    fn direction<J, E>(
        &mut self,
        x: &DVector<f64>,
        fx: &DVector<f64>,
        jacobian: &J,
        config: &VectorSolverConfig,
    ) -> Result<DVector<f64>, E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>;

    /// Called after a step was taken.
    fn update<J, E>(
        &mut self,
        step: &DVector<f64>,
        value_change: &DVector<f64>,
        x_new: &DVector<f64>,
        jacobian: &J,
        config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>;
}

/// Shared iteration loop.
pub(crate) fn drive<S, F, J, E>(
    name: &str,
    mut strategy: S,
    f: F,
    jacobian: J,
    start: &DVector<f64>,
    config: &VectorSolverConfig,
) -> Result<VectorSolverResult, E>
where
    S: StepStrategy,
    F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
    J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
    E: From<MathError>,
{
    let n = start.len();
    if n == 0 {
        return Err(MathError::invalid_input("start vector is empty").into());
    }
    if start.iter().any(|v| !v.is_finite()) {
        return Err(MathError::invalid_input("start vector has non-finite entries").into());
    }

    let mut x = start.clone();
    let mut fx = evaluate(&f, &x, n)?;
    if fx.amax() < config.abs_tolerance {
        log::debug!("{name}: start point is already a root");
        return Ok(VectorSolverResult {
            residual: fx.amax(),
            root: x,
            iterations: 0,
        });
    }

    strategy.initialize(&x, &jacobian, config)?;

    for iteration in 1..=config.max_iterations {
        let direction = strategy.direction(&x, &fx, &jacobian, config)?;
        let (x_new, f_new) = take_step(&f, &x, &fx, &direction, n, config)?;

        let step = &x_new - &x;
        let value_change = &f_new - &fx;
        let residual = f_new.amax();
        log::trace!(
            "{name} iteration {iteration}: |f| = {residual:.3e}, |dx| = {:.3e}",
            step.norm()
        );

        if residual >= config.abs_tolerance && step.norm() == 0.0 {
            return Err(MathError::numerical_failure(format!(
                "{name} stalled at iteration {iteration} with |f| = {residual:.3e}"
            ))
            .into());
        }

        if residual < config.abs_tolerance || step.norm() <= config.rel_tolerance * x_new.norm()
        {
            log::debug!("{name} converged in {iteration} iterations (|f| = {residual:.3e})");
            return Ok(VectorSolverResult {
                root: x_new,
                iterations: iteration,
                residual,
            });
        }

        strategy.update(&step, &value_change, &x_new, &jacobian, config)?;
        x = x_new;
        fx = f_new;
    }

    Err(MathError::convergence_failed(config.max_iterations, fx.amax()).into())
}

/// Evaluates `f` and checks the length of the result.
fn evaluate<F, E>(f: &F, x: &DVector<f64>, n: usize) -> Result<DVector<f64>, E>
where
    F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
    E: From<MathError>,
{
    let value = f(x)?;
    if value.len() != n {
        return Err(MathError::vector_mismatch(n, n, value.len()).into());
    }
    Ok(value)
}

/// Applies `direction`, halving it while the residual grows (up to `max_backtracks` times).
fn take_step<F, E>(
    f: &F,
    x: &DVector<f64>,
    fx: &DVector<f64>,
    direction: &DVector<f64>,
    n: usize,
    config: &VectorSolverConfig,
) -> Result<(DVector<f64>, DVector<f64>), E>
where
    F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
    E: From<MathError>,
{
    let current = fx.norm();
    let mut scale = 1.0;
    let mut attempt = 0;

    loop {
        let candidate = x + direction * scale;
        let value = evaluate(f, &candidate, n)?;
        let finite = value.iter().all(|v| v.is_finite());

        if (finite && value.norm() < current) || attempt >= config.max_backtracks {
            if !finite {
                return Err(MathError::numerical_failure(format!(
                    "function value is not finite after a step of size {:.3e}",
                    direction.norm() * scale
                ))
                .into());
            }
            return Ok((candidate, value));
        }
        attempt += 1;
        scale *= 0.5;
    }
}

/// Evaluates the Jacobian and checks it is a finite `n x n` matrix.
pub(crate) fn checked_jacobian<J, E>(jacobian: &J, x: &DVector<f64>) -> Result<DMatrix<f64>, E>
where
    J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
    E: From<MathError>,
{
    let n = x.len();
    let matrix = jacobian(x)?;
    if matrix.shape() != (n, n) {
        return Err(MathError::DimensionMismatch {
            rows1: matrix.nrows(),
            cols1: matrix.ncols(),
            rows2: n,
            cols2: n,
        }
        .into());
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(MathError::numerical_failure("Jacobian has non-finite entries").into());
    }
    Ok(matrix)
}

/// Solves `matrix · step = -fx` with the configured decomposition and fallback.
pub(crate) fn newton_step(
    matrix: &DMatrix<f64>,
    fx: &DVector<f64>,
    config: &VectorSolverConfig,
) -> Result<DVector<f64>, MathError> {
    let solved = solve_with_fallback(matrix, &(-fx), config.decomposition, config.svd_fallback)?;
    Ok(solved.solution)
}
