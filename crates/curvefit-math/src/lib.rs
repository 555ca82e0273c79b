//! # Curvefit Math
//!
//! Numerical building blocks for curve calibration.
//!
//! This crate provides:
//!
//! - **Solvers**: one-dimensional root finders (bisection, Ridder, Brent, Newton-Raphson)
//!   and polynomial root finders (closed-form quadratic, companion-matrix eigenvalues)
//! - **Differentiation**: forward, central and backward finite-difference Jacobians
//! - **Linear Algebra**: LU and SVD decompositions with an explicit SVD fallback
//! - **Multidim**: Newton, Broyden and Sherman-Morrison root finders for square systems
//! - **Interpolation**: linear and natural cubic spline, with node sensitivities
//!
//! ## Design Philosophy
//!
//! - **Fallible callbacks**: vector functions return `Result` with the caller's own
//!   error type, so valuation errors are never swallowed by the solver
//! - **Explicit outcomes**: singular systems and non-convergence are values, not panics
//! - **Deterministic**: no randomness and no hidden global state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::float_cmp)]
#![allow(clippy::uninlined_format_args)]

pub mod differentiation;
pub mod error;
pub mod interpolation;
pub mod linear_algebra;
pub mod multidim;
pub mod solvers;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::differentiation::{Differentiator, FiniteDifferenceScheme};
    pub use crate::error::{MathError, MathResult};
    pub use crate::interpolation::{CubicSpline, Interpolator, LinearInterpolator};
    pub use crate::linear_algebra::{
        decompose, solve_with_fallback, DecompositionMethod, DecompositionResult, LinearSolve,
    };
    pub use crate::multidim::{
        BroydenVectorRootFinder, NewtonVectorRootFinder, ShermanMorrisonVectorRootFinder,
        VectorRootFinder, VectorSolverConfig, VectorSolverResult,
    };
    pub use crate::solvers::{
        bisection, brent, newton_raphson, newton_raphson_numerical, ridder, BisectionSolver,
        BrentSolver, EigenvalueRootFinder, NewtonSolver, QuadraticRootFinder, RealPolynomial,
        RidderSolver, Solver, SolverConfig, SolverResult,
    };
}

pub use error::{MathError, MathResult};
