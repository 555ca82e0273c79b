//! Calibration configuration.

use std::path::Path;

use curvefit_math::differentiation::Differentiator;
use curvefit_math::linear_algebra::DecompositionMethod;
use curvefit_math::multidim::{
    VectorSolverConfig, DEFAULT_ABS_TOLERANCE, DEFAULT_MAX_ITERATIONS, DEFAULT_REL_TOLERANCE,
};
use serde::{Deserialize, Serialize};

use crate::error::{CurveError, CurveResult};

/// Vector root finder used for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RootFinderKind {
    /// Newton with a full Jacobian every iteration.
    #[default]
    Newton,
    /// Broyden rank-one updates of the Jacobian.
    Broyden,
    /// Broyden updates applied to the inverse Jacobian.
    ShermanMorrison,
}

impl std::fmt::Display for RootFinderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Newton => "Newton",
            Self::Broyden => "Broyden",
            Self::ShermanMorrison => "Sherman-Morrison",
        };
        write!(f, "{name}")
    }
}

/// Decomposition used for the linear solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Decomposition {
    /// LU with partial pivoting.
    #[default]
    Lu,
    /// Singular value decomposition.
    Svd,
}

impl From<Decomposition> for DecompositionMethod {
    fn from(d: Decomposition) -> Self {
        match d {
            Decomposition::Lu => DecompositionMethod::Lu,
            Decomposition::Svd => DecompositionMethod::Svd,
        }
    }
}

/// How the calibration Jacobian is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JacobianMethod {
    /// From calculator sensitivities, when the calculator provides them.
    #[default]
    Analytic,
    /// Finite differences of the calibration function.
    FiniteDifference,
}

/// How zero-rate sensitivities are distributed onto curve nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeSensitivity {
    /// Interpolator node sensitivities.
    #[default]
    Analytic,
    /// Bumping each node yield.
    FiniteDifference,
}

/// Calibration settings.
///
/// # Example
///
/// ```rust
/// use curvefit_curves::calibration::{CalibrationConfig, RootFinderKind};
///
/// let config = CalibrationConfig::from_toml_str(
///     r#"
///     root_finder = "broyden"
///     abs_tolerance = 1e-10
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.root_finder, RootFinderKind::Broyden);
/// assert_eq!(config.max_iterations, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Convergence threshold on the max-norm of the pricing discrepancies.
    pub abs_tolerance: f64,
    /// Convergence threshold on the step size relative to the solution.
    pub rel_tolerance: f64,
    /// Maximum root finder iterations.
    pub max_iterations: u32,
    /// Decomposition for linear solves.
    pub decomposition: Decomposition,
    /// Retry singular LU solves with SVD.
    pub svd_fallback: bool,
    /// Root finder.
    pub root_finder: RootFinderKind,
    /// Jacobian method.
    pub jacobian: JacobianMethod,
    /// Node sensitivity method for analytic Jacobians.
    pub node_sensitivity: NodeSensitivity,
    /// Step halvings allowed when the residual grows.
    pub max_backtracks: u32,
    /// Start value for every node yield when no start vector is given.
    pub initial_rate: f64,
    /// Include the final Jacobian in the output.
    pub return_jacobian: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            abs_tolerance: DEFAULT_ABS_TOLERANCE,
            rel_tolerance: DEFAULT_REL_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            decomposition: Decomposition::Lu,
            svd_fallback: true,
            root_finder: RootFinderKind::Newton,
            jacobian: JacobianMethod::Analytic,
            node_sensitivity: NodeSensitivity::Analytic,
            max_backtracks: 0,
            initial_rate: 0.01,
            return_jacobian: true,
        }
    }
}

impl CalibrationConfig {
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

    /// Sets the decomposition.
    #[must_use]
    pub fn with_decomposition(mut self, decomposition: Decomposition) -> Self {
        self.decomposition = decomposition;
        self
    }

    /// Enables or disables the SVD fallback.
    #[must_use]
    pub fn with_svd_fallback(mut self, svd_fallback: bool) -> Self {
        self.svd_fallback = svd_fallback;
        self
    }

    /// Sets the root finder.
    #[must_use]
    pub fn with_root_finder(mut self, root_finder: RootFinderKind) -> Self {
        self.root_finder = root_finder;
        self
    }

    /// Sets the Jacobian method.
    #[must_use]
    pub fn with_jacobian(mut self, jacobian: JacobianMethod) -> Self {
        self.jacobian = jacobian;
        self
    }

    /// Sets the node sensitivity method.
    #[must_use]
    pub fn with_node_sensitivity(mut self, node_sensitivity: NodeSensitivity) -> Self {
        self.node_sensitivity = node_sensitivity;
        self
    }

    /// Sets the number of allowed step halvings.
    #[must_use]
    pub fn with_max_backtracks(mut self, max_backtracks: u32) -> Self {
        self.max_backtracks = max_backtracks;
        self
    }

    /// Sets the initial node yield.
    #[must_use]
    pub fn with_initial_rate(mut self, initial_rate: f64) -> Self {
        self.initial_rate = initial_rate;
        self
    }

    /// Whether to return the final Jacobian.
    #[must_use]
    pub fn with_return_jacobian(mut self, return_jacobian: bool) -> Self {
        self.return_jacobian = return_jacobian;
        self
    }

    /// Checks tolerances and limits.
    pub fn validate(&self) -> CurveResult<()> {
        if !(self.abs_tolerance.is_finite() && self.abs_tolerance > 0.0) {
            return Err(CurveError::invalid_argument(format!(
                "abs_tolerance must be positive, got {}",
                self.abs_tolerance
            )));
        }
        if !(self.rel_tolerance.is_finite() && self.rel_tolerance >= 0.0) {
            return Err(CurveError::invalid_argument(format!(
                "rel_tolerance must be non-negative, got {}",
                self.rel_tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(CurveError::invalid_argument("max_iterations must be positive"));
        }
        if !self.initial_rate.is_finite() {
            return Err(CurveError::invalid_argument("initial_rate must be finite"));
        }
        Ok(())
    }

    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> CurveResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| CurveError::invalid_argument(format!("invalid calibration config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> CurveResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CurveError::invalid_argument(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> CurveResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CurveError::invalid_argument(format!("cannot serialize config: {e}")))
    }

    /// Root finder settings.
    #[must_use]
    pub fn solver_config(&self) -> VectorSolverConfig {
        VectorSolverConfig::default()
            .with_abs_tolerance(self.abs_tolerance)
            .with_rel_tolerance(self.rel_tolerance)
            .with_max_iterations(self.max_iterations)
            .with_decomposition(self.decomposition.into())
            .with_svd_fallback(self.svd_fallback)
            .with_max_backtracks(self.max_backtracks)
            .with_differentiator(Differentiator::default())
    }
}

impl From<&CalibrationConfig> for VectorSolverConfig {
    fn from(config: &CalibrationConfig) -> Self {
        config.solver_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CalibrationConfig::default();
        assert_eq!(config.root_finder, RootFinderKind::Newton);
        assert_eq!(config.decomposition, Decomposition::Lu);
        assert!(config.svd_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CalibrationConfig::default()
            .with_root_finder(RootFinderKind::ShermanMorrison)
            .with_jacobian(JacobianMethod::FiniteDifference)
            .with_decomposition(Decomposition::Svd);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("sherman_morrison"));
        assert_eq!(CalibrationConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(CalibrationConfig::from_toml_str("abs_tolerance = -1.0").is_err());
        assert!(CalibrationConfig::from_toml_str("max_iterations = 0").is_err());
        assert!(CalibrationConfig::from_toml_str("root_finder = \"secant\"").is_err());
    }

    #[test]
    fn test_solver_config() {
        let solver: VectorSolverConfig = (&CalibrationConfig::default()
            .with_decomposition(Decomposition::Svd)
            .with_max_iterations(7))
            .into();
        assert_eq!(solver.max_iterations, 7);
        assert_eq!(solver.decomposition, DecompositionMethod::Svd);
    }
}
