//! Interpolation methods for zero-yield curves.

use std::sync::Arc;

use curvefit_math::interpolation::{CubicSpline, Interpolator, LinearInterpolator};
use serde::{Deserialize, Serialize};

use crate::error::CurveResult;

/// Interpolation methods for zero yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// Linear interpolation on zero rates.
    #[default]
    Linear,

    /// Natural cubic spline on zero rates.
    CubicSpline,
}

impl InterpolationMethod {
    /// Minimum number of nodes the interpolator needs.
    ///
    /// Curves with a single node are flat and need no interpolator at all.
    #[must_use]
    pub fn min_nodes(&self) -> usize {
        match self {
            Self::Linear => 2,
            Self::CubicSpline => 3,
        }
    }

    /// Returns true if this method produces smooth curves.
    #[must_use]
    pub fn is_smooth(&self) -> bool {
        matches!(self, Self::CubicSpline)
    }

    /// Builds an interpolator through `(times, yields)`.
    pub fn build(&self, times: Vec<f64>, yields: Vec<f64>) -> CurveResult<Arc<dyn Interpolator>> {
        let interpolator: Arc<dyn Interpolator> = match self {
            Self::Linear => Arc::new(LinearInterpolator::new(times, yields)?),
            Self::CubicSpline => Arc::new(CubicSpline::new(times, yields)?),
        };
        Ok(interpolator)
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Linear => "Linear",
            Self::CubicSpline => "Cubic Spline",
        };
        write!(f, "{name}")
    }
}
