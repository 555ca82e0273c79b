//! Broyden's (good) method.

use nalgebra::{DMatrix, DVector};

use crate::error::MathError;
use crate::multidim::{
    checked_jacobian, drive, newton_step, StepStrategy, VectorRootFinder, VectorSolverConfig,
    VectorSolverResult,
};

/// Broyden's method: a rank-one updated Jacobian approximation.
///
/// Starts from `B_0 = J(x_0)` and after each step applies
///
/// ```text
/// B_{k+1} = B_k + (Δf - B_k Δx) Δxᵀ / (Δxᵀ Δx)
/// ```
///
/// then solves `B_{k+1} Δx = -f`. The Jacobian is evaluated once.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroydenVectorRootFinder;

struct RankOneJacobian {
    estimate: DMatrix<f64>,
}

impl StepStrategy for RankOneJacobian {
    fn initialize<J, E>(
        &mut self,
        x: &DVector<f64>,
        jacobian: &J,
        _config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        self.estimate = checked_jacobian(jacobian, x)?;
        Ok(())
    }

    fn direction<J, E>(
        &mut self,
        _x: &DVector<f64>,
        fx: &DVector<f64>,
        _jacobian: &J,
        config: &VectorSolverConfig,
    ) -> Result<DVector<f64>, E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        Ok(newton_step(&self.estimate, fx, config)?)
    }

    fn update<J, E>(
        &mut self,
        step: &DVector<f64>,
        value_change: &DVector<f64>,
        _x_new: &DVector<f64>,
        _jacobian: &J,
        _config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        let step_squared = step.dot(step);
        if step_squared > 0.0 {
            let mismatch = value_change - &self.estimate * step;
            self.estimate += mismatch * step.transpose() / step_squared;
        }
        Ok(())
    }
}

impl VectorRootFinder for BroydenVectorRootFinder {
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
        E: From<MathError>,
    {
        drive(
            self.name(),
            RankOneJacobian {
                estimate: DMatrix::zeros(0, 0),
            },
            f,
            jacobian,
            start,
            config,
        )
    }

    fn name(&self) -> &'static str {
        "Broyden"
    }
}
