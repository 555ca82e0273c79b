//! Newton's method for systems.

use nalgebra::{DMatrix, DVector};

use crate::error::MathError;
use crate::multidim::{
    checked_jacobian, drive, newton_step, StepStrategy, VectorRootFinder, VectorSolverConfig,
    VectorSolverResult,
};

/// Newton's method: solves `J(x) Δx = -f(x)` with a fresh Jacobian every iteration.
///
/// Quadratic convergence near a regular root at the cost of one Jacobian per
/// iteration. With a finite-difference Jacobian that is `n` (forward) or `2n`
/// (central) extra function evaluations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonVectorRootFinder;

struct FullJacobian;

impl StepStrategy for FullJacobian {
    fn initialize<J, E>(
        &mut self,
        _x: &DVector<f64>,
        _jacobian: &J,
        _config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        Ok(())
    }

    fn direction<J, E>(
        &mut self,
        x: &DVector<f64>,
        fx: &DVector<f64>,
        jacobian: &J,
        config: &VectorSolverConfig,
    ) -> Result<DVector<f64>, E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        let matrix = checked_jacobian(jacobian, x)?;
        Ok(newton_step(&matrix, fx, config)?)
    }

    fn update<J, E>(
        &mut self,
        _step: &DVector<f64>,
        _value_change: &DVector<f64>,
        _x_new: &DVector<f64>,
        _jacobian: &J,
        _config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        Ok(())
    }
}

impl VectorRootFinder for NewtonVectorRootFinder {
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
        drive(self.name(), FullJacobian, f, jacobian, start, config)
    }

    fn name(&self) -> &'static str {
        "Newton"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MathResult;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_convergence_on_linear_system() {
        // A linear system is solved exactly by the first Newton step.
        let f = |v: &DVector<f64>| -> MathResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![
                3.0 * v[0] + v[1] - 9.0,
                v[0] + 2.0 * v[1] - 8.0,
            ]))
        };
        let start = DVector::from_vec(vec![0.0, 0.0]);

        let result = NewtonVectorRootFinder
            .find_root(f, &start, &VectorSolverConfig::default())
            .unwrap();

        assert_eq!(result.iterations, 1);
        assert_relative_eq!(result.root[0], 2.0, epsilon = 1e-8);
        assert_relative_eq!(result.root[1], 3.0, epsilon = 1e-8);
    }

    #[test]
    fn test_name() {
        assert_eq!(NewtonVectorRootFinder.name(), "Newton");
    }
}
