//! Broyden's method on the inverse Jacobian (Sherman-Morrison update).

use nalgebra::{DMatrix, DVector};

use crate::error::MathError;
use crate::linear_algebra::{decompose, DecompositionMethod};
use crate::multidim::{
    checked_jacobian, drive, StepStrategy, VectorRootFinder, VectorSolverConfig,
    VectorSolverResult,
};

/// Denominators smaller than this (relative to `|Δx| |H Δf|`) trigger a re-seed.
const DENOMINATOR_TOLERANCE: f64 = 1e-14;

/// Broyden's method carried out on the inverse Jacobian.
///
/// Starts from `H_0 = J(x_0)^{-1}`, steps with `Δx = -H f` and updates
///
/// ```text
/// H_{k+1} = H_k + (Δx - H_k Δf) (Δxᵀ H_k) / (Δxᵀ H_k Δf)
/// ```
///
/// so no linear system is solved after the first iteration. When the
/// denominator vanishes the inverse is rebuilt from the true Jacobian at the
/// current iterate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShermanMorrisonVectorRootFinder;

struct InverseJacobian {
    inverse: DMatrix<f64>,
}

impl InverseJacobian {
    fn seed<J, E>(
        &mut self,
        x: &DVector<f64>,
        jacobian: &J,
        config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        let matrix = checked_jacobian(jacobian, x)?;
        self.inverse = match decompose(&matrix, config.decomposition).and_then(|d| d.inverse()) {
            Ok(inverse) => inverse,
            Err(MathError::SingularMatrix)
                if config.svd_fallback && config.decomposition == DecompositionMethod::Lu =>
            {
                log::warn!("singular Jacobian, seeding the inverse with the SVD pseudo-inverse");
                decompose(&matrix, DecompositionMethod::Svd)?.inverse()?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(())
    }
}

impl StepStrategy for InverseJacobian {
    fn initialize<J, E>(
        &mut self,
        x: &DVector<f64>,
        jacobian: &J,
        config: &VectorSolverConfig,
    ) -> Result<(), E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        self.seed(x, jacobian, config)
    }

    fn direction<J, E>(
        &mut self,
        _x: &DVector<f64>,
        fx: &DVector<f64>,
        _jacobian: &J,
        _config: &VectorSolverConfig,
    ) -> Result<DVector<f64>, E>
    where
        J: Fn(&DVector<f64>) -> Result<DMatrix<f64>, E>,
        E: From<MathError>,
    {
        Ok(-(&self.inverse * fx))
    }

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
        E: From<MathError>,
    {
        let h_df = &self.inverse * value_change;
        let denominator = step.dot(&h_df);

        if denominator.abs() <= DENOMINATOR_TOLERANCE * step.norm() * h_df.norm()
            || !denominator.is_finite()
        {
            log::warn!("Sherman-Morrison denominator vanished, re-seeding from the Jacobian");
            return self.seed(x_new, jacobian, config);
        }

        let row = step.transpose() * &self.inverse;
        self.inverse += (step - h_df) * row / denominator;
        Ok(())
    }
}

impl VectorRootFinder for ShermanMorrisonVectorRootFinder {
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
            InverseJacobian {
                inverse: DMatrix::zeros(0, 0),
            },
            f,
            jacobian,
            start,
            config,
        )
    }

    fn name(&self) -> &'static str {
        "Sherman-Morrison"
    }
}
