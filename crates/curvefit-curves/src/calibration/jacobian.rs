//! Analytic Jacobian of the calibration function.

use nalgebra::{DMatrix, DVector};

use crate::bundle::CurveBundle;
use crate::calibration::config::NodeSensitivity;
use crate::calibration::data::CalibrationData;
use crate::curve::{YieldCurve, DEFAULT_NODE_BUMP};
use crate::error::{CurveError, CurveResult};
use crate::pricing::InstrumentCalculator;

/// `J_ij = ∂value_i / ∂x_j`, assembled from calculator sensitivities.
///
/// Each instrument reports `∂value / ∂zero_rate(t)` per curve. Those are
/// pushed onto the curve's nodes with the curve's node sensitivities:
///
/// ```text
/// J_ij = Σ_t  ∂value_i/∂z(t) · ∂z(t)/∂y_j
/// ```
#[derive(Clone, Copy)]
pub struct CurveCalibrationJacobian<'a> {
    data: &'a CalibrationData,
    calculator: &'a dyn InstrumentCalculator,
    node_sensitivity: NodeSensitivity,
}

impl<'a> CurveCalibrationJacobian<'a> {
    /// Creates the Jacobian for a problem and a calculator.
    #[must_use]
    pub fn new(
        data: &'a CalibrationData,
        calculator: &'a dyn InstrumentCalculator,
        node_sensitivity: NodeSensitivity,
    ) -> Self {
        Self {
            data,
            calculator,
            node_sensitivity,
        }
    }

    /// Jacobian with respect to the unknown node yields, `n x n`.
    pub fn evaluate(&self, x: &DVector<f64>) -> CurveResult<DMatrix<f64>> {
        let curves = self.data.build_curves(x.as_slice())?;
        let n = self.data.parameter_count();

        let mut columns = Vec::with_capacity(self.data.unknown_curves().len());
        for spec in self.data.unknown_curves() {
            let (offset, _) = self
                .data
                .position(&spec.name)
                .ok_or_else(|| CurveError::curve_not_found(&spec.name))?;
            columns.push((curves.get(&spec.name)?, offset));
        }

        let mut jacobian = DMatrix::zeros(n, n);
        self.fill(&curves, &columns, &mut jacobian)?;
        Ok(jacobian)
    }

    /// Jacobian with respect to the node yields of the known curve `name`, `n x m`.
    pub fn known_curve_jacobian(&self, x: &DVector<f64>, name: &str) -> CurveResult<DMatrix<f64>> {
        let known = self.data.known_curves().get(name)?;
        let curves = self.data.build_curves(x.as_slice())?;
        let mut jacobian = DMatrix::zeros(self.data.parameter_count(), known.len());
        self.fill(&curves, &[(known, 0)], &mut jacobian)?;
        Ok(jacobian)
    }

    /// Adds each `(curve, offset)` node contribution into columns `offset..offset + curve.len()`.
    fn fill(
        &self,
        curves: &CurveBundle,
        columns: &[(&YieldCurve, usize)],
        jacobian: &mut DMatrix<f64>,
    ) -> CurveResult<()> {
        for (row, instrument) in self.data.instruments().iter().enumerate() {
            let sensitivities = self.calculator.sensitivities(instrument, curves)?;
            for &(curve, offset) in columns {
                let Some(points) = sensitivities.get(curve.name()) else {
                    continue;
                };
                for &(t, dv) in points {
                    let weights = match self.node_sensitivity {
                        NodeSensitivity::Analytic => curve.node_sensitivities(t)?,
                        NodeSensitivity::FiniteDifference => {
                            curve.node_sensitivities_fd(t, DEFAULT_NODE_BUMP)?
                        }
                    };
                    for (j, w) in weights.iter().enumerate() {
                        jacobian[(row, offset + j)] += dv * w;
                    }
                }
            }
        }
        if jacobian.iter().any(|v| !v.is_finite()) {
            return Err(CurveError::numerical_failure(
                "calibration Jacobian has non-finite entries",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CurveCalibrationJacobian<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveCalibrationJacobian")
            .field("calculator", &self.calculator.name())
            .field("node_sensitivity", &self.node_sensitivity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::data::CurveNodeSpec;
    use crate::calibration::function::CurveCalibrationFunction;
    use crate::instruments::{Cash, FixedFloatSwap, Fra, Instrument};
    use crate::interpolation::InterpolationMethod;
    use crate::pricing::{ParRateCalculator, PresentValueCalculator};
    use approx::assert_relative_eq;
    use curvefit_math::differentiation::Differentiator;

    fn problem(method: InterpolationMethod) -> CalibrationData {
        let known: CurveBundle = [YieldCurve::new(
            "OIS",
            vec![1.0, 5.0],
            vec![0.02, 0.03],
            InterpolationMethod::Linear,
        )
        .unwrap()]
        .into_iter()
        .collect();

        let instruments = vec![
            Instrument::Cash(Cash::new("LIBOR", 0.5, 0.025)),
            Instrument::Fra(Fra::new("OIS", "LIBOR", 0.5, 1.0, 0.028)),
            Instrument::Swap(FixedFloatSwap::new("OIS", "LIBOR", 2.0, 0.03)),
            Instrument::Swap(FixedFloatSwap::new("OIS", "LIBOR", 5.0, 0.033)),
        ];
        CalibrationData::new(
            instruments,
            vec![0.025, 0.028, 0.03, 0.033],
            vec![CurveNodeSpec::new("LIBOR", vec![0.5, 1.0, 2.0, 5.0], method)],
            known,
        )
        .unwrap()
    }

    #[test]
    fn test_matches_finite_differences() {
        let x = DVector::from_vec(vec![0.024, 0.027, 0.031, 0.034]);
        for method in [InterpolationMethod::Linear, InterpolationMethod::CubicSpline] {
            let data = problem(method);
            for calculator in [
                &ParRateCalculator as &dyn InstrumentCalculator,
                &PresentValueCalculator,
            ] {
                let f = CurveCalibrationFunction::new(&data, calculator);
                let numeric = Differentiator::default()
                    .jacobian(|v: &DVector<f64>| f.evaluate(v), &x)
                    .unwrap();

                for mode in [NodeSensitivity::Analytic, NodeSensitivity::FiniteDifference] {
                    let analytic = CurveCalibrationJacobian::new(&data, calculator, mode)
                        .evaluate(&x)
                        .unwrap();
                    for (a, b) in analytic.iter().zip(numeric.iter()) {
                        assert_relative_eq!(*a, *b, epsilon = 1e-6);
                    }
                }
            }
        }
    }

    #[test]
    fn test_known_curve_jacobian() {
        let data = problem(InterpolationMethod::Linear);
        let x = DVector::from_vec(vec![0.024, 0.027, 0.031, 0.034]);
        let jac = CurveCalibrationJacobian::new(&data, &ParRateCalculator, NodeSensitivity::Analytic);

        let k = jac.known_curve_jacobian(&x, "OIS").unwrap();
        assert_eq!(k.shape(), (4, 2));
        // Cash and FRA rates do not depend on the discount curve.
        assert_eq!(k.row(0).amax(), 0.0);
        assert_eq!(k.row(1).amax(), 0.0);
        assert!(k.row(3).amax() > 0.0);

        assert!(matches!(
            jac.known_curve_jacobian(&x, "EUR"),
            Err(CurveError::CurveNotFound { .. })
        ));
    }
}
