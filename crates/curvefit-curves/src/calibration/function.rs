//! Pricing discrepancies as a vector function of the node yields.

use nalgebra::DVector;

use crate::calibration::data::CalibrationData;
use crate::error::{CurveError, CurveResult};
use crate::pricing::InstrumentCalculator;

/// `f_i(x) = value_i(curves(x)) - target_i`.
#[derive(Clone, Copy)]
pub struct CurveCalibrationFunction<'a> {
    data: &'a CalibrationData,
    calculator: &'a dyn InstrumentCalculator,
}

impl<'a> CurveCalibrationFunction<'a> {
    /// Creates the function for a problem and a calculator.
    #[must_use]
    pub fn new(data: &'a CalibrationData, calculator: &'a dyn InstrumentCalculator) -> Self {
        Self { data, calculator }
    }

    /// The problem being solved.
    #[must_use]
    pub fn data(&self) -> &'a CalibrationData {
        self.data
    }

    /// Evaluates the discrepancies at `x`.
    pub fn evaluate(&self, x: &DVector<f64>) -> CurveResult<DVector<f64>> {
        let curves = self.data.build_curves(x.as_slice())?;
        let values = self
            .data
            .instruments()
            .iter()
            .zip(self.data.market_values())
            .map(|(instrument, target)| {
                let value = self.calculator.value(instrument, &curves)? - target;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(CurveError::numerical_failure(format!(
                        "{} does not price to a finite value",
                        instrument.label()
                    )))
                }
            })
            .collect::<CurveResult<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }
}

impl std::fmt::Debug for CurveCalibrationFunction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveCalibrationFunction")
            .field("calculator", &self.calculator.name())
            .field("parameters", &self.data.parameter_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::CurveBundle;
    use crate::calibration::data::CurveNodeSpec;
    use crate::instruments::{Cash, Instrument};
    use crate::interpolation::InterpolationMethod;
    use crate::pricing::{ParRateCalculator, PresentValueCalculator};
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_at_generating_curve() {
        let times = vec![1.0, 2.0, 3.0];
        let yields = [0.02, 0.025, 0.03];
        let spec = CurveNodeSpec::new("OIS", times.clone(), InterpolationMethod::Linear);
        let curves: CurveBundle = [spec.build(&yields).unwrap()].into_iter().collect();

        let instruments: Vec<Instrument> = times
            .iter()
            .map(|&t| Instrument::Cash(Cash::new("OIS", t, 0.0)))
            .collect();
        let quotes: Vec<f64> = instruments
            .iter()
            .map(|i| ParRateCalculator.value(i, &curves).unwrap())
            .collect();

        let data =
            CalibrationData::new(instruments, quotes, vec![spec], CurveBundle::new()).unwrap();
        let f = CurveCalibrationFunction::new(&data, &ParRateCalculator);

        let at_root = f.evaluate(&DVector::from_column_slice(&yields)).unwrap();
        assert!(at_root.amax() < 1e-15);

        let off = f.evaluate(&DVector::from_element(3, 0.01)).unwrap();
        assert!(off.iter().all(|v| *v < 0.0));
    }

    #[test]
    fn test_present_value_target_is_zero() {
        let spec = CurveNodeSpec::new("OIS", vec![1.0], InterpolationMethod::Linear);
        let cash = Instrument::Cash(Cash::new("OIS", 1.0, 0.05));
        let data =
            CalibrationData::new(vec![cash], vec![0.0], vec![spec], CurveBundle::new()).unwrap();
        let f = CurveCalibrationFunction::new(&data, &PresentValueCalculator);

        let root = 0.05f64.ln_1p();
        let value = f.evaluate(&DVector::from_element(1, root)).unwrap();
        assert_relative_eq!(value[0], 0.0, epsilon = 1e-15);
    }
}
