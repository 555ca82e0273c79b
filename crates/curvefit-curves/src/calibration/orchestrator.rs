//! Bootstrap orchestration: solve, unpack, chain.

use std::collections::BTreeMap;
use std::sync::Arc;

use curvefit_math::differentiation::Differentiator;
use curvefit_math::linear_algebra::{decompose, DecompositionMethod, DecompositionResult};
use curvefit_math::multidim::{
    BroydenVectorRootFinder, NewtonVectorRootFinder, ShermanMorrisonVectorRootFinder,
    VectorRootFinder, VectorSolverConfig, VectorSolverResult,
};
use curvefit_math::MathError;
use nalgebra::{DMatrix, DVector};

use crate::bundle::CurveBundle;
use crate::calibration::config::{CalibrationConfig, JacobianMethod, RootFinderKind};
use crate::calibration::data::{CalibrationData, CurveNodeSpec};
use crate::calibration::function::CurveCalibrationFunction;
use crate::calibration::jacobian::CurveCalibrationJacobian;
use crate::error::{CurveError, CurveResult};
use crate::fx::FxMatrix;
use crate::instruments::Instrument;
use crate::pricing::InstrumentCalculator;

/// Result of one calibration.
#[derive(Debug, Clone)]
pub struct CalibrationOutput {
    /// The calibrated curves (known curves are not repeated here).
    pub curves: CurveBundle,
    /// Solved node yields, in unknown-vector order.
    pub parameters: Vec<f64>,
    /// Root finder iterations.
    pub iterations: u32,
    /// Max-norm of the pricing discrepancies at the solution.
    pub residual: f64,
    /// Root finder used.
    pub root_finder: RootFinderKind,
    /// Final `n x n` Jacobian, flattened row-major, when requested.
    pub jacobian: Option<Vec<f64>>,
}

impl CalibrationOutput {
    /// Number of solved parameters.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// The final Jacobian as a matrix.
    #[must_use]
    pub fn jacobian_matrix(&self) -> Option<DMatrix<f64>> {
        let n = self.parameters.len();
        self.jacobian
            .as_ref()
            .map(|values| DMatrix::from_row_slice(n, n, values))
    }
}

/// One stage of a chained calibration.
#[derive(Debug, Clone)]
pub struct CalibrationStage {
    /// Stage label.
    pub name: String,
    /// Curves solved in this stage.
    pub unknown_curves: Vec<CurveNodeSpec>,
    /// Instruments, one per unknown node.
    pub instruments: Vec<Instrument>,
    /// Targets, one per instrument.
    pub market_values: Vec<f64>,
    /// FX rates introduced by this stage.
    pub fx: Option<FxMatrix>,
}

impl CalibrationStage {
    /// Creates a stage.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        unknown_curves: Vec<CurveNodeSpec>,
        instruments: Vec<Instrument>,
        market_values: Vec<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            unknown_curves,
            instruments,
            market_values,
            fx: None,
        }
    }

    /// Adds FX rates that this and later stages can use.
    #[must_use]
    pub fn with_fx(mut self, fx: FxMatrix) -> Self {
        self.fx = Some(fx);
        self
    }
}

/// Output of one chained stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Stage label.
    pub name: String,
    /// The stage's calibration.
    pub output: CalibrationOutput,
    /// `∂x_stage / ∂x_upstream = -J⁻¹ K` for each curve calibrated in an earlier stage.
    pub transitions: BTreeMap<String, DMatrix<f64>>,
}

/// Output of a chained calibration.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Per-stage results, in order.
    pub stages: Vec<StageOutput>,
    /// Initial known curves plus every calibrated curve.
    pub curves: CurveBundle,
}

/// Drives calibrations: builds the adapters, runs the configured root finder
/// and turns the solution back into curves.
///
/// # Example
///
/// ```rust
/// use curvefit_curves::calibration::{BootstrapOrchestrator, CalibrationData, CurveNodeSpec};
/// use curvefit_curves::instruments::{Cash, Instrument};
/// use curvefit_curves::pricing::ParRateCalculator;
/// use curvefit_curves::{CurveBundle, InterpolationMethod};
///
/// let instruments = vec![
///     Instrument::Cash(Cash::new("USD-OIS", 1.0, 0.030)),
///     Instrument::Cash(Cash::new("USD-OIS", 2.0, 0.032)),
/// ];
/// let data = CalibrationData::new(
///     instruments,
///     vec![0.030, 0.032],
///     vec![CurveNodeSpec::new("USD-OIS", vec![1.0, 2.0], InterpolationMethod::Linear)],
///     CurveBundle::new(),
/// )
/// .unwrap();
///
/// let output = BootstrapOrchestrator::new(ParRateCalculator)
///     .calibrate(&data, None)
///     .unwrap();
/// let curve = output.curves.get("USD-OIS").unwrap();
/// assert!((curve.discount_factor(1.0).unwrap() - 1.0 / 1.03).abs() < 1e-6);
/// ```
#[derive(Clone)]
pub struct BootstrapOrchestrator {
    calculator: Arc<dyn InstrumentCalculator>,
    config: CalibrationConfig,
}

impl BootstrapOrchestrator {
    /// Creates an orchestrator with the default configuration.
    pub fn new(calculator: impl InstrumentCalculator + 'static) -> Self {
        Self {
            calculator: Arc::new(calculator),
            config: CalibrationConfig::default(),
        }
    }

    /// Creates an orchestrator from a shared calculator.
    #[must_use]
    pub fn from_shared(calculator: Arc<dyn InstrumentCalculator>) -> Self {
        Self {
            calculator,
            config: CalibrationConfig::default(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: CalibrationConfig) -> Self {
        self.config = config;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// The calculator.
    #[must_use]
    pub fn calculator(&self) -> &dyn InstrumentCalculator {
        self.calculator.as_ref()
    }

    /// Whether calibration will use the analytic Jacobian.
    #[must_use]
    pub fn uses_analytic_jacobian(&self) -> bool {
        self.config.jacobian == JacobianMethod::Analytic && self.calculator.supports_sensitivities()
    }

    /// Calibrates the unknown curves of `data`.
    ///
    /// Starts from `start`, or from a flat vector at `initial_rate` when none is given.
    ///
    /// # Errors
    ///
    /// - [`CurveError::InvalidArgument`] for a bad configuration or start vector
    /// - [`CurveError::CalibrationFailure`] when the root finder does not converge
    /// - [`CurveError::NumericalFailure`] for singular systems without fallback
    ///   or non-finite values
    /// - any pricing error raised by the calculator
    pub fn calibrate(
        &self,
        data: &CalibrationData,
        start: Option<&DVector<f64>>,
    ) -> CurveResult<CalibrationOutput> {
        self.config.validate()?;
        let n = data.parameter_count();
        let start = match start {
            Some(s) if s.len() != n => {
                return Err(CurveError::invalid_argument(format!(
                    "start vector has {} entries, expected {n}",
                    s.len()
                )))
            }
            Some(s) => s.clone(),
            None => data.flat_start(self.config.initial_rate),
        };

        let span = tracing::info_span!(
            "calibrate",
            calculator = self.calculator.name(),
            root_finder = %self.config.root_finder,
            parameters = n,
        );
        let _guard = span.enter();

        let solver_config = self.config.solver_config();
        let function = CurveCalibrationFunction::new(data, self.calculator.as_ref());
        let f = |x: &DVector<f64>| function.evaluate(x);

        let analytic = self.uses_analytic_jacobian();
        if self.config.jacobian == JacobianMethod::Analytic && !analytic {
            tracing::warn!(
                calculator = self.calculator.name(),
                "calculator has no analytic sensitivities, using finite differences"
            );
        }
        tracing::debug!(analytic, "starting calibration");

        let solved = if analytic {
            let jacobian =
                CurveCalibrationJacobian::new(data, self.calculator.as_ref(), self.config.node_sensitivity);
            self.solve(f, |x: &DVector<f64>| jacobian.evaluate(x), &start, &solver_config)
        } else {
            let jacobian = solver_config.differentiator.differentiate(f);
            self.solve(f, jacobian, &start, &solver_config)
        };

        let result = match solved {
            Ok(result) => result,
            Err(CurveError::CalibrationFailure {
                iterations,
                residual,
                ..
            }) => {
                tracing::warn!(iterations, residual, "calibration did not converge");
                return Err(CurveError::calibration_failed(
                    iterations,
                    residual,
                    format!("{} root finder did not converge", self.config.root_finder),
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "calibration failed");
                return Err(e);
            }
        };

        let jacobian = if self.config.return_jacobian {
            let matrix = self.jacobian_at(data, &result.root)?;
            Some(matrix.transpose().as_slice().to_vec())
        } else {
            None
        };

        tracing::info!(
            iterations = result.iterations,
            residual = result.residual,
            "calibration converged"
        );

        Ok(CalibrationOutput {
            curves: data.calibrated_curves(result.root.as_slice())?,
            parameters: result.root.iter().copied().collect(),
            iterations: result.iterations,
            residual: result.residual,
            root_finder: self.config.root_finder,
            jacobian,
        })
    }

    fn solve<F, J>(
        &self,
        f: F,
        jacobian: J,
        start: &DVector<f64>,
        config: &VectorSolverConfig,
    ) -> CurveResult<VectorSolverResult>
    where
        F: Fn(&DVector<f64>) -> CurveResult<DVector<f64>>,
        J: Fn(&DVector<f64>) -> CurveResult<DMatrix<f64>>,
    {
        match self.config.root_finder {
            RootFinderKind::Newton => {
                NewtonVectorRootFinder.find_root_with_jacobian(f, jacobian, start, config)
            }
            RootFinderKind::Broyden => {
                BroydenVectorRootFinder.find_root_with_jacobian(f, jacobian, start, config)
            }
            RootFinderKind::ShermanMorrison => {
                ShermanMorrisonVectorRootFinder.find_root_with_jacobian(f, jacobian, start, config)
            }
        }
    }

    /// Calibration Jacobian at `x`, analytic or by finite differences per the configuration.
    pub fn jacobian_at(&self, data: &CalibrationData, x: &DVector<f64>) -> CurveResult<DMatrix<f64>> {
        if self.uses_analytic_jacobian() {
            CurveCalibrationJacobian::new(data, self.calculator.as_ref(), self.config.node_sensitivity)
                .evaluate(x)
        } else {
            let function = CurveCalibrationFunction::new(data, self.calculator.as_ref());
            Differentiator::default().jacobian(|v: &DVector<f64>| function.evaluate(v), x)
        }
    }

    /// Sensitivity of the pricing discrepancies to the nodes of the known curve `name`.
    pub fn known_curve_jacobian_at(
        &self,
        data: &CalibrationData,
        x: &DVector<f64>,
        name: &str,
    ) -> CurveResult<DMatrix<f64>> {
        if self.uses_analytic_jacobian() {
            return CurveCalibrationJacobian::new(
                data,
                self.calculator.as_ref(),
                self.config.node_sensitivity,
            )
            .known_curve_jacobian(x, name);
        }

        let curve = data.known_curves().get(name)?;
        let yields = DVector::from_column_slice(curve.yields());
        Differentiator::default().jacobian(
            |y: &DVector<f64>| {
                let bumped = data.with_known_curve(curve.with_yields(y.as_slice().to_vec())?)?;
                CurveCalibrationFunction::new(&bumped, self.calculator.as_ref()).evaluate(x)
            },
            &yields,
        )
    }

    /// Factorises the calibration Jacobian, retrying with SVD when LU finds it singular.
    fn factorise(&self, jacobian: &DMatrix<f64>) -> CurveResult<DecompositionResult> {
        let method: DecompositionMethod = self.config.decomposition.into();
        match decompose(jacobian, method) {
            Ok(d) => Ok(d),
            Err(MathError::SingularMatrix)
                if self.config.svd_fallback && method == DecompositionMethod::Lu =>
            {
                tracing::warn!("singular calibration Jacobian, falling back to SVD");
                Ok(decompose(jacobian, DecompositionMethod::Svd)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Calibrates stages in order; each stage sees every curve calibrated before it.
    ///
    /// For every stage the output carries the transition matrices
    /// `-J⁻¹ K` to each curve calibrated in an earlier stage, where `J` is
    /// the stage Jacobian and `K` its sensitivity to the upstream curve's
    /// nodes. Curves in `initial` are treated as market data and get no
    /// transition matrix.
    pub fn calibrate_chain(
        &self,
        initial: &CurveBundle,
        stages: Vec<CalibrationStage>,
    ) -> CurveResult<ChainOutput> {
        let mut known = initial.clone();
        let mut upstream: Vec<String> = Vec::new();
        let mut outputs = Vec::with_capacity(stages.len());

        for stage in stages {
            tracing::info!(stage = %stage.name, "calibrating stage");
            if let Some(fx) = stage.fx {
                known = known.merged_with(&CurveBundle::new().with_fx(fx))?;
            }

            let data = CalibrationData::new(
                stage.instruments,
                stage.market_values,
                stage.unknown_curves,
                known.clone(),
            )?;
            let output = self.calibrate(&data, None)?;

            let mut transitions = BTreeMap::new();
            if !upstream.is_empty() {
                let x = DVector::from_column_slice(&output.parameters);
                let jacobian = match output.jacobian_matrix() {
                    Some(j) => j,
                    None => self.jacobian_at(&data, &x)?,
                };
                let factors = self.factorise(&jacobian)?;
                for name in &upstream {
                    let k = self.known_curve_jacobian_at(&data, &x, name)?;
                    transitions.insert(name.clone(), -factors.solve_matrix(&k)?);
                }
            }

            for curve in output.curves.iter() {
                known.insert(curve.clone())?;
                upstream.push(curve.name().to_string());
            }
            outputs.push(StageOutput {
                name: stage.name,
                output,
                transitions,
            });
        }

        Ok(ChainOutput {
            stages: outputs,
            curves: known,
        })
    }

    /// Calibrates independent problems, in parallel with the `parallel` feature.
    pub fn calibrate_all(&self, problems: &[CalibrationData]) -> Vec<CurveResult<CalibrationOutput>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            if problems.len() > 1 {
                return problems
                    .par_iter()
                    .map(|data| self.calibrate(data, None))
                    .collect();
            }
        }

        problems
            .iter()
            .map(|data| self.calibrate(data, None))
            .collect()
    }
}

impl std::fmt::Debug for BootstrapOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapOrchestrator")
            .field("calculator", &self.calculator.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::Cash;
    use crate::interpolation::InterpolationMethod;
    use crate::pricing::{CurveSensitivities, ParRateCalculator};
    use approx::assert_relative_eq;

    fn deposits() -> CalibrationData {
        let times = vec![0.5, 1.0, 2.0];
        let rates = vec![0.02, 0.022, 0.025];
        let instruments = times
            .iter()
            .zip(&rates)
            .map(|(&t, &r)| Instrument::Cash(Cash::new("OIS", t, r)))
            .collect();
        CalibrationData::new(
            instruments,
            rates,
            vec![CurveNodeSpec::new("OIS", times, InterpolationMethod::Linear)],
            CurveBundle::new(),
        )
        .unwrap()
    }

    fn tight() -> CalibrationConfig {
        CalibrationConfig::default().with_abs_tolerance(1e-12)
    }

    /// Par rates without analytic sensitivities.
    struct ValueOnly;

    impl InstrumentCalculator for ValueOnly {
        fn name(&self) -> &'static str {
            "ValueOnly"
        }
        fn value(&self, instrument: &Instrument, curves: &CurveBundle) -> CurveResult<f64> {
            ParRateCalculator.value(instrument, curves)
        }
        fn sensitivities(
            &self,
            _instrument: &Instrument,
            _curves: &CurveBundle,
        ) -> CurveResult<CurveSensitivities> {
            Err(CurveError::invalid_argument("no sensitivities"))
        }
        fn supports_sensitivities(&self) -> bool {
            false
        }
        fn target(&self, instrument: &Instrument) -> f64 {
            instrument.quote()
        }
    }

    #[test]
    fn test_deposit_curve_is_exact() {
        let output = BootstrapOrchestrator::new(ParRateCalculator)
            .with_config(tight())
            .calibrate(&deposits(), None)
            .unwrap();

        // Continuously compounded yield of a simple deposit rate.
        for (&t, &r) in [0.5_f64, 1.0, 2.0].iter().zip(&[0.02_f64, 0.022, 0.025]) {
            let expected = (r * t).ln_1p() / t;
            let actual = output.curves.get("OIS").unwrap().zero_rate(t).unwrap();
            assert_relative_eq!(actual, expected, epsilon = 1e-10);
        }
        let jac = output.jacobian_matrix().unwrap();
        assert_eq!(jac.shape(), (3, 3));
        // Each deposit only sees its own node.
        assert_eq!(jac[(0, 1)], 0.0);
        assert!(jac[(2, 2)] > 1.0);
    }

    #[test]
    fn test_falls_back_to_finite_differences() {
        let orchestrator = BootstrapOrchestrator::new(ValueOnly).with_config(tight());
        assert!(!orchestrator.uses_analytic_jacobian());

        let output = orchestrator.calibrate(&deposits(), None).unwrap();
        let reference = BootstrapOrchestrator::new(ParRateCalculator)
            .with_config(tight())
            .calibrate(&deposits(), None)
            .unwrap();
        for (a, b) in output.parameters.iter().zip(&reference.parameters) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_start_vector_length_checked() {
        let start = DVector::from_element(2, 0.01);
        let result = BootstrapOrchestrator::new(ParRateCalculator).calibrate(&deposits(), Some(&start));
        assert!(result.unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_without_jacobian_output() {
        let output = BootstrapOrchestrator::new(ParRateCalculator)
            .with_config(CalibrationConfig::default().with_return_jacobian(false))
            .calibrate(&deposits(), None)
            .unwrap();
        assert!(output.jacobian.is_none());
        assert!(output.jacobian_matrix().is_none());
    }

    #[test]
    fn test_calibrate_all() {
        let problems = vec![deposits(), deposits()];
        let results = BootstrapOrchestrator::new(ParRateCalculator).calibrate_all(&problems);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_ok));
    }
}
