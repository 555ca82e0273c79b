//! Calibration request files.
//!
//! A request is a TOML document describing the curves to solve, the
//! instruments that pin them down and any market data held fixed:
//!
//! ```toml
//! calculator = "par_rate"
//!
//! [config]
//! root_finder = "newton"
//!
//! [[curves]]
//! name = "USD-OIS"
//! times = [1.0, 2.0, 5.0]
//!
//! [[instruments]]
//! type = "cash"
//! curve = "USD-OIS"
//! maturity = 1.0
//! rate = 0.030
//! ```
//!
//! Chained calibrations list `[[stages]]` instead of top-level `curves` and
//! `instruments`; each stage sees every curve solved before it.

use std::path::Path;
use std::sync::Arc;

use curvefit_curves::calibration::{CalibrationConfig, CalibrationData, CalibrationStage, CurveNodeSpec};
use curvefit_curves::instruments::Instrument;
use curvefit_curves::pricing::{InstrumentCalculator, ParRateCalculator, PresentValueCalculator};
use curvefit_curves::{CurveBundle, FxMatrix, InterpolationMethod, YieldCurve};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Which calculator turns instruments into equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorKind {
    /// Reprice every instrument to its quote.
    #[default]
    ParRate,
    /// Bring every instrument's present value to zero.
    PresentValue,
}

impl CalculatorKind {
    /// The calculator instance.
    pub fn calculator(self) -> Arc<dyn InstrumentCalculator> {
        match self {
            Self::ParRate => Arc::new(ParRateCalculator),
            Self::PresentValue => Arc::new(PresentValueCalculator),
        }
    }
}

/// A curve held fixed during calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownCurve {
    /// Curve name.
    pub name: String,
    /// Node times.
    pub times: Vec<f64>,
    /// Zero yields at the nodes.
    pub yields: Vec<f64>,
    /// Interpolation on zero yields.
    #[serde(default)]
    pub interpolation: InterpolationMethod,
}

/// One FX quote: a unit of `currency` is worth `rate` units of `against`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxQuote {
    /// Currency being added.
    pub currency: String,
    /// Currency already in the matrix (or the base, for the first quote).
    pub against: String,
    /// Exchange rate.
    pub rate: f64,
}

/// A stage of a chained calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRequest {
    /// Stage label.
    pub name: String,
    /// Curves solved in this stage.
    #[serde(default)]
    pub curves: Vec<CurveNodeSpec>,
    /// Instruments, one per node.
    #[serde(default)]
    pub instruments: Vec<Instrument>,
}

/// A parsed request file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationRequest {
    /// Calculator for every instrument.
    pub calculator: CalculatorKind,
    /// Calibration settings, overriding the user defaults when present.
    pub config: Option<CalibrationConfig>,
    /// Curves to solve in a single calibration.
    pub curves: Vec<CurveNodeSpec>,
    /// Curves held fixed.
    pub known_curves: Vec<KnownCurve>,
    /// FX quotes, building one matrix based on the first quote's `against` currency.
    pub fx_rates: Vec<FxQuote>,
    /// Instruments of a single calibration.
    pub instruments: Vec<Instrument>,
    /// Stages of a chained calibration.
    pub stages: Vec<StageRequest>,
}

impl CalibrationRequest {
    /// Parses a request document.
    pub fn from_toml_str(s: &str) -> CliResult<Self> {
        let request: Self = toml::from_str(s).map_err(|e| CliError::Request(e.to_string()))?;
        request.check_shape()?;
        Ok(request)
    }

    /// Reads a request file.
    pub fn from_file(path: impl AsRef<Path>) -> CliResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CliError::Request(format!("cannot read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded calibration request");
        Self::from_toml_str(&contents)
    }

    /// Single calibrations and chains are mutually exclusive.
    fn check_shape(&self) -> CliResult<()> {
        let single = !self.curves.is_empty() || !self.instruments.is_empty();
        match (single, self.is_chain()) {
            (true, true) => Err(CliError::Request(
                "use either top-level curves/instruments or [[stages]], not both".into(),
            )),
            (false, false) => Err(CliError::Request("request has no curves to calibrate".into())),
            _ => Ok(()),
        }
    }

    /// Whether the request describes a chained calibration.
    pub fn is_chain(&self) -> bool {
        !self.stages.is_empty()
    }

    /// The FX matrix, when any FX quotes are given.
    pub fn fx_matrix(&self) -> CliResult<Option<FxMatrix>> {
        let Some(first) = self.fx_rates.first() else {
            return Ok(None);
        };
        let mut fx = FxMatrix::new(first.against.clone());
        for quote in &self.fx_rates {
            fx.add_rate(quote.currency.clone(), &quote.against, quote.rate)?;
        }
        Ok(Some(fx))
    }

    /// Known curves plus FX matrix.
    pub fn known_bundle(&self) -> CliResult<CurveBundle> {
        let mut bundle = CurveBundle::new();
        for known in &self.known_curves {
            bundle.insert(YieldCurve::new(
                known.name.clone(),
                known.times.clone(),
                known.yields.clone(),
                known.interpolation,
            )?)?;
        }
        Ok(match self.fx_matrix()? {
            Some(fx) => bundle.with_fx(fx),
            None => bundle,
        })
    }

    /// The single calibration problem.
    pub fn calibration_data(&self, calculator: &dyn InstrumentCalculator) -> CliResult<CalibrationData> {
        let targets = targets(&self.instruments, calculator);
        Ok(CalibrationData::new(
            self.instruments.clone(),
            targets,
            self.curves.clone(),
            self.known_bundle()?,
        )?)
    }

    /// The chain stages, in order.
    pub fn stages(&self, calculator: &dyn InstrumentCalculator) -> Vec<CalibrationStage> {
        self.stages
            .iter()
            .map(|stage| {
                CalibrationStage::new(
                    stage.name.clone(),
                    stage.curves.clone(),
                    stage.instruments.clone(),
                    targets(&stage.instruments, calculator),
                )
            })
            .collect()
    }

    /// Number of unknown node yields across all curves.
    pub fn node_count(&self) -> usize {
        self.curves
            .iter()
            .chain(self.stages.iter().flat_map(|s| &s.curves))
            .map(CurveNodeSpec::len)
            .sum()
    }
}

fn targets(instruments: &[Instrument], calculator: &dyn InstrumentCalculator) -> Vec<f64> {
    instruments.iter().map(|i| calculator.target(i)).collect()
}
