//! Calibration problem definition.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::bundle::CurveBundle;
use crate::curve::{validate_node_times, YieldCurve};
use crate::error::{CurveError, CurveResult};
use crate::instruments::Instrument;
use crate::interpolation::InterpolationMethod;

/// Instrument times closer than this count as the same node.
const MATURITY_EPSILON: f64 = 1e-12;

/// Node grid of a curve to calibrate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveNodeSpec {
    /// Curve name.
    pub name: String,
    /// Strictly increasing node times.
    pub times: Vec<f64>,
    /// Interpolation on zero yields.
    #[serde(default)]
    pub interpolation: InterpolationMethod,
}

impl CurveNodeSpec {
    /// Creates a node grid.
    #[must_use]
    pub fn new(name: impl Into<String>, times: Vec<f64>, interpolation: InterpolationMethod) -> Self {
        Self {
            name: name.into(),
            times,
            interpolation,
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns true if there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Builds the curve for the given node yields.
    pub fn build(&self, yields: &[f64]) -> CurveResult<YieldCurve> {
        YieldCurve::new(
            self.name.clone(),
            self.times.clone(),
            yields.to_vec(),
            self.interpolation,
        )
    }
}

/// A validated calibration problem.
///
/// The unknown vector `x` is the concatenation of the node yields of the
/// unknown curves, in the order they were given. Every instrument
/// contributes one equation `value_i(curves(x)) - target_i = 0`.
#[derive(Debug, Clone)]
pub struct CalibrationData {
    instruments: Vec<Instrument>,
    market_values: Vec<f64>,
    unknown_curves: Vec<CurveNodeSpec>,
    known_curves: CurveBundle,
    offsets: Vec<usize>,
}

impl CalibrationData {
    /// Validates and assembles a calibration problem.
    ///
    /// # Errors
    ///
    /// - [`CurveError::InvalidArgument`] for empty inputs, mismatched target
    ///   counts, non-finite targets, invalid instruments, curve name clashes,
    ///   instrument currencies missing from the FX matrix, or two instruments
    ///   pinning the same unknown curve at the same maturity
    /// - [`CurveError::DuplicateNodeTime`] / [`CurveError::NonMonotonicNodes`] for bad node grids
    /// - [`CurveError::CurveNotFound`] when an instrument references an unknown curve name
    /// - [`CurveError::UnknownCurrency`] for FX forwards on currencies missing from the FX matrix
    /// - [`CurveError::Underdetermined`] / [`CurveError::Overdetermined`] when
    ///   node and instrument counts differ
    pub fn new(
        instruments: Vec<Instrument>,
        market_values: Vec<f64>,
        unknown_curves: Vec<CurveNodeSpec>,
        known_curves: CurveBundle,
    ) -> CurveResult<Self> {
        if instruments.is_empty() {
            return Err(CurveError::invalid_argument("no calibration instruments"));
        }
        if unknown_curves.is_empty() {
            return Err(CurveError::invalid_argument("no curves to calibrate"));
        }
        if market_values.len() != instruments.len() {
            return Err(CurveError::invalid_argument(format!(
                "{} market values for {} instruments",
                market_values.len(),
                instruments.len()
            )));
        }
        if let Some(v) = market_values.iter().find(|v| !v.is_finite()) {
            return Err(CurveError::invalid_argument(format!(
                "market value {v} is not finite"
            )));
        }

        let mut names = BTreeSet::new();
        for spec in &unknown_curves {
            validate_node_times(&spec.name, &spec.times, spec.interpolation)?;
            if !names.insert(spec.name.as_str()) {
                return Err(CurveError::invalid_argument(format!(
                    "curve '{}' is listed twice",
                    spec.name
                )));
            }
            if known_curves.contains(&spec.name) {
                return Err(CurveError::invalid_argument(format!(
                    "curve '{}' is both known and unknown",
                    spec.name
                )));
            }
        }

        for instrument in &instruments {
            instrument.validate()?;
            for name in instrument.curve_names() {
                if !names.contains(name) && !known_curves.contains(name) {
                    return Err(CurveError::curve_not_found(name));
                }
            }
            if let Instrument::FxForward(fx) = instrument {
                if fx.base_currency != fx.quote_currency {
                    let matrix = known_curves.fx_matrix().ok_or_else(|| {
                        CurveError::invalid_argument(format!(
                            "{} needs an FX matrix",
                            instrument.label()
                        ))
                    })?;
                    matrix.fx_rate(&fx.base_currency, &fx.quote_currency)?;
                }
            }
        }

        check_distinct_maturities(&instruments, &names)?;

        let nodes: usize = unknown_curves.iter().map(CurveNodeSpec::len).sum();
        match nodes.cmp(&instruments.len()) {
            std::cmp::Ordering::Greater => {
                return Err(CurveError::Underdetermined {
                    nodes,
                    instruments: instruments.len(),
                })
            }
            std::cmp::Ordering::Less => {
                return Err(CurveError::Overdetermined {
                    nodes,
                    instruments: instruments.len(),
                })
            }
            std::cmp::Ordering::Equal => {}
        }

        let offsets = unknown_curves
            .iter()
            .scan(0, |acc, spec| {
                let start = *acc;
                *acc += spec.len();
                Some(start)
            })
            .collect();

        Ok(Self {
            instruments,
            market_values,
            unknown_curves,
            known_curves,
            offsets,
        })
    }

    /// Instruments, in equation order.
    #[must_use]
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Targets, one per instrument.
    #[must_use]
    pub fn market_values(&self) -> &[f64] {
        &self.market_values
    }

    /// Curves to calibrate, in unknown-vector order.
    #[must_use]
    pub fn unknown_curves(&self) -> &[CurveNodeSpec] {
        &self.unknown_curves
    }

    /// Curves held fixed.
    #[must_use]
    pub fn known_curves(&self) -> &CurveBundle {
        &self.known_curves
    }

    /// Length of the unknown vector.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.instruments.len()
    }

    /// Offset and node count of an unknown curve within `x`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<(usize, usize)> {
        self.unknown_curves
            .iter()
            .zip(&self.offsets)
            .find(|(spec, _)| spec.name == name)
            .map(|(spec, &offset)| (offset, spec.len()))
    }

    /// Splits `x` into per-curve node yields by cumulative node counts.
    pub fn split<'a>(&'a self, x: &'a [f64]) -> CurveResult<Vec<(&'a CurveNodeSpec, &'a [f64])>> {
        if x.len() != self.parameter_count() {
            return Err(CurveError::invalid_argument(format!(
                "expected {} parameters, got {}",
                self.parameter_count(),
                x.len()
            )));
        }
        Ok(self
            .unknown_curves
            .iter()
            .zip(&self.offsets)
            .map(|(spec, &offset)| (spec, &x[offset..offset + spec.len()]))
            .collect())
    }

    /// Builds only the unknown curves from `x`.
    pub fn calibrated_curves(&self, x: &[f64]) -> CurveResult<CurveBundle> {
        let mut bundle = CurveBundle::new();
        for (spec, yields) in self.split(x)? {
            bundle.insert(spec.build(yields)?)?;
        }
        Ok(bundle)
    }

    /// Builds the unknown curves from `x` and merges them with the known ones.
    pub fn build_curves(&self, x: &[f64]) -> CurveResult<CurveBundle> {
        let mut bundle = self.known_curves.clone();
        for (spec, yields) in self.split(x)? {
            bundle.insert(spec.build(yields)?)?;
        }
        Ok(bundle)
    }

    /// Copy of the problem with the known curve of the same name replaced by `curve`.
    pub fn with_known_curve(&self, curve: YieldCurve) -> CurveResult<Self> {
        self.known_curves.get(curve.name())?;
        let mut data = self.clone();
        data.known_curves.replace(curve);
        Ok(data)
    }

    /// Start vector with every node at `rate`.
    #[must_use]
    pub fn flat_start(&self, rate: f64) -> DVector<f64> {
        DVector::from_element(self.parameter_count(), rate)
    }
}

/// Two instruments pinning the same unknown curve at the same time leave a node free.
fn check_distinct_maturities(
    instruments: &[Instrument],
    unknown: &BTreeSet<&str>,
) -> CurveResult<()> {
    let mut by_curve: BTreeMap<&str, Vec<(f64, &Instrument)>> = BTreeMap::new();
    for instrument in instruments {
        let curve = instrument.node_curve();
        if unknown.contains(curve) {
            by_curve
                .entry(curve)
                .or_default()
                .push((instrument.maturity(), instrument));
        }
    }

    for (curve, mut points) in by_curve {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in points.windows(2) {
            let ((t0, first), (t1, second)) = (pair[0], pair[1]);
            if t1 - t0 <= MATURITY_EPSILON {
                return Err(CurveError::invalid_argument(format!(
                    "curve '{curve}': {} and {} both mature at {t0}, leaving a node undetermined",
                    first.label(),
                    second.label()
                )));
            }
        }
    }
    Ok(())
}
