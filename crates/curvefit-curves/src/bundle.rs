//! Named collections of curves.

use std::collections::BTreeMap;

use crate::curve::YieldCurve;
use crate::error::{CurveError, CurveResult};
use crate::fx::FxMatrix;

/// Curves indexed by name, with an optional FX matrix for cross-currency instruments.
#[derive(Debug, Clone, Default)]
pub struct CurveBundle {
    curves: BTreeMap<String, YieldCurve>,
    fx: Option<FxMatrix>,
}

impl CurveBundle {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the FX matrix.
    #[must_use]
    pub fn with_fx(mut self, fx: FxMatrix) -> Self {
        self.fx = Some(fx);
        self
    }

    /// Adds a curve; fails if the name is taken.
    pub fn insert(&mut self, curve: YieldCurve) -> CurveResult<()> {
        if self.curves.contains_key(curve.name()) {
            return Err(CurveError::invalid_argument(format!(
                "curve '{}' is already in the bundle",
                curve.name()
            )));
        }
        self.curves.insert(curve.name().to_string(), curve);
        Ok(())
    }

    /// Adds a curve, replacing any curve of the same name.
    pub fn replace(&mut self, curve: YieldCurve) {
        self.curves.insert(curve.name().to_string(), curve);
    }

    /// Looks up a curve.
    pub fn get(&self, name: &str) -> CurveResult<&YieldCurve> {
        self.curves
            .get(name)
            .ok_or_else(|| CurveError::curve_not_found(name))
    }

    /// Returns true if a curve with this name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.curves.contains_key(name)
    }

    /// Curve names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.curves.keys().map(String::as_str)
    }

    /// Curves, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &YieldCurve> {
        self.curves.values()
    }

    /// Number of curves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    /// Returns true if the bundle holds no curves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// The FX matrix, if any.
    #[must_use]
    pub fn fx_matrix(&self) -> Option<&FxMatrix> {
        self.fx.as_ref()
    }

    /// Units of `to` for one unit of `from`.
    pub fn fx_rate(&self, from: &str, to: &str) -> CurveResult<f64> {
        if from == to {
            return Ok(1.0);
        }
        self.fx
            .as_ref()
            .ok_or_else(|| {
                CurveError::invalid_argument(format!("no FX matrix available for {from}/{to}"))
            })?
            .fx_rate(from, to)
    }

    /// Union of two bundles.
    ///
    /// Curve name clashes are rejected. FX matrices are merged when both
    /// bundles carry one.
    pub fn merged_with(&self, other: &CurveBundle) -> CurveResult<CurveBundle> {
        let mut merged = self.clone();
        for curve in other.iter() {
            merged.insert(curve.clone())?;
        }
        merged.fx = match (&self.fx, &other.fx) {
            (Some(a), Some(b)) => Some(a.merged_with(b)?),
            (Some(a), None) => Some(a.clone()),
            (None, b) => b.clone(),
        };
        Ok(merged)
    }
}

impl FromIterator<YieldCurve> for CurveBundle {
    /// Later curves replace earlier ones with the same name.
    fn from_iter<I: IntoIterator<Item = YieldCurve>>(iter: I) -> Self {
        let mut bundle = Self::new();
        for curve in iter {
            bundle.replace(curve);
        }
        bundle
    }
}
