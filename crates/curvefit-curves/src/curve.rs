//! Zero-yield curves.

use std::sync::Arc;

use curvefit_math::interpolation::Interpolator;

use crate::error::{CurveError, CurveResult};
use crate::interpolation::InterpolationMethod;

/// Default bump for finite-difference node sensitivities.
pub const DEFAULT_NODE_BUMP: f64 = 1e-6;

/// A yield curve defined by continuously compounded zero yields at node times.
///
/// ```text
/// DF(t) = exp(-y(t) · t)
/// ```
///
/// `y(t)` is interpolated between nodes and held flat outside the node
/// range. A curve with a single node is flat everywhere.
///
/// # Example
///
/// ```rust
/// use curvefit_curves::{InterpolationMethod, YieldCurve};
///
/// let curve = YieldCurve::new(
///     "USD-OIS",
///     vec![1.0, 2.0, 5.0],
///     vec![0.03, 0.035, 0.04],
///     InterpolationMethod::Linear,
/// )
/// .unwrap();
///
/// let df = curve.discount_factor(2.0).unwrap();
/// assert!((df - (-0.07f64).exp()).abs() < 1e-15);
/// ```
#[derive(Debug, Clone)]
pub struct YieldCurve {
    name: String,
    times: Vec<f64>,
    yields: Vec<f64>,
    method: InterpolationMethod,
    interpolator: Option<Arc<dyn Interpolator>>,
}

impl YieldCurve {
    /// Creates a curve.
    ///
    /// # Errors
    ///
    /// - [`CurveError::DuplicateNodeTime`] / [`CurveError::NonMonotonicNodes`] for bad node times
    /// - [`CurveError::InvalidArgument`] for empty, negative, non-finite or
    ///   mismatched inputs, or too few nodes for the interpolation method
    pub fn new(
        name: impl Into<String>,
        times: Vec<f64>,
        yields: Vec<f64>,
        method: InterpolationMethod,
    ) -> CurveResult<Self> {
        let name = name.into();
        validate_node_times(&name, &times, method)?;
        if times.len() != yields.len() {
            return Err(CurveError::invalid_argument(format!(
                "curve '{name}': {} node times but {} yields",
                times.len(),
                yields.len()
            )));
        }
        if yields.iter().any(|y| !y.is_finite()) {
            return Err(CurveError::invalid_argument(format!(
                "curve '{name}': yields must be finite"
            )));
        }

        let interpolator = if times.len() == 1 {
            None
        } else {
            Some(method.build(times.clone(), yields.clone())?)
        };

        Ok(Self {
            name,
            times,
            yields,
            method,
            interpolator,
        })
    }

    /// Same node grid and interpolation, new yields.
    pub fn with_yields(&self, yields: Vec<f64>) -> CurveResult<Self> {
        Self::new(self.name.clone(), self.times.clone(), yields, self.method)
    }

    /// Curve name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node times.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Node yields.
    #[must_use]
    pub fn yields(&self) -> &[f64] {
        &self.yields
    }

    /// Interpolation method.
    #[must_use]
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns true if the curve has no nodes; never the case for a curve built by [`YieldCurve::new`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Clamps `t` into the node range.
    fn clamp(&self, t: f64) -> CurveResult<f64> {
        if !t.is_finite() || t < 0.0 {
            return Err(CurveError::invalid_argument(format!(
                "curve '{}': time must be finite and non-negative, got {t}",
                self.name
            )));
        }
        let first = self.times[0];
        let last = self.times[self.times.len() - 1];
        Ok(t.clamp(first, last))
    }

    /// Continuously compounded zero yield at `t`.
    pub fn zero_rate(&self, t: f64) -> CurveResult<f64> {
        let t = self.clamp(t)?;
        match &self.interpolator {
            Some(interp) => Ok(interp.interpolate(t)?),
            None => Ok(self.yields[0]),
        }
    }

    /// Discount factor at `t`.
    pub fn discount_factor(&self, t: f64) -> CurveResult<f64> {
        let y = self.zero_rate(t)?;
        Ok((-y * t).exp())
    }

    /// Continuously compounded forward rate between `t1` and `t2`.
    pub fn forward_rate(&self, t1: f64, t2: f64) -> CurveResult<f64> {
        if t2 <= t1 {
            return Err(CurveError::invalid_argument(format!(
                "forward period must be increasing: [{t1}, {t2}]"
            )));
        }
        let y1 = self.zero_rate(t1)?;
        let y2 = self.zero_rate(t2)?;
        Ok((y2 * t2 - y1 * t1) / (t2 - t1))
    }

    /// `∂zero_rate(t) / ∂yield_j` for every node `j`.
    pub fn node_sensitivities(&self, t: f64) -> CurveResult<Vec<f64>> {
        let t = self.clamp(t)?;
        match &self.interpolator {
            Some(interp) => Ok(interp.node_sensitivities(t)?),
            None => Ok(vec![1.0]),
        }
    }

    /// Node sensitivities by central differences, bumping each node yield by `bump`.
    pub fn node_sensitivities_fd(&self, t: f64, bump: f64) -> CurveResult<Vec<f64>> {
        if bump <= 0.0 || !bump.is_finite() {
            return Err(CurveError::invalid_argument(format!(
                "bump must be positive, got {bump}"
            )));
        }
        (0..self.len())
            .map(|j| {
                let up = self.bumped(j, bump)?.zero_rate(t)?;
                let down = self.bumped(j, -bump)?.zero_rate(t)?;
                Ok((up - down) / (2.0 * bump))
            })
            .collect()
    }

    /// Copy of the curve with node `index` shifted by `amount`.
    pub fn bumped(&self, index: usize, amount: f64) -> CurveResult<Self> {
        if index >= self.len() {
            return Err(CurveError::invalid_argument(format!(
                "node index {index} out of range for curve '{}' with {} nodes",
                self.name,
                self.len()
            )));
        }
        let mut yields = self.yields.clone();
        yields[index] += amount;
        self.with_yields(yields)
    }
}

/// Checks that node times are non-empty, finite, non-negative and strictly increasing.
pub(crate) fn validate_node_times(
    name: &str,
    times: &[f64],
    method: InterpolationMethod,
) -> CurveResult<()> {
    if times.is_empty() {
        return Err(CurveError::invalid_argument(format!(
            "curve '{name}' has no nodes"
        )));
    }
    if let Some(t) = times.iter().find(|t| !t.is_finite() || **t < 0.0) {
        return Err(CurveError::invalid_argument(format!(
            "curve '{name}': node time {t} must be finite and non-negative"
        )));
    }
    for (index, w) in times.windows(2).enumerate() {
        if w[1] == w[0] {
            return Err(CurveError::DuplicateNodeTime {
                curve: name.to_string(),
                time: w[0],
            });
        }
        if w[1] < w[0] {
            return Err(CurveError::NonMonotonicNodes {
                curve: name.to_string(),
                index: index + 1,
                prev: w[0],
                current: w[1],
            });
        }
    }
    if times.len() > 1 && times.len() < method.min_nodes() {
        return Err(CurveError::invalid_argument(format!(
            "curve '{name}': {method} interpolation needs at least {} nodes, got {}",
            method.min_nodes(),
            times.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn curve(method: InterpolationMethod) -> YieldCurve {
        YieldCurve::new(
            "test",
            vec![1.0, 2.0, 5.0, 10.0],
            vec![0.02, 0.025, 0.03, 0.032],
            method,
        )
        .unwrap()
    }

    #[test]
    fn test_flat_extrapolation() {
        let c = curve(InterpolationMethod::Linear);
        assert_relative_eq!(c.zero_rate(0.25).unwrap(), 0.02);
        assert_relative_eq!(c.zero_rate(30.0).unwrap(), 0.032);
        assert_relative_eq!(c.discount_factor(30.0).unwrap(), (-0.032f64 * 30.0).exp());
        assert_relative_eq!(c.discount_factor(0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_single_node_is_flat() {
        let c = YieldCurve::new("flat", vec![3.0], vec![0.05], InterpolationMethod::CubicSpline)
            .unwrap();
        assert_relative_eq!(c.zero_rate(0.5).unwrap(), 0.05);
        assert_relative_eq!(c.zero_rate(10.0).unwrap(), 0.05);
        assert_eq!(c.node_sensitivities(7.0).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_built_curves_are_never_empty() {
        let single = YieldCurve::new("one", vec![3.0], vec![0.05], InterpolationMethod::Linear)
            .unwrap();
        assert_eq!(single.len(), 1);
        assert!(!single.is_empty());
        assert!(YieldCurve::new("none", vec![], vec![], InterpolationMethod::Linear).is_err());
    }

    #[test]
    fn test_forward_rate() {
        let c = curve(InterpolationMethod::Linear);
        let fwd = c.forward_rate(1.0, 2.0).unwrap();
        assert_relative_eq!(fwd, 0.03, epsilon = 1e-14);
        assert!(c.forward_rate(2.0, 1.0).is_err());
    }

    #[test]
    fn test_duplicate_times_rejected() {
        let result = YieldCurve::new(
            "dup",
            vec![1.0, 2.0, 2.0],
            vec![0.01, 0.02, 0.03],
            InterpolationMethod::Linear,
        );
        assert!(matches!(result, Err(CurveError::DuplicateNodeTime { time, .. }) if time == 2.0));
    }

    #[test]
    fn test_decreasing_times_rejected() {
        let result = YieldCurve::new(
            "bad",
            vec![1.0, 3.0, 2.0],
            vec![0.01, 0.02, 0.03],
            InterpolationMethod::Linear,
        );
        assert!(matches!(
            result,
            Err(CurveError::NonMonotonicNodes { index: 2, .. })
        ));
    }

    #[test]
    fn test_negative_time_rejected() {
        let c = curve(InterpolationMethod::Linear);
        assert!(c.zero_rate(-1.0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_analytic_sensitivities_match_bumping() {
        for method in [InterpolationMethod::Linear, InterpolationMethod::CubicSpline] {
            let c = curve(method);
            for t in [0.5, 1.5, 3.7, 9.0, 20.0] {
                let analytic = c.node_sensitivities(t).unwrap();
                let bumped = c.node_sensitivities_fd(t, DEFAULT_NODE_BUMP).unwrap();
                for (a, b) in analytic.iter().zip(&bumped) {
                    assert_relative_eq!(*a, *b, epsilon = 1e-8);
                }
            }
        }
    }

    #[test]
    fn test_bumped_curve() {
        let c = curve(InterpolationMethod::Linear);
        let b = c.bumped(1, 0.001).unwrap();
        assert_relative_eq!(b.yields()[1], 0.026);
        assert!(c.bumped(10, 0.001).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn yields() -> impl Strategy<Value = Vec<f64>> {
            proptest::collection::vec(-0.01f64..0.08, 4)
        }

        proptest! {
            #[test]
            fn prop_curve_reprices_nodes(ys in yields(), linear in any::<bool>()) {
                let method = if linear { InterpolationMethod::Linear } else { InterpolationMethod::CubicSpline };
                let c = YieldCurve::new("p", vec![1.0, 2.0, 5.0, 10.0], ys.clone(), method).unwrap();
                for (t, y) in c.times().iter().zip(&ys) {
                    prop_assert!((c.zero_rate(*t).unwrap() - y).abs() < 1e-12);
                }
            }

            #[test]
            fn prop_sensitivities_sum_to_one(ys in yields(), t in 0.0f64..15.0, linear in any::<bool>()) {
                // A parallel shift of every node moves the interpolated yield by the same amount.
                let method = if linear { InterpolationMethod::Linear } else { InterpolationMethod::CubicSpline };
                let c = YieldCurve::new("p", vec![1.0, 2.0, 5.0, 10.0], ys, method).unwrap();
                let total: f64 = c.node_sensitivities(t).unwrap().iter().sum();
                prop_assert!((total - 1.0).abs() < 1e-10);
            }
        }
    }
}
