//! Ridder's root-finding algorithm.

use crate::error::{MathError, MathResult};
use crate::solvers::{SolverConfig, SolverResult};

/// Ridder's method.
///
/// Each step evaluates the midpoint of the bracket and fits an exponential
/// through the three points, which turns false position into a method with
/// quadratic order. The new estimate always stays inside the bracket, so
/// the method keeps the safety of bisection.
///
/// Requires: `f(a) * f(b) <= 0`. The bracket may be given in either order.
///
/// # Example
///
/// ```rust
/// use curvefit_math::solvers::{ridder, SolverConfig};
///
/// let f = |x: f64| x.cos() - x;
///
/// let result = ridder(f, 0.0, 1.0, &SolverConfig::default()).unwrap();
/// assert!(f(result.root).abs() < 1e-9);
/// ```
pub fn ridder<F>(f: F, a: f64, b: f64, config: &SolverConfig) -> MathResult<SolverResult>
where
    F: Fn(f64) -> f64,
{
    let mut lo = a.min(b);
    let mut hi = a.max(b);
    let mut f_lo = f(lo);
    let mut f_hi = f(hi);

    if f_lo * f_hi > 0.0 {
        return Err(MathError::InvalidBracket {
            a: lo,
            b: hi,
            fa: f_lo,
            fb: f_hi,
        });
    }

    if f_lo.abs() < config.tolerance {
        return Ok(SolverResult {
            root: lo,
            iterations: 0,
            residual: f_lo,
        });
    }
    if f_hi.abs() < config.tolerance {
        return Ok(SolverResult {
            root: hi,
            iterations: 0,
            residual: f_hi,
        });
    }

    let mut estimate = f64::NAN;

    for iteration in 0..config.max_iterations {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);

        let s = (f_mid * f_mid - f_lo * f_hi).sqrt();
        if s == 0.0 {
            return Ok(SolverResult {
                root: mid,
                iterations: iteration + 1,
                residual: f_mid,
            });
        }

        let direction = if f_lo >= f_hi { 1.0 } else { -1.0 };
        let next = mid + (mid - lo) * direction * f_mid / s;
        let f_next = f(next);

        let step = (next - estimate).abs();
        estimate = next;

        if f_next.abs() < config.tolerance || step < config.tolerance {
            log::debug!("ridder converged to {next} in {} iterations", iteration + 1);
            return Ok(SolverResult {
                root: next,
                iterations: iteration + 1,
                residual: f_next,
            });
        }

        // Shrink the bracket around the sign change, keeping the midpoint
        // whenever it lies on the other side of the new estimate.
        if f_mid * f_next < 0.0 {
            if mid < next {
                lo = mid;
                f_lo = f_mid;
                hi = next;
                f_hi = f_next;
            } else {
                lo = next;
                f_lo = f_next;
                hi = mid;
                f_hi = f_mid;
            }
        } else if f_lo * f_next < 0.0 {
            hi = next;
            f_hi = f_next;
        } else if f_hi * f_next < 0.0 {
            lo = next;
            f_lo = f_next;
        } else {
            return Err(MathError::numerical_failure(format!(
                "Ridder lost the sign change at x = {next}"
            )));
        }

        if (hi - lo).abs() < config.tolerance {
            return Ok(SolverResult {
                root: estimate,
                iterations: iteration + 1,
                residual: f_next,
            });
        }
    }

    Err(MathError::convergence_failed(
        config.max_iterations,
        f(estimate).abs(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sqrt_2() {
        let f = |x: f64| x * x - 2.0;

        let result = ridder(f, 1.0, 2.0, &SolverConfig::default()).unwrap();

        assert_relative_eq!(result.root, std::f64::consts::SQRT_2, epsilon = 1e-10);
        assert!(result.iterations < 10);
    }

    #[test]
    fn test_exponential() {
        let f = |x: f64| x.exp() - 10.0;

        let result = ridder(f, 0.0, 5.0, &SolverConfig::default()).unwrap();

        assert_relative_eq!(result.root, 10f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_invalid_bracket() {
        let f = |x: f64| x * x + 1.0;

        let result = ridder(f, -1.0, 1.0, &SolverConfig::default());

        assert!(matches!(result, Err(MathError::InvalidBracket { .. })));
    }

    #[test]
    fn test_root_at_lower_endpoint() {
        let f = |x: f64| x * (x - 5.0);

        let result = ridder(f, 0.0, 1.0, &SolverConfig::default()).unwrap();

        assert_eq!(result.root, 0.0);
        assert_eq!(result.iterations, 0);
    }
}
