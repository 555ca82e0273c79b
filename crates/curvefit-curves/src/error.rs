//! Error types for curve construction and calibration.
//!
//! Errors fall into four groups:
//!
//! - invalid arguments ([`CurveError::InvalidArgument`], [`CurveError::DuplicateNodeTime`],
//!   [`CurveError::NonMonotonicNodes`], [`CurveError::CurveNotFound`],
//!   [`CurveError::UnknownCurrency`]), detected before any iteration starts;
//! - a badly posed system ([`CurveError::Underdetermined`], [`CurveError::Overdetermined`]);
//! - numerical breakdown ([`CurveError::NumericalFailure`]);
//! - non-convergence ([`CurveError::CalibrationFailure`]).

use curvefit_math::MathError;
use thiserror::Error;

/// A specialized Result type for curve operations.
pub type CurveResult<T> = Result<T, CurveError>;

/// Error types for curve operations.
#[derive(Error, Debug, Clone)]
pub enum CurveError {
    /// An input failed validation.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of what is wrong.
        reason: String,
    },

    /// Two nodes of one curve share a time.
    #[error("Duplicate node time {time:.6} in curve '{curve}'")]
    DuplicateNodeTime {
        /// Curve name.
        curve: String,
        /// The repeated time.
        time: f64,
    },

    /// Node times are not increasing.
    #[error("Non-monotonic node times in curve '{curve}' at index {index}: {prev:.6} > {current:.6}")]
    NonMonotonicNodes {
        /// Curve name.
        curve: String,
        /// Index where monotonicity violation occurred.
        index: usize,
        /// Previous node time.
        prev: f64,
        /// Current node time.
        current: f64,
    },

    /// Curve not found in a bundle.
    #[error("Curve not found: {name}")]
    CurveNotFound {
        /// Name of the missing curve.
        name: String,
    },

    /// Currency not present in the FX matrix.
    #[error("Unknown currency: {currency}")]
    UnknownCurrency {
        /// The currency code.
        currency: String,
    },

    /// More curve nodes than instruments.
    #[error("Underdetermined system: {nodes} curve nodes but only {instruments} instruments")]
    Underdetermined {
        /// Total unknown node count.
        nodes: usize,
        /// Instrument count.
        instruments: usize,
    },

    /// More instruments than curve nodes.
    #[error("Overdetermined system: {instruments} instruments but only {nodes} curve nodes")]
    Overdetermined {
        /// Total unknown node count.
        nodes: usize,
        /// Instrument count.
        instruments: usize,
    },

    /// Singular system without fallback, non-finite values, or similar breakdown.
    #[error("Numerical failure: {reason}")]
    NumericalFailure {
        /// Description of the failure.
        reason: String,
    },

    /// Curve calibration failed to converge.
    #[error(
        "Calibration failed after {iterations} iterations (residual: {residual:.2e}): {message}"
    )]
    CalibrationFailure {
        /// Number of iterations attempted.
        iterations: u32,
        /// Final residual value.
        residual: f64,
        /// Description of failure.
        message: String,
    },
}

impl CurveError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates a curve not found error.
    #[must_use]
    pub fn curve_not_found(name: impl Into<String>) -> Self {
        Self::CurveNotFound { name: name.into() }
    }

    /// Creates an unknown currency error.
    #[must_use]
    pub fn unknown_currency(currency: impl Into<String>) -> Self {
        Self::UnknownCurrency {
            currency: currency.into(),
        }
    }

    /// Creates a numerical failure error.
    #[must_use]
    pub fn numerical_failure(reason: impl Into<String>) -> Self {
        Self::NumericalFailure {
            reason: reason.into(),
        }
    }

    /// Creates a calibration failure error.
    #[must_use]
    pub fn calibration_failed(iterations: u32, residual: f64, message: impl Into<String>) -> Self {
        Self::CalibrationFailure {
            iterations,
            residual,
            message: message.into(),
        }
    }

    /// Returns true for errors caused by invalid inputs.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::DuplicateNodeTime { .. }
                | Self::NonMonotonicNodes { .. }
                | Self::CurveNotFound { .. }
                | Self::UnknownCurrency { .. }
        )
    }
}

impl From<MathError> for CurveError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::ConvergenceFailed {
                iterations,
                residual,
            } => Self::calibration_failed(iterations, residual, "root finder did not converge"),
            MathError::SingularMatrix
            | MathError::NumericalFailure { .. }
            | MathError::DivisionByZero { .. } => Self::numerical_failure(err.to_string()),
            MathError::InvalidBracket { .. }
            | MathError::DimensionMismatch { .. }
            | MathError::ExtrapolationNotAllowed { .. }
            | MathError::InsufficientData { .. }
            | MathError::InvalidInput { .. }
            | MathError::Domain { .. } => Self::invalid_argument(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_failure_display() {
        let err = CurveError::calibration_failed(100, 1e-6, "Failed to converge");
        let msg = format!("{}", err);
        assert!(msg.contains("100 iterations"));
        assert!(msg.contains("Failed to converge"));
    }

    #[test]
    fn test_duplicate_node_is_invalid_argument() {
        let err = CurveError::DuplicateNodeTime {
            curve: "USD-OIS".into(),
            time: 2.0,
        };
        assert!(err.is_invalid_argument());
        assert!(format!("{}", err).contains("USD-OIS"));
    }

    #[test]
    fn test_math_error_categories() {
        let err: CurveError = MathError::convergence_failed(50, 1e-3).into();
        assert!(matches!(
            err,
            CurveError::CalibrationFailure { iterations: 50, .. }
        ));

        let err: CurveError = MathError::SingularMatrix.into();
        assert!(matches!(err, CurveError::NumericalFailure { .. }));

        let err: CurveError = MathError::invalid_input("empty").into();
        assert!(err.is_invalid_argument());
    }
}
