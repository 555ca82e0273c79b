//! # Curvefit Curves
//!
//! Zero-yield curves and their simultaneous calibration to market instruments.
//!
//! This crate provides:
//!
//! - **Curves**: [`YieldCurve`] on continuously compounded zero yields with flat
//!   extrapolation, plus [`CurveBundle`] collections with an optional [`FxMatrix`]
//! - **Instruments**: cash deposits, FRAs, fixed/floating swaps and FX forwards
//! - **Pricing**: par-rate and present-value calculators with analytic
//!   zero-rate sensitivities
//! - **Calibration**: the calibration function, its Jacobian and the
//!   [`BootstrapOrchestrator`](calibration::BootstrapOrchestrator) that solves
//!   for node yields and chains dependent stages
//!
//! ## Quick Start
//!
//! ```rust
//! use curvefit_curves::prelude::*;
//!
//! let times = vec![1.0, 2.0, 5.0];
//! let rates = vec![0.030, 0.032, 0.035];
//! let instruments = vec![
//!     Instrument::Cash(Cash::new("USD-OIS", 1.0, 0.030)),
//!     Instrument::Swap(FixedFloatSwap::new("USD-OIS", "USD-OIS", 2.0, 0.032)),
//!     Instrument::Swap(FixedFloatSwap::new("USD-OIS", "USD-OIS", 5.0, 0.035)),
//! ];
//! let data = CalibrationData::new(
//!     instruments,
//!     rates,
//!     vec![CurveNodeSpec::new("USD-OIS", times, InterpolationMethod::Linear)],
//!     CurveBundle::new(),
//! )
//! .unwrap();
//!
//! let output = BootstrapOrchestrator::new(ParRateCalculator)
//!     .calibrate(&data, None)
//!     .unwrap();
//! assert!(output.residual < 1e-8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::float_cmp)]

pub mod bundle;
pub mod calibration;
pub mod curve;
pub mod error;
pub mod fx;
pub mod instruments;
pub mod interpolation;
pub mod pricing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bundle::CurveBundle;
    pub use crate::calibration::{
        BootstrapOrchestrator, CalibrationConfig, CalibrationData, CalibrationOutput,
        CalibrationStage, ChainOutput, CurveCalibrationFunction, CurveCalibrationJacobian,
        CurveNodeSpec, Decomposition, JacobianMethod, NodeSensitivity, RootFinderKind,
        StageOutput,
    };
    pub use crate::curve::YieldCurve;
    pub use crate::error::{CurveError, CurveResult};
    pub use crate::fx::FxMatrix;
    pub use crate::instruments::{Cash, FixedFloatSwap, Fra, FxForward, Instrument};
    pub use crate::interpolation::InterpolationMethod;
    pub use crate::pricing::{
        CurveSensitivities, InstrumentCalculator, ParRateCalculator, PresentValueCalculator,
    };
}

pub use bundle::CurveBundle;
pub use curve::YieldCurve;
pub use error::{CurveError, CurveResult};
pub use fx::FxMatrix;
pub use interpolation::InterpolationMethod;
