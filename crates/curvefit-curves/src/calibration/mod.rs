//! Simultaneous calibration of curve node yields.
//!
//! A calibration problem is a set of instruments with market values and a
//! set of unknown curves whose node yields are solved so that every
//! instrument reprices to its target:
//!
//! - [`CalibrationData`] holds the instruments, the unknown curve layouts and
//!   any already-known curves
//! - [`CurveCalibrationFunction`] maps node yields to pricing discrepancies
//! - [`CurveCalibrationJacobian`] gives the analytic Jacobian of that map
//! - [`BootstrapOrchestrator`] runs the vector root finder and can chain
//!   stages, each seeing the curves calibrated before it

mod config;
mod data;
mod function;
mod jacobian;
mod orchestrator;

pub use config::{CalibrationConfig, Decomposition, JacobianMethod, NodeSensitivity, RootFinderKind};
pub use data::{CalibrationData, CurveNodeSpec};
pub use function::CurveCalibrationFunction;
pub use jacobian::CurveCalibrationJacobian;
pub use orchestrator::{
    BootstrapOrchestrator, CalibrationOutput, CalibrationStage, ChainOutput, StageOutput,
};
