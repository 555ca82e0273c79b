//! CLI command implementations.

pub mod calibrate;
pub mod config;

pub use calibrate::CalibrateArgs;
pub use config::ConfigArgs;
