//! Mathematical utilities: least squares solves for the calibration step.

pub mod ols;

pub use ols::*;
